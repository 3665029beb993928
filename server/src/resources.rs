use bevy::prelude::*;
use std::{collections::HashMap, net::SocketAddr};
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, error::TryRecvError};
use tracing::{debug, info};

use crate::net::{ClientId, ClientLink, ServerToClient};
use arena_common::{
    error::ErrorLog,
    game::Arena,
    persistence::{ArenaSettings, KeyValueStore},
    protocol::{CharacterId, ClientMessage, ServerMessage},
};

// ============================================================================
// Clients
// ============================================================================

pub struct ClientInfo {
    pub remote: SocketAddr,
    outbound: UnboundedSender<ServerToClient>,
    inbound: UnboundedReceiver<ClientMessage>,
    // Set once the client has joined as a character.
    pub character: Option<CharacterId>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    Message(ClientMessage),
    Disconnected,
}

#[derive(Resource)]
pub struct ClientMap {
    clients: HashMap<ClientId, ClientInfo>,
    next_id: u32,
}

impl Default for ClientMap {
    fn default() -> Self {
        Self {
            clients: HashMap::new(),
            next_id: 1,
        }
    }
}

impl ClientMap {
    /// Take ownership of a new link and assign it the next free id.
    pub fn register(&mut self, link: ClientLink) -> ClientId {
        let id = loop {
            let candidate = ClientId(self.next_id);
            self.next_id = self.next_id.wrapping_add(1).max(1);
            if !self.clients.contains_key(&candidate) {
                break candidate;
            }
        };
        self.clients.insert(
            id,
            ClientInfo {
                remote: link.remote,
                outbound: link.outbound,
                inbound: link.inbound,
                character: None,
            },
        );
        id
    }

    #[must_use]
    pub fn contains(&self, id: ClientId) -> bool {
        self.clients.contains_key(&id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.clients.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    #[must_use]
    pub fn get(&self, id: ClientId) -> Option<&ClientInfo> {
        self.clients.get(&id)
    }

    #[must_use]
    pub fn character(&self, id: ClientId) -> Option<CharacterId> {
        self.clients.get(&id).and_then(|c| c.character)
    }

    pub fn set_character(&mut self, id: ClientId, character: CharacterId) {
        if let Some(client) = self.clients.get_mut(&id) {
            client.character = Some(character);
        }
    }

    #[must_use]
    pub fn joined(&self) -> usize {
        self.clients.values().filter(|c| c.character.is_some()).count()
    }

    // Everything the readers queued since the last call, ordered by client id.
    // A closed reader yields one Disconnected after its remaining messages.
    pub fn drain_events(&mut self) -> Vec<(ClientId, ClientEvent)> {
        let mut events = Vec::new();
        for (&id, client) in &mut self.clients {
            loop {
                match client.inbound.try_recv() {
                    Ok(message) => events.push((id, ClientEvent::Message(message))),
                    Err(TryRecvError::Empty) => break,
                    Err(TryRecvError::Disconnected) => {
                        events.push((id, ClientEvent::Disconnected));
                        break;
                    }
                }
            }
        }
        events.sort_by_key(|(id, _)| *id);
        events
    }

    pub fn send_to(&self, id: ClientId, message: ServerMessage) {
        if let Some(client) = self.clients.get(&id)
            && client.outbound.send(ServerToClient::Send(message)).is_err()
        {
            debug!("{:?} writer already stopped", id);
        }
    }

    // Every joined client except `skip`.
    pub fn broadcast(&self, skip: Option<ClientId>, message: &ServerMessage) {
        for (id, client) in &self.clients {
            if Some(*id) != skip && client.character.is_some() {
                let _ = client.outbound.send(ServerToClient::Send(message.clone()));
            }
        }
    }

    // Drop the client and tell its writer to close. Returns the character it controlled.
    pub fn close(&mut self, id: ClientId) -> Option<CharacterId> {
        let client = self.clients.remove(&id)?;
        let _ = client.outbound.send(ServerToClient::Close);
        client.character
    }
}

// ============================================================================
// Accept Channel
// ============================================================================

// New links from the listener, waiting for the loop to assign ids.
#[derive(Resource)]
pub struct FromAcceptChannel(UnboundedReceiver<ClientLink>);

impl FromAcceptChannel {
    #[must_use]
    pub const fn new(receiver: UnboundedReceiver<ClientLink>) -> Self {
        Self(receiver)
    }

    pub fn try_recv(&mut self) -> Result<ClientLink, TryRecvError> {
        self.0.try_recv()
    }
}

// ============================================================================
// Storage
// ============================================================================

// Persistent records for this host. Failed writes are logged once per cause and the loop carries on.
#[derive(Resource)]
pub struct Storage {
    store: Box<dyn KeyValueStore + Send + Sync>,
    pub settings: ArenaSettings,
    save_timer: Timer,
    errors: ErrorLog,
}

impl Storage {
    #[must_use]
    pub fn new(store: Box<dyn KeyValueStore + Send + Sync>, settings: ArenaSettings, interval_secs: f32) -> Self {
        Self {
            store,
            settings,
            save_timer: Timer::from_seconds(interval_secs, TimerMode::Repeating),
            errors: ErrorLog::default(),
        }
    }

    // True when the periodic save is due.
    pub fn tick(&mut self, delta: std::time::Duration) -> bool {
        self.save_timer.tick(delta).just_finished()
    }

    pub fn save(&mut self, arena: &mut Arena) {
        let difficulty = arena.difficulty();
        if let Err(e) = arena.learning_mut().save(self.store.as_mut(), difficulty) {
            self.errors.report("bot learning", &e);
        }
        if let Err(e) = self.settings.save(self.store.as_mut()) {
            self.errors.report("settings", &e);
        }
        debug!("saved learning for {:?} bots", difficulty);
    }

    // Called once at shutdown: counts the match and flushes everything.
    pub fn finish(&mut self, arena: &mut Arena) {
        arena.learning_mut().matches += 1;
        self.save(arena);
        let learning = arena.learning();
        info!(
            "match over: bots fired {} bolts, hit {}, {} kills, {} deaths",
            learning.shots_fired, learning.shots_hit, learning.kills, learning.deaths
        );
    }

    #[must_use]
    pub fn store(&self) -> &dyn KeyValueStore {
        self.store.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arena_common::{
        bots::Difficulty,
        game::ArenaConfig,
        persistence::{BotLearning, MemoryStore},
        protocol::{CJoin, CharacterClass},
        stats::StatsRegistry,
    };
    use crate::net::link;

    #[test]
    fn finish_counts_the_match() {
        let mut arena = Arena::standard(ArenaConfig::default(), StatsRegistry::builtin());
        arena.learning_mut().shots_fired = 4;
        let mut storage = Storage::new(Box::new(MemoryStore::new()), ArenaSettings::default(), 30.0);
        storage.finish(&mut arena);

        let saved = BotLearning::load(storage.store(), Difficulty::Medium);
        assert_eq!(saved.matches, 1);
        assert_eq!(saved.shots_fired, 4);
        assert_eq!(ArenaSettings::load(storage.store()).bot_count, 3);
    }

    fn addr() -> SocketAddr {
        "127.0.0.1:5000".parse().expect("valid address")
    }

    #[test]
    fn ids_start_at_one_and_skip_live_clients() {
        let mut clients = ClientMap::default();
        let (first, _first_ends) = link(addr());
        let (second, _second_ends) = link(addr());
        assert_eq!(clients.register(first), ClientId(1));
        assert_eq!(clients.register(second), ClientId(2));

        clients.next_id = u32::MAX;
        let (third, _third_ends) = link(addr());
        let (fourth, _fourth_ends) = link(addr());
        assert_eq!(clients.register(third), ClientId(u32::MAX));
        // Wraps past zero and over the ids still in use.
        assert_eq!(clients.register(fourth), ClientId(3));
        assert_eq!(clients.len(), 4);
    }

    #[test]
    fn drained_events_keep_per_client_order_and_report_disconnects() {
        let mut clients = ClientMap::default();
        let (first, first_ends) = link(addr());
        let (second, second_ends) = link(addr());
        let first_id = clients.register(first);
        let second_id = clients.register(second);

        second_ends.inbound.send(ClientMessage::Leave).expect("open");
        first_ends
            .inbound
            .send(ClientMessage::Join(CJoin { class: CharacterClass::B }))
            .expect("open");
        first_ends.inbound.send(ClientMessage::Leave).expect("open");
        drop(first_ends);

        let events = clients.drain_events();
        assert_eq!(
            events,
            vec![
                (first_id, ClientEvent::Message(ClientMessage::Join(CJoin { class: CharacterClass::B }))),
                (first_id, ClientEvent::Message(ClientMessage::Leave)),
                (first_id, ClientEvent::Disconnected),
                (second_id, ClientEvent::Message(ClientMessage::Leave)),
            ]
        );
        assert!(clients.drain_events().iter().all(|(id, _)| *id == first_id));
        drop(second_ends);
    }

    #[test]
    fn broadcast_skips_sender_and_unjoined() {
        let mut clients = ClientMap::default();
        let mut ends = Vec::new();
        for character in [Some(CharacterId(10)), Some(CharacterId(11)), None] {
            let (client, end) = link(addr());
            let id = clients.register(client);
            if let Some(character) = character {
                clients.set_character(id, character);
            }
            ends.push(end);
        }

        clients.broadcast(Some(ClientId(1)), &ServerMessage::Left(CharacterId(9)));
        assert!(ends[0].outbound.try_recv().is_err());
        assert!(matches!(
            ends[1].outbound.try_recv(),
            Ok(ServerToClient::Send(ServerMessage::Left(_)))
        ));
        assert!(ends[2].outbound.try_recv().is_err());
        assert_eq!(clients.joined(), 2);

        assert_eq!(clients.close(ClientId(2)), Some(CharacterId(11)));
        assert!(matches!(ends[1].outbound.try_recv(), Ok(ServerToClient::Close)));
        assert!(!clients.contains(ClientId(2)));
    }
}
