use bevy::prelude::*;
use tracing::{debug, error, info, warn};

use crate::{
    net::ClientId,
    resources::{ClientEvent, ClientMap, FromAcceptChannel},
};
use arena_common::{
    game::Arena,
    protocol::{CharacterId, ClientMessage, SWelcome, ServerMessage},
};

// ============================================================================
// Accept Connections System
// ============================================================================

pub fn network_accept_connections_system(mut from_accept: ResMut<FromAcceptChannel>, mut clients: ResMut<ClientMap>) {
    while let Ok(link) = from_accept.try_recv() {
        let remote = link.remote;
        let id = clients.register(link);
        info!("{:?} connected from {}", id, remote);
    }
}

// ============================================================================
// Client Message System
// ============================================================================

// Runs after the accept system so a link is registered before its first message is drained.
pub fn network_client_message_system(mut clients: ResMut<ClientMap>, mut arena: ResMut<Arena>) {
    for (id, event) in clients.drain_events() {
        if !clients.contains(id) {
            // Closed earlier in this batch.
            continue;
        }

        match event {
            ClientEvent::Disconnected => {
                let character = clients.close(id);
                debug!("{:?} disconnected", id);
                if let Some(character) = character {
                    leave(&mut clients, &mut arena, character);
                }
            }
            ClientEvent::Message(message) => process_message(id, message, &mut clients, &mut arena),
        }
    }
}

pub fn process_message(id: ClientId, message: ClientMessage, clients: &mut ClientMap, arena: &mut Arena) {
    let joined = clients.character(id);

    match (message, joined) {
        (ClientMessage::Join(join), None) => {
            let character = arena.spawn_remote(join.class);
            clients.set_character(id, character);
            info!("{:?} joined as {:?} ({:?})", id, character, join.class);
            clients.send_to(
                id,
                ServerMessage::Welcome(SWelcome {
                    id: character,
                    arena_size: arena.world().arena_size(),
                }),
            );
        }
        (ClientMessage::Net(message), Some(character)) => {
            // Peers may only speak for their own character.
            let message = message.with_sender(character);
            clients.broadcast(Some(id), &ServerMessage::Net(message.clone()));
            arena.queue_remote(message);
        }
        (ClientMessage::Leave, joined) => {
            clients.close(id);
            debug!("{:?} left", id);
            if let Some(character) = joined {
                leave(clients, arena, character);
            }
        }
        (ClientMessage::Join(_), Some(character)) => {
            warn!("protocol violation: {:?} joined twice", id);
            clients.close(id);
            leave(clients, arena, character);
        }
        (ClientMessage::Net(_), None) => {
            warn!("protocol violation: {:?} sent game data before joining", id);
            clients.close(id);
        }
    }
}

fn leave(clients: &mut ClientMap, arena: &mut Arena, character: CharacterId) {
    if arena.remove_character(character).is_none() {
        error!("{:?} had no character to remove", character);
    }
    clients.broadcast(None, &ServerMessage::Left(character));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::{ConnectionEnds, ServerToClient, link};
    use arena_common::{
        game::ArenaConfig,
        map::ArenaLayout,
        protocol::{AnimKey, CJoin, CharacterClass, CharacterKind, NetMessage, PlayerState},
        stats::StatsRegistry,
    };
    use tokio::sync::mpsc::unbounded_channel;

    fn connect(clients: &mut ClientMap) -> (ClientId, ConnectionEnds) {
        let (client, ends) = link("127.0.0.1:6000".parse().expect("valid address"));
        (clients.register(client), ends)
    }

    fn arena() -> Arena {
        Arena::new(ArenaConfig::default(), StatsRegistry::builtin(), ArenaLayout::open(20.0))
    }

    fn join(clients: &mut ClientMap, arena: &mut Arena, id: ClientId, class: CharacterClass) -> CharacterId {
        process_message(id, ClientMessage::Join(CJoin { class }), clients, arena);
        clients.character(id).expect("joined")
    }

    fn state(player_id: CharacterId) -> NetMessage {
        NetMessage::PlayerState(PlayerState {
            player_id,
            position: Vec3::new(2.0, 0.6, 0.0).into(),
            facing: 0.0,
            anim: AnimKey::Idle,
            health: 40.0,
        })
    }

    #[test]
    fn join_spawns_remote_and_welcomes() {
        let mut clients = ClientMap::default();
        let mut arena = arena();
        let (id, mut ends) = connect(&mut clients);

        process_message(
            id,
            ClientMessage::Join(CJoin { class: CharacterClass::B }),
            &mut clients,
            &mut arena,
        );

        let Ok(ServerToClient::Send(ServerMessage::Welcome(welcome))) = ends.outbound.try_recv() else {
            panic!("expected a welcome");
        };
        let character = arena.character(welcome.id).expect("spawned");
        assert_eq!(character.kind, CharacterKind::Remote);
        assert_eq!(character.class, CharacterClass::B);
        assert_eq!(clients.joined(), 1);
    }

    #[test]
    fn net_messages_are_rewritten_and_relayed() {
        let mut clients = ClientMap::default();
        let mut arena = arena();
        let (first, mut first_ends) = connect(&mut clients);
        let (second, mut second_ends) = connect(&mut clients);
        let sender = join(&mut clients, &mut arena, first, CharacterClass::A);
        join(&mut clients, &mut arena, second, CharacterClass::A);
        let _ = first_ends.outbound.try_recv();
        let _ = second_ends.outbound.try_recv();

        process_message(first, ClientMessage::Net(state(CharacterId(999))), &mut clients, &mut arena);

        let Ok(ServerToClient::Send(ServerMessage::Net(NetMessage::PlayerState(relayed)))) =
            second_ends.outbound.try_recv()
        else {
            panic!("expected a relayed state");
        };
        assert_eq!(relayed.player_id, sender);
        assert!(first_ends.outbound.try_recv().is_err());
    }

    #[test]
    fn game_data_before_join_closes_the_client() {
        let mut clients = ClientMap::default();
        let mut arena = arena();
        let (id, mut ends) = connect(&mut clients);
        process_message(id, ClientMessage::Net(state(CharacterId(1))), &mut clients, &mut arena);
        assert!(matches!(ends.outbound.try_recv(), Ok(ServerToClient::Close)));
        assert!(clients.is_empty());
    }

    #[test]
    fn leave_removes_character_and_tells_others() {
        let mut clients = ClientMap::default();
        let mut arena = arena();
        let (first, _first_ends) = connect(&mut clients);
        let (second, mut second_ends) = connect(&mut clients);
        let leaving = join(&mut clients, &mut arena, first, CharacterClass::A);
        join(&mut clients, &mut arena, second, CharacterClass::A);
        let _ = second_ends.outbound.try_recv();

        process_message(first, ClientMessage::Leave, &mut clients, &mut arena);
        assert!(arena.character(leaving).is_none());
        assert!(matches!(
            second_ends.outbound.try_recv(),
            Ok(ServerToClient::Send(ServerMessage::Left(id))) if id == leaving
        ));
    }

    #[test]
    fn systems_register_links_and_drop_departed_peers() {
        let (to_loop, from_accept) = unbounded_channel();
        let mut app = App::new();
        app.insert_resource(arena())
            .insert_resource(ClientMap::default())
            .insert_resource(FromAcceptChannel::new(from_accept))
            .add_systems(
                Update,
                (network_accept_connections_system, network_client_message_system).chain(),
            );

        let (client, mut ends) = link("127.0.0.1:6001".parse().expect("valid address"));
        to_loop.send(client).expect("loop open");
        ends.inbound
            .send(ClientMessage::Join(CJoin { class: CharacterClass::A }))
            .expect("loop open");
        app.update();

        let Ok(ServerToClient::Send(ServerMessage::Welcome(welcome))) = ends.outbound.try_recv() else {
            panic!("expected a welcome");
        };
        assert_eq!(app.world().resource::<ClientMap>().character(ClientId(1)), Some(welcome.id));

        // The peer vanishes without saying goodbye.
        let ConnectionEnds { outbound, inbound } = ends;
        drop(inbound);
        app.update();

        assert!(app.world().resource::<ClientMap>().is_empty());
        assert!(app.world().resource::<Arena>().character(welcome.id).is_none());
        drop(outbound);
    }
}
