use bevy::prelude::*;
use tracing::{debug, trace};

use crate::{autopilot::Autopilot, resources::ClientMap};
use arena_common::{
    events::GameEvent,
    game::{Arena, FrameSink},
    input::InputFrame,
    protocol::{NetMessage, ServerMessage},
    scene::Scene,
};

// ============================================================================
// Relay Sink
// ============================================================================

// Hands the host's outgoing Net messages to every joined client.
pub struct RelaySink<'a> {
    clients: &'a ClientMap,
    pub sent: usize,
}

impl<'a> RelaySink<'a> {
    #[must_use]
    pub const fn new(clients: &'a ClientMap) -> Self {
        Self { clients, sent: 0 }
    }
}

impl FrameSink for RelaySink<'_> {
    fn on_event(&mut self, event: &GameEvent) {
        match event {
            GameEvent::Respawn { id, position } => debug!("{:?} back in at {:?}", id, position),
            GameEvent::KillStreak { attacker, count } => debug!("{:?} streak {}", attacker, count),
            other => trace!("{:?}", other),
        }
    }

    fn is_net_connected(&self) -> bool {
        self.clients.joined() > 0
    }

    fn send_net(&mut self, message: NetMessage) {
        self.clients.broadcast(None, &ServerMessage::Net(message));
        self.sent += 1;
    }

    fn present(&mut self, scene: &Scene) {
        trace!(
            "{} characters, {} projectiles, {} splash areas",
            scene.characters.len(),
            scene.projectiles.len(),
            scene.splashes.len()
        );
    }
}

// ============================================================================
// Arena Frame System
// ============================================================================

// One Loop frame per server tick. Without an autopilot the host player, if any, stands still.
pub fn arena_frame_system(
    time: Res<Time>,
    mut arena: ResMut<Arena>,
    clients: Res<ClientMap>,
    autopilot: Option<ResMut<Autopilot>>,
) {
    let input = autopilot.map_or_else(InputFrame::running, |mut pilot| {
        pilot.input_for(&arena, time.delta_secs())
    });
    let mut sink = RelaySink::new(&clients);
    arena.frame(time.elapsed_secs(), &input, &mut sink);
}
