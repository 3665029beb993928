use bevy_math::{Vec2, Vec3};

use crate::{
    physics::JumpKind,
    protocol::{CharacterClass, CharacterId, ProjectileId, SplashId},
};

// ============================================================================
// Game Events
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemovalReason {
    Expired,
    Collided,
    Hit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DamageSource {
    Bolt,
    MortarDirect,
    Splash,
    Melee,
    Poison,
    // Reported by a peer as player-damage.
    Remote,
}

impl DamageSource {
    // Single deliberate hits, as opposed to damage over time.
    #[must_use]
    pub const fn is_direct(self) -> bool {
        matches!(self, Self::Bolt | Self::MortarDirect | Self::Melee | Self::Remote)
    }
}

// Everything the simulation reports to particles, sound and UI. Emitted after combat resolution.
#[derive(Debug, Clone, PartialEq)]
pub enum GameEvent {
    BoltCreated {
        id: ProjectileId,
        shooter: CharacterId,
        class: CharacterClass,
        position: Vec3,
    },
    BoltRemoved {
        id: ProjectileId,
        position: Vec3,
        reason: RemovalReason,
    },
    MortarLaunched {
        id: ProjectileId,
        shooter: CharacterId,
        class: CharacterClass,
        position: Vec3,
        target: Vec2,
    },
    MortarExploded {
        id: ProjectileId,
        shooter: CharacterId,
        class: CharacterClass,
        position: Vec3,
    },
    SplashCreated {
        id: SplashId,
        shooter: CharacterId,
        position: Vec3,
        radius: f32,
    },
    SplashRemoved {
        id: SplashId,
    },
    Damage {
        target: CharacterId,
        attacker: CharacterId,
        amount: f32,
        remaining: f32,
        source: DamageSource,
    },
    Death {
        target: CharacterId,
        killer: CharacterId,
    },
    KillStreak {
        attacker: CharacterId,
        count: u32,
    },
    Respawn {
        id: CharacterId,
        position: Vec3,
    },
    Jumped {
        id: CharacterId,
        kind: JumpKind,
    },
    Landed {
        id: CharacterId,
    },
    MeleeSwing {
        attacker: CharacterId,
        targets: usize,
    },
    ClassChanged {
        id: CharacterId,
        class: CharacterClass,
    },
}
