use bevy_math::Vec3;
use bincode::{Decode, Encode};
use serde::{Deserialize, Serialize};

// Macro to reduce boilerplate for wire structs
macro_rules! message {
    ($(#[$meta:meta])* struct $name:ident $body:tt) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Encode, Decode)]
        pub struct $name $body
    };
}

// ============================================================================
// Identifiers
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Encode, Decode, Serialize, Deserialize)]
pub struct CharacterId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Encode, Decode)]
pub struct ProjectileId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Encode, Decode)]
pub struct SplashId(pub u32);

// ============================================================================
// Common Data Types
// ============================================================================

// The two playable variants. They differ only in stats and visuals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Encode, Decode, Serialize, Deserialize)]
pub enum CharacterClass {
    #[default]
    A,
    B,
}

impl CharacterClass {
    pub const ALL: [Self; 2] = [Self::A, Self::B];

    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim() {
            "A" | "a" => Some(Self::A),
            "B" | "b" => Some(Self::B),
            _ => None,
        }
    }

    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::A => "A",
            Self::B => "B",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Encode, Decode, Serialize, Deserialize)]
pub enum Ability {
    Bolt,
    Mortar,
    Melee,
}

impl Ability {
    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::Bolt => "bolt",
            Self::Mortar => "mortar",
            Self::Melee => "melee",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Encode, Decode)]
pub enum CharacterKind {
    Player,
    Bot,
    Remote,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Encode, Decode)]
pub enum AnimKey {
    #[default]
    Idle,
    Run,
    Jump,
    Attack,
    Dying,
}

// Wire position in meters. The simulation uses `Vec3`; this is its encodable twin.
#[derive(Debug, Clone, Copy, PartialEq, Default, Encode, Decode)]
pub struct Position {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl From<Vec3> for Position {
    fn from(v: Vec3) -> Self {
        Self { x: v.x, y: v.y, z: v.z }
    }
}

impl From<Position> for Vec3 {
    fn from(p: Position) -> Self {
        Self::new(p.x, p.y, p.z)
    }
}

// Where a projectile was aimed: a heading for bolts, a ground point for mortars.
#[derive(Debug, Clone, Copy, PartialEq, Encode, Decode)]
pub enum Aim {
    Direction { x: f32, z: f32 },
    Target { x: f32, z: f32 },
}

// ============================================================================
// Net Messages (peer to peer, relayed by the host)
// ============================================================================

message! {
struct PlayerState {
    pub player_id: CharacterId,
    pub position: Position,
    pub facing: f32,
    pub anim: AnimKey,
    pub health: f32,
}
}

message! {
struct ProjectileCreate {
    pub player_id: CharacterId,
    pub ability: Ability,
    pub origin: Position,
    pub aim: Aim,
    pub class: CharacterClass,
}
}

message! {
struct ProjectileUpdate {
    pub projectile_id: ProjectileId,
    pub position: Position,
    pub velocity: Position,
}
}

message! {
struct PlayerDamage {
    pub target_id: CharacterId,
    pub amount: f32,
    pub attacker_id: CharacterId,
}
}

message! {
struct CharacterChange {
    pub player_id: CharacterId,
    pub class: CharacterClass,
}
}

#[derive(Debug, Clone, PartialEq, Encode, Decode)]
pub enum NetMessage {
    PlayerState(PlayerState),
    ProjectileCreate(ProjectileCreate),
    ProjectileUpdate(ProjectileUpdate),
    PlayerDamage(PlayerDamage),
    CharacterChange(CharacterChange),
}

impl NetMessage {
    // Rewrite the sender-controlled id fields so a peer cannot speak for someone else.
    #[must_use]
    pub fn with_sender(mut self, sender: CharacterId) -> Self {
        match &mut self {
            Self::PlayerState(m) => m.player_id = sender,
            Self::ProjectileCreate(m) => m.player_id = sender,
            Self::PlayerDamage(m) => m.attacker_id = sender,
            Self::CharacterChange(m) => m.player_id = sender,
            Self::ProjectileUpdate(_) => {}
        }
        self
    }
}

// ============================================================================
// Message Envelopes
// ============================================================================

message! {
// Client to Host: join the arena as the given character.
struct CJoin {
    pub class: CharacterClass,
}
}

message! {
// Host to Client: assigned id and arena geometry.
struct SWelcome {
    pub id: CharacterId,
    pub arena_size: f32,
}
}

// All client to host messages
#[derive(Debug, Clone, PartialEq, Encode, Decode)]
pub enum ClientMessage {
    Join(CJoin),
    Net(NetMessage),
    Leave,
}

// All host to client messages
#[derive(Debug, Clone, PartialEq, Encode, Decode)]
pub enum ServerMessage {
    Welcome(SWelcome),
    Net(NetMessage),
    Left(CharacterId),
}
