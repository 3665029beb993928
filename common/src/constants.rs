// ============================================================================
// Frame Timing
// ============================================================================

pub const MAX_FRAME_DELTA: f32 = 1.0 / 30.0; // seconds, caps large hitches
pub const UPDATE_BROADCAST_INTERVAL: f32 = 0.05; // seconds between player-state messages

// ============================================================================
// Floating-Point Comparisons
// ============================================================================

// Small value for floating-point comparisons (near-zero checks, division guards).
pub const PHYSICS_EPSILON: f32 = 1e-6;

// ============================================================================
// Arena
// ============================================================================

pub const ARENA_SIZE: f32 = 20.0; // edge of the square arena in meters
pub const RESPAWN_AREA_RATIO: f32 = 0.8; // fraction of the half-extent used for random respawns
pub const SPAWN_CLEARANCE: f32 = 0.6; // keep spawn points this far from obstacles
pub const SPAWN_ATTEMPTS: usize = 32;
pub const WALL_JUMP_BLOCK_HEIGHT: f32 = 50.0; // virtual wall extension in modes that forbid jump-over

// ============================================================================
// Characters
// ============================================================================

// Dimensions (meters)
pub const CHARACTER_SIZE: f32 = 0.5; // footprint edge
pub const CHARACTER_HEIGHT: f32 = 1.2;

pub const DEFAULT_MOVE_SPEED: f32 = 5.0; // meters per second

// Vertical physics
pub const GRAVITY: f32 = -30.0; // meters per second squared
pub const JUMP_FORCE: f32 = 8.0; // meters per second
pub const JUMP_COOLDOWN: f32 = 0.2; // seconds
pub const LEVITATION_FORCE: f32 = 24.0; // meters per second squared, only while falling

// Death & respawn
pub const DEATH_FADE_DURATION: f32 = 1.5; // seconds
pub const STREAK_WINDOW: f32 = 5.0; // seconds between kills to keep a streak alive

// ============================================================================
// Bolts
// ============================================================================

pub const BOLT_FOLLOW_SPEED_MULTIPLIER: f32 = 4.0; // scales cursorFollowStrength per second
pub const BOLT_B_ACCEL_MULTIPLIER: f32 = 1.5; // character B ends above its max speed
pub const BOLT_SPAWN_OFFSET: f32 = 0.0; // meters in front of the shooter

// ============================================================================
// Mortars
// ============================================================================

pub const MORTAR_MAX_LIFETIME: f32 = 5.0; // seconds
pub const MORTAR_MIN_DISTANCE: f32 = 0.05; // closer targets produce no trajectory
pub const MORTAR_NEAR_TARGET_DISTANCE: f32 = 0.3;
pub const MORTAR_CLOSE_TO_GROUND_DISTANCE: f32 = 0.2;
pub const MORTAR_DIRECT_HIT_RADIUS: f32 = 0.25;

// ============================================================================
// Splash Areas
// ============================================================================

pub const SPLASH_EXPAND_DURATION: f32 = 0.25; // seconds
pub const SPLASH_TICKS_PER_SECOND: f32 = 5.0;
pub const SPLASH_HEIGHT_TOLERANCE: f32 = 0.5; // how far above the area floor a character still burns

// ============================================================================
// Bots
// ============================================================================

pub const BOT_BOUNCE_JITTER: f32 = 0.25; // radians added or removed when bouncing off walls
pub const BOT_LEARNING_MIN_SHOTS: u32 = 20; // below this the learned hit rate is ignored
