// ============================================================================
// Server Loop
// ============================================================================

pub const SERVER_LOOP_FREQUENCY: u64 = 60; // Hz
pub const SAVE_INTERVAL_SECS: f32 = 30.0; // periodic learning/settings flush

// ============================================================================
// Autopilot
// ============================================================================

pub const AUTOPILOT_PREFERRED_RANGE: f32 = 4.0; // meters, closes in beyond this
pub const AUTOPILOT_MORTAR_MIN_RANGE: f32 = 3.0; // lobs mortars only at targets at least this far
