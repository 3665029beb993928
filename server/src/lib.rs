pub mod autopilot;
pub mod config;
pub mod constants;
pub mod net;
pub mod resources;
pub mod systems;
