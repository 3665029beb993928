pub mod bots;
pub mod character;
pub mod collision;
pub mod combat;
pub mod config;
pub mod constants;
pub mod error;
pub mod events;
pub mod game;
pub mod input;
pub mod map;
pub mod melee;
pub mod net;
pub mod persistence;
pub mod physics;
pub mod projectiles;
pub mod protocol;
pub mod scene;
pub mod splash;
pub mod stats;
pub mod world;
