pub mod characters;
pub mod helpers;
pub mod projectiles;

pub use characters::{character_bounds, separation_push, xz};
pub use helpers::{Aabb, ranges_overlap_1d, sweep_cube_vs_aabb, sweep_slab_interval};
pub use projectiles::{overlap_bolt_vs_character, overlap_mortar_vs_character};
