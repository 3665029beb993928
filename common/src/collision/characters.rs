use bevy_math::{Vec2, Vec3};

use super::helpers::Aabb;
use crate::constants::PHYSICS_EPSILON;

#[must_use]
pub fn character_bounds(position: Vec3, size: f32, height: f32) -> Aabb {
    Aabb::character(position, size, height)
}

// Circle-vs-circle in the xz plane. Returns the push that moves `mover` out of `other`,
// or None when they do not overlap. Coincident centers have no separating direction and
// are left alone.
#[must_use]
pub fn separation_push(mover: Vec2, other: Vec2, combined_radius: f32) -> Option<Vec2> {
    let offset = mover - other;
    let distance = offset.length();
    if distance >= combined_radius || distance < PHYSICS_EPSILON {
        return None;
    }
    Some(offset / distance * (combined_radius - distance))
}

#[must_use]
pub fn xz(position: Vec3) -> Vec2 {
    Vec2::new(position.x, position.z)
}
