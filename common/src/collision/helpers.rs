use bevy_math::{Vec2, Vec3};

use crate::constants::PHYSICS_EPSILON;

// ============================================================================
// Axis-Aligned Boxes
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    #[must_use]
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self {
            min: min.min(max),
            max: min.max(max),
        }
    }

    #[must_use]
    pub fn from_center(center: Vec3, half_extents: Vec3) -> Self {
        Self::new(center - half_extents, center + half_extents)
    }

    // Cube of the given radius, used for projectiles.
    #[must_use]
    pub fn cube(center: Vec3, radius: f32) -> Self {
        Self::from_center(center, Vec3::splat(radius))
    }

    // Box around a character: square footprint of edge `size`, vertically centered on `center.y`.
    #[must_use]
    pub fn character(center: Vec3, size: f32, height: f32) -> Self {
        Self::from_center(center, Vec3::new(size / 2.0, height / 2.0, size / 2.0))
    }

    #[must_use]
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) / 2.0
    }

    // Touching faces do not count; a character resting on a platform top is not inside it.
    #[must_use]
    pub fn overlaps(&self, other: &Self) -> bool {
        ranges_overlap_1d(self.min.x, self.max.x, other.min.x, other.max.x)
            && ranges_overlap_1d(self.min.y, self.max.y, other.min.y, other.max.y)
            && ranges_overlap_1d(self.min.z, self.max.z, other.min.z, other.max.z)
    }

    #[must_use]
    pub fn overlaps_footprint(&self, min_x: f32, max_x: f32, min_z: f32, max_z: f32) -> bool {
        ranges_overlap_1d(self.min.x, self.max.x, min_x, max_x) && ranges_overlap_1d(self.min.z, self.max.z, min_z, max_z)
    }

    #[must_use]
    pub fn contains_xz(&self, point: Vec2, clearance: f32) -> bool {
        point.x >= self.min.x - clearance
            && point.x <= self.max.x + clearance
            && point.y >= self.min.z - clearance
            && point.y <= self.max.z + clearance
    }

    #[must_use]
    pub fn expanded(&self, amount: Vec3) -> Self {
        Self {
            min: self.min - amount,
            max: self.max + amount,
        }
    }
}

// Check if two open 1D ranges overlap.
#[must_use]
pub fn ranges_overlap_1d(a_min: f32, a_max: f32, b_min: f32, b_max: f32) -> bool {
    a_max > b_min && a_min < b_max
}

// ============================================================================
// Sweeps
// ============================================================================

// Compute the intersection interval of a ray with a slab (used in ray-AABB tests)
#[must_use]
pub fn sweep_slab_interval(
    local_coord: f32,
    ray_dir: f32,
    half_extent: f32,
    t_min: f32,
    t_max: f32,
) -> Option<(f32, f32)> {
    if ray_dir.abs() > PHYSICS_EPSILON {
        let t1 = (-half_extent - local_coord) / ray_dir;
        let t2 = (half_extent - local_coord) / ray_dir;
        let new_min = t_min.max(t1.min(t2));
        let new_max = t_max.min(t1.max(t2));
        if new_min <= new_max {
            Some((new_min, new_max))
        } else {
            None
        }
    } else if local_coord.abs() > half_extent {
        None
    } else {
        Some((t_min, t_max))
    }
}

// Swept cube of `radius` from `start` to `end` against a box; true if they meet within the step.
// Catches thin obstacles a fast projectile would otherwise step over.
#[must_use]
pub fn sweep_cube_vs_aabb(start: Vec3, end: Vec3, radius: f32, target: &Aabb) -> bool {
    let center = target.center();
    let half = (target.max - target.min) / 2.0 + Vec3::splat(radius);
    let local = start - center;
    let dir = end - start;

    let mut t_min = 0.0_f32;
    let mut t_max = 1.0_f32;

    for axis in 0..3 {
        match sweep_slab_interval(local[axis], dir[axis], half[axis], t_min, t_max) {
            Some((new_min, new_max)) => {
                t_min = new_min;
                t_max = new_max;
            }
            None => return false,
        }
    }

    // Open interval: grazing contact is not a hit, matching `Aabb::overlaps`.
    t_min < t_max && t_max > 0.0 && t_min < 1.0
}
