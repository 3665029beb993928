use bevy_ecs::prelude::*;
use bevy_math::{Vec2, Vec3};
use rand::Rng;

use crate::{
    collision::Aabb,
    constants::{SPAWN_ATTEMPTS, WALL_JUMP_BLOCK_HEIGHT},
};

// ============================================================================
// Obstacles
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObstacleKind {
    // Blocks movement; extended upward when jump-over is blocked.
    Wall,
    // Walk-on surface of fixed height.
    Platform,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Obstacle {
    pub bounds: Aabb,
    pub kind: ObstacleKind,
}

impl Obstacle {
    #[must_use]
    pub fn wall(min: Vec3, max: Vec3) -> Self {
        Self {
            bounds: Aabb::new(min, max),
            kind: ObstacleKind::Wall,
        }
    }

    #[must_use]
    pub fn platform(min: Vec3, max: Vec3) -> Self {
        Self {
            bounds: Aabb::new(min, max),
            kind: ObstacleKind::Platform,
        }
    }
}

// ============================================================================
// World
// ============================================================================

// Static arena geometry. Built once, queried read-only by every component.
#[derive(Resource, Debug, Clone)]
pub struct World {
    obstacles: Vec<Obstacle>,
    arena_size: f32,
    block_jump_over: bool,
}

impl World {
    #[must_use]
    pub fn new(arena_size: f32, obstacles: Vec<Obstacle>) -> Self {
        Self {
            obstacles,
            arena_size,
            block_jump_over: false,
        }
    }

    // In modes that forbid jumping over walls, walls are treated as reaching far upward.
    #[must_use]
    pub fn with_jump_over_blocked(mut self, blocked: bool) -> Self {
        self.block_jump_over = blocked;
        self
    }

    #[must_use]
    pub fn obstacles(&self) -> &[Obstacle] {
        &self.obstacles
    }

    #[must_use]
    pub const fn arena_size(&self) -> f32 {
        self.arena_size
    }

    #[must_use]
    pub const fn half_extent(&self) -> f32 {
        self.arena_size / 2.0
    }

    #[must_use]
    pub fn is_inside_arena(&self, x: f32, z: f32) -> bool {
        let half = self.half_extent();
        x.abs() <= half && z.abs() <= half
    }

    fn collision_bounds(&self, obstacle: &Obstacle) -> Aabb {
        let mut bounds = obstacle.bounds;
        if self.block_jump_over && obstacle.kind == ObstacleKind::Wall {
            bounds.max.y += WALL_JUMP_BLOCK_HEIGHT;
        }
        bounds
    }

    // AABB-vs-AABB overlap against every obstacle. Linear scan; obstacle counts are small.
    #[must_use]
    pub fn will_collide(&self, bounds: &Aabb) -> bool {
        self.obstacles
            .iter()
            .any(|obstacle| self.collision_bounds(obstacle).overlaps(bounds))
    }

    // Obstacles a moving box would cross between two positions, including thin ones it steps over.
    #[must_use]
    pub fn sweep_collides(&self, start: Vec3, end: Vec3, radius: f32) -> bool {
        self.obstacles
            .iter()
            .any(|obstacle| crate::collision::sweep_cube_vs_aabb(start, end, radius, &self.collision_bounds(obstacle)))
    }

    // Highest surface under a square footprint; the floor is 0 and outside the arena is a drop.
    #[must_use]
    pub fn ground_height(&self, x: f32, z: f32, footprint: f32) -> f32 {
        if !self.is_inside_arena(x, z) {
            return f32::NEG_INFINITY;
        }

        let half = footprint / 2.0;
        self.obstacles
            .iter()
            .filter(|obstacle| obstacle.bounds.overlaps_footprint(x - half, x + half, z - half, z + half))
            .map(|obstacle| obstacle.bounds.max.y)
            .fold(0.0_f32, f32::max)
    }

    #[must_use]
    pub fn constrain_to_arena(&self, position: Vec3, size: f32) -> Vec3 {
        let limit = (self.half_extent() - size / 2.0).max(0.0);
        Vec3::new(position.x.clamp(-limit, limit), position.y, position.z.clamp(-limit, limit))
    }

    #[must_use]
    pub fn point_collides_with_obstacle(&self, x: f32, z: f32, clearance: f32) -> bool {
        let point = Vec2::new(x, z);
        self.obstacles
            .iter()
            .any(|obstacle| obstacle.bounds.contains_xz(point, clearance))
    }

    // Uniform point in the centered square covering `extent_ratio` of the arena, clear of obstacles.
    // Falls back to the last sample if every attempt lands on an obstacle.
    pub fn random_open_point(&self, rng: &mut impl Rng, extent_ratio: f32, clearance: f32) -> Vec2 {
        let reach = (self.half_extent() * extent_ratio).max(0.0);
        let mut candidate = Vec2::ZERO;
        for _ in 0..SPAWN_ATTEMPTS {
            candidate = if reach > 0.0 {
                Vec2::new(rng.random_range(-reach..=reach), rng.random_range(-reach..=reach))
            } else {
                Vec2::ZERO
            };
            if !self.point_collides_with_obstacle(candidate.x, candidate.y, clearance) {
                return candidate;
            }
        }
        candidate
    }
}
