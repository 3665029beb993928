use bevy_math::Vec3;

use crate::world::{Obstacle, World};

// ============================================================================
// Arena Layout
// ============================================================================

// Footprints are authored for a 20m arena and scaled to the requested size.
const REFERENCE_ARENA_SIZE: f32 = 20.0;

// (min_x, min_z, max_x, max_z, height)
const WALLS: [(f32, f32, f32, f32, f32); 4] = [
    (-5.5, 3.0, -4.5, 6.0, 1.5),
    (4.5, -6.0, 5.5, -3.0, 1.5),
    (2.0, 4.5, 5.0, 5.5, 1.5),
    (-5.0, -5.5, -2.0, -4.5, 1.5),
];

const PLATFORMS: [(f32, f32, f32, f32, f32); 4] = [
    (-1.5, 6.0, 1.5, 8.0, 0.5),
    (-1.5, -8.0, 1.5, -6.0, 0.5),
    (7.0, -1.0, 9.0, 1.0, 1.0),
    (-9.0, -1.0, -7.0, 1.0, 1.0),
];

#[derive(Debug, Clone)]
pub struct ArenaLayout {
    pub arena_size: f32,
    pub obstacles: Vec<Obstacle>,
}

impl ArenaLayout {
    // Symmetric layout: four cover walls around the center and four platforms near the edges.
    // The center stays clear for practice-mode respawns.
    #[must_use]
    pub fn standard(arena_size: f32) -> Self {
        let scale = arena_size / REFERENCE_ARENA_SIZE;
        let scaled = |(min_x, min_z, max_x, max_z, height): (f32, f32, f32, f32, f32)| {
            (
                Vec3::new(min_x * scale, 0.0, min_z * scale),
                Vec3::new(max_x * scale, height, max_z * scale),
            )
        };

        let walls = WALLS.into_iter().map(scaled).map(|(min, max)| Obstacle::wall(min, max));
        let platforms = PLATFORMS
            .into_iter()
            .map(scaled)
            .map(|(min, max)| Obstacle::platform(min, max));

        Self {
            arena_size,
            obstacles: walls.chain(platforms).collect(),
        }
    }

    #[must_use]
    pub fn open(arena_size: f32) -> Self {
        Self {
            arena_size,
            obstacles: Vec::new(),
        }
    }

    #[must_use]
    pub fn into_world(self, block_jump_over: bool) -> World {
        World::new(self.arena_size, self.obstacles).with_jump_over_blocked(block_jump_over)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::ObstacleKind;

    #[test]
    fn standard_layout_keeps_center_clear() {
        let world = ArenaLayout::standard(20.0).into_world(false);
        assert!(!world.point_collides_with_obstacle(0.0, 0.0, 1.0));
        assert_eq!(world.ground_height(0.0, 0.0, 0.5), 0.0);
        assert_eq!(world.ground_height(8.0, 0.0, 0.5), 1.0);
    }

    #[test]
    fn layout_scales_with_arena() {
        let small = ArenaLayout::standard(10.0);
        let platform = small
            .obstacles
            .iter()
            .find(|o| o.kind == ObstacleKind::Platform)
            .expect("has platforms");
        assert!(platform.bounds.max.z <= 4.0 + 1e-6);
        assert!(small.obstacles.iter().all(|o| o.bounds.max.x.abs() <= 5.0));
    }
}
