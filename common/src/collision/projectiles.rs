use bevy_math::Vec3;

use super::helpers::Aabb;

// Bolt cube of `radius` against a character box.
#[must_use]
pub fn overlap_bolt_vs_character(bolt_pos: Vec3, radius: f32, character_pos: Vec3, size: f32, height: f32) -> bool {
    Aabb::cube(bolt_pos, radius).overlaps(&Aabb::character(character_pos, size, height))
}

// Mortar direct hits use their own small radius, not the shell's visual size.
#[must_use]
pub fn overlap_mortar_vs_character(
    mortar_pos: Vec3,
    hit_radius: f32,
    character_pos: Vec3,
    size: f32,
    height: f32,
) -> bool {
    overlap_bolt_vs_character(mortar_pos, hit_radius, character_pos, size, height)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bolt_touching_character_edge_hits() {
        let character = Vec3::new(5.0, 0.6, 0.0);
        assert!(overlap_bolt_vs_character(Vec3::new(4.70, 0.6, 0.0), 0.13, character, 0.5, 1.2));
        assert!(!overlap_bolt_vs_character(Vec3::new(4.60, 0.6, 0.0), 0.13, character, 0.5, 1.2));
    }

    #[test]
    fn bolt_above_character_misses() {
        let character = Vec3::new(0.0, 0.6, 0.0);
        assert!(!overlap_bolt_vs_character(Vec3::new(0.0, 1.9, 0.0), 0.13, character, 0.5, 1.2));
    }
}
