use bevy_math::Vec3;

use crate::{
    combat::ScoreRow,
    protocol::{Ability, AnimKey, CharacterClass, CharacterId, CharacterKind, ProjectileId, SplashId},
};

// ============================================================================
// Render Snapshot
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct CharacterView {
    pub id: CharacterId,
    pub kind: CharacterKind,
    pub class: CharacterClass,
    pub position: Vec3,
    pub facing: f32,
    pub anim: AnimKey,
    pub health: f32,
    pub max_health: f32,
    pub opacity: f32,
    pub respawn_in: f32,
    pub color: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProjectileView {
    pub id: ProjectileId,
    pub ability: Ability,
    pub position: Vec3,
    pub color: String,
    // Bolts leave a light trail, mortars do not.
    pub trail_light: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SplashView {
    pub id: SplashId,
    pub center: Vec3,
    pub radius: f32,
    pub opacity: f32,
    pub color: String,
}

// Everything a renderer needs for one frame. Built after the tick, never mutated.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Scene {
    pub characters: Vec<CharacterView>,
    pub projectiles: Vec<ProjectileView>,
    pub splashes: Vec<SplashView>,
    pub scoreboard: Vec<ScoreRow>,
    pub paused: bool,
}

impl Scene {
    #[must_use]
    pub fn character(&self, id: CharacterId) -> Option<&CharacterView> {
        self.characters.iter().find(|c| c.id == id)
    }
}
