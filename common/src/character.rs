use bevy_math::Vec3;
use bevy_time::{Timer, TimerMode};

use crate::{
    constants::{CHARACTER_HEIGHT, CHARACTER_SIZE, DEATH_FADE_DURATION},
    protocol::{AnimKey, CharacterClass, CharacterId, CharacterKind},
    stats::CharacterStats,
};

// ============================================================================
// Character
// ============================================================================

// A fighter in the arena. Owned by the arena's character table, referenced elsewhere by id.
#[derive(Debug, Clone)]
pub struct Character {
    pub id: CharacterId,
    pub kind: CharacterKind,
    pub class: CharacterClass,
    // Center of the body box; feet are at `position.y - height / 2`.
    pub position: Vec3,
    pub velocity_y: f32,
    pub facing: f32,
    pub size: f32,
    pub height: f32,
    pub health: f32,
    pub max_health: f32,
    pub move_speed: f32,
    pub is_grounded: bool,
    pub has_double_jumped: bool,
    pub jump_cooldown_remaining: f32,
    pub levitating: bool,
    pub is_dying: bool,
    pub death_fade: Timer,
    pub killer_id: Option<CharacterId>,
    pub anim: AnimKey,
}

impl Character {
    #[must_use]
    pub fn new(id: CharacterId, kind: CharacterKind, class: CharacterClass, stats: &CharacterStats, feet: Vec3) -> Self {
        Self {
            id,
            kind,
            class,
            position: Vec3::new(feet.x, feet.y + CHARACTER_HEIGHT / 2.0, feet.z),
            velocity_y: 0.0,
            facing: 0.0,
            size: CHARACTER_SIZE,
            height: CHARACTER_HEIGHT,
            health: stats.max_health,
            max_health: stats.max_health,
            move_speed: stats.move_speed,
            is_grounded: true,
            has_double_jumped: false,
            jump_cooldown_remaining: 0.0,
            levitating: false,
            is_dying: false,
            death_fade: Timer::from_seconds(DEATH_FADE_DURATION, TimerMode::Once),
            killer_id: None,
            anim: AnimKey::Idle,
        }
    }

    #[must_use]
    pub const fn is_alive(&self) -> bool {
        !self.is_dying && self.health > 0.0
    }

    #[must_use]
    pub fn feet_y(&self) -> f32 {
        self.position.y - self.height / 2.0
    }

    // Seconds left until respawn while dying, zero otherwise.
    #[must_use]
    pub fn respawn_countdown(&self) -> f32 {
        if self.is_dying { self.death_fade.remaining_secs() } else { 0.0 }
    }

    // 1 while alive, fading to 0 over the death fade.
    #[must_use]
    pub fn opacity(&self) -> f32 {
        if self.is_dying { 1.0 - self.death_fade.fraction() } else { 1.0 }
    }

    // Adopt another class's stats, keeping the current health ratio.
    pub fn switch_class(&mut self, class: CharacterClass, stats: &CharacterStats) {
        let ratio = if self.max_health > 0.0 { self.health / self.max_health } else { 1.0 };
        self.class = class;
        self.max_health = stats.max_health;
        self.health = (stats.max_health * ratio).clamp(0.0, stats.max_health);
        self.move_speed = stats.move_speed;
    }

    // Reset everything death touched; the caller picks the new position.
    pub fn respawn_at(&mut self, feet: Vec3) {
        self.position = Vec3::new(feet.x, feet.y + self.height / 2.0, feet.z);
        self.velocity_y = 0.0;
        self.health = self.max_health;
        self.is_grounded = true;
        self.has_double_jumped = false;
        self.jump_cooldown_remaining = 0.0;
        self.is_dying = false;
        self.death_fade.reset();
        self.killer_id = None;
        self.anim = AnimKey::Idle;
    }
}
