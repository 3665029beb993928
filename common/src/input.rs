use bevy_math::Vec2;

use crate::protocol::CharacterClass;

// ============================================================================
// Input
// ============================================================================

// Read once per tick by the arena loop. Buttons are level-triggered.
pub trait Input {
    // Movement intent in [-1, 1]^2; x is world x, y is world z.
    fn move_vector(&self) -> Vec2;
    // Cursor projected onto the ground plane, if it hits it.
    fn aim_target(&self) -> Option<Vec2>;
    fn jump_pressed(&self) -> bool;
    fn fire_bolt_pressed(&self) -> bool;
    fn fire_mortar_pressed(&self) -> bool;
    fn melee_pressed(&self) -> bool {
        false
    }
    fn levitate_held(&self) -> bool {
        false
    }
    fn switch_class(&self) -> Option<CharacterClass> {
        None
    }
    fn is_running(&self) -> bool;
}

// Plain snapshot of every control, usable directly or filled in by a host.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct InputFrame {
    pub move_vector: Vec2,
    pub aim_target: Option<Vec2>,
    pub jump: bool,
    pub fire_bolt: bool,
    pub fire_mortar: bool,
    pub melee: bool,
    pub levitate: bool,
    pub switch_to: Option<CharacterClass>,
    pub running: bool,
}

impl InputFrame {
    #[must_use]
    pub fn running() -> Self {
        Self {
            running: true,
            ..Self::default()
        }
    }
}

impl Input for InputFrame {
    fn move_vector(&self) -> Vec2 {
        self.move_vector.clamp(Vec2::NEG_ONE, Vec2::ONE)
    }

    fn aim_target(&self) -> Option<Vec2> {
        self.aim_target
    }

    fn jump_pressed(&self) -> bool {
        self.jump
    }

    fn fire_bolt_pressed(&self) -> bool {
        self.fire_bolt
    }

    fn fire_mortar_pressed(&self) -> bool {
        self.fire_mortar
    }

    fn melee_pressed(&self) -> bool {
        self.melee
    }

    fn levitate_held(&self) -> bool {
        self.levitate
    }

    fn switch_class(&self) -> Option<CharacterClass> {
        self.switch_to
    }

    fn is_running(&self) -> bool {
        self.running
    }
}
