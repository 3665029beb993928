use bevy::prelude::*;

use crate::constants::{AUTOPILOT_MORTAR_MIN_RANGE, AUTOPILOT_PREFERRED_RANGE};
use arena_common::{
    collision::xz,
    game::Arena,
    input::InputFrame,
    protocol::{CharacterClass, CharacterKind},
};

// ============================================================================
// Autopilot
// ============================================================================

// Drives the host's own player so a headless arena exercises every ability.
#[derive(Resource, Debug, Clone)]
pub struct Autopilot {
    pub preferred_range: f32,
    pub mortar_min_range: f32,
    // Swap class every this many seconds; zero keeps the starting class.
    pub switch_every: f32,
    since_switch: f32,
}

impl Default for Autopilot {
    fn default() -> Self {
        Self {
            preferred_range: AUTOPILOT_PREFERRED_RANGE,
            mortar_min_range: AUTOPILOT_MORTAR_MIN_RANGE,
            switch_every: 0.0,
            since_switch: 0.0,
        }
    }
}

impl Autopilot {
    // Close in on the nearest living bot, keep shooting at it, swing when it is in reach.
    pub fn input_for(&mut self, arena: &Arena, dt: f32) -> InputFrame {
        let idle = InputFrame::running();
        let Some(me) = arena
            .local_player()
            .and_then(|id| arena.character(id))
            .filter(|c| c.is_alive())
        else {
            return idle;
        };

        let mut switch_to = None;
        if self.switch_every > 0.0 {
            self.since_switch += dt;
            if self.since_switch >= self.switch_every {
                self.since_switch = 0.0;
                switch_to = Some(match me.class {
                    CharacterClass::A => CharacterClass::B,
                    CharacterClass::B => CharacterClass::A,
                });
            }
        }

        let here = xz(me.position);
        let Some(target) = arena
            .characters()
            .values()
            .filter(|c| c.kind == CharacterKind::Bot && c.is_alive())
            .min_by(|a, b| {
                xz(a.position)
                    .distance_squared(here)
                    .total_cmp(&xz(b.position).distance_squared(here))
            })
        else {
            return InputFrame { switch_to, ..idle };
        };

        let offset = xz(target.position) - here;
        let distance = offset.length();
        let reach = arena.stats().melee(me.class).range;
        let move_vector = if distance > self.preferred_range {
            offset.normalize_or_zero()
        } else {
            Vec2::ZERO
        };

        InputFrame {
            move_vector,
            aim_target: Some(xz(target.position)),
            fire_bolt: true,
            fire_mortar: distance >= self.mortar_min_range,
            melee: distance <= reach,
            switch_to,
            ..idle
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arena_common::{game::ArenaConfig, map::ArenaLayout, stats::StatsRegistry};

    fn arena() -> Arena {
        Arena::new(ArenaConfig::default(), StatsRegistry::builtin(), ArenaLayout::open(20.0))
    }

    #[test]
    fn closes_in_and_fires_at_far_bots() {
        let mut arena = arena();
        arena.spawn_player(CharacterClass::A, Some(Vec3::ZERO));
        arena.spawn_bot_at(CharacterClass::B, Vec3::new(0.0, 0.0, 7.0));
        let input = Autopilot::default().input_for(&arena, 0.1);
        assert!((input.move_vector - Vec2::Y).length() < 1e-5);
        assert_eq!(input.aim_target, Some(Vec2::new(0.0, 7.0)));
        assert!(input.fire_bolt && input.fire_mortar && !input.melee);
    }

    #[test]
    fn holds_ground_and_swings_up_close() {
        let mut arena = arena();
        arena.spawn_player(CharacterClass::A, Some(Vec3::ZERO));
        arena.spawn_bot_at(CharacterClass::B, Vec3::new(1.0, 0.0, 0.0));
        let input = Autopilot::default().input_for(&arena, 0.1);
        assert_eq!(input.move_vector, Vec2::ZERO);
        assert!(input.melee && !input.fire_mortar);
    }

    #[test]
    fn idles_without_a_player() {
        let mut arena = arena();
        arena.spawn_bot_at(CharacterClass::B, Vec3::new(1.0, 0.0, 0.0));
        let input = Autopilot::default().input_for(&arena, 0.1);
        assert_eq!(input, InputFrame::running());
    }

    #[test]
    fn switches_class_on_schedule() {
        let mut arena = arena();
        arena.spawn_player(CharacterClass::A, Some(Vec3::ZERO));
        let mut pilot = Autopilot {
            switch_every: 1.0,
            ..Autopilot::default()
        };
        assert_eq!(pilot.input_for(&arena, 0.5).switch_to, None);
        assert_eq!(pilot.input_for(&arena, 0.5).switch_to, Some(CharacterClass::B));
    }
}
