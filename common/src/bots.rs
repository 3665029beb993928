use std::{collections::BTreeMap, f32::consts::PI};

use bevy_math::{Vec2, Vec3};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::{
    character::Character,
    collision::{Aabb, xz},
    constants::{BOT_BOUNCE_JITTER, BOT_LEARNING_MIN_SHOTS},
    persistence::BotLearning,
    physics::heading,
    protocol::CharacterId,
    stats::BoltStats,
    world::World,
};

// ============================================================================
// Difficulty
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    #[default]
    Medium,
    Hard,
}

impl Difficulty {
    pub const ALL: [Self; 3] = [Self::Easy, Self::Medium, Self::Hard];

    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::Easy => "easy",
            Self::Medium => "medium",
            Self::Hard => "hard",
        }
    }
}

impl std::str::FromStr for Difficulty {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|d| d.key().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown difficulty {s:?}"))
    }
}

// ============================================================================
// Tuning
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BotTuning {
    pub speed_factor: f32,
    pub direction_interval: (f32, f32),
    pub follow_distance: f32,
    pub avoidance_distance: f32,
    pub shoot_variance: f32,
    pub shoot_range: f32,
}

impl BotTuning {
    #[must_use]
    pub const fn for_difficulty(difficulty: Difficulty) -> Self {
        match difficulty {
            Difficulty::Easy => Self {
                speed_factor: 0.6,
                direction_interval: (2.0, 4.0),
                follow_distance: 7.0,
                avoidance_distance: 2.5,
                shoot_variance: 1.2,
                shoot_range: 7.0,
            },
            Difficulty::Medium => Self {
                speed_factor: 0.8,
                direction_interval: (1.5, 3.0),
                follow_distance: 9.0,
                avoidance_distance: 2.0,
                shoot_variance: 0.6,
                shoot_range: 9.0,
            },
            Difficulty::Hard => Self {
                speed_factor: 1.0,
                direction_interval: (1.0, 2.0),
                follow_distance: 12.0,
                avoidance_distance: 1.5,
                shoot_variance: 0.2,
                shoot_range: 11.0,
            },
        }
    }

    // Bots that keep missing chase from further out; accurate bots hang back.
    #[must_use]
    pub fn with_learning(mut self, learning: &BotLearning) -> Self {
        if let Some(rate) = learning.hit_rate(BOT_LEARNING_MIN_SHOTS) {
            let scale = 0.5f32.mul_add(-rate, 1.25).clamp(0.75, 1.25);
            self.follow_distance = (self.follow_distance * scale).max(self.avoidance_distance + 0.5);
        }
        self
    }
}

impl Default for BotTuning {
    fn default() -> Self {
        Self::for_difficulty(Difficulty::default())
    }
}

// ============================================================================
// Bot State
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BotIntent {
    Pursue,
    Evade,
    #[default]
    Wander,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BotState {
    // Heading in radians, measured from +x toward +z.
    pub direction: f32,
    pub change_direction_timer: f32,
    pub change_direction_interval: f32,
    pub shoot_cooldown: f32,
    pub intent: BotIntent,
}

// What a bot wants to do this tick. The arena applies it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BotDecision {
    pub displacement: Vec2,
    pub facing: f32,
    pub fire_at: Option<Vec2>,
    pub intent: BotIntent,
    pub bounced: bool,
}

fn wrap_angle(angle: f32) -> f32 {
    (angle + PI).rem_euclid(2.0 * PI) - PI
}

// ============================================================================
// Bot Controller
// ============================================================================

#[derive(Debug, Default)]
pub struct BotController {
    bots: BTreeMap<CharacterId, BotState>,
    tuning: BotTuning,
}

impl BotController {
    #[must_use]
    pub fn new(tuning: BotTuning) -> Self {
        Self {
            bots: BTreeMap::new(),
            tuning,
        }
    }

    #[must_use]
    pub const fn tuning(&self) -> &BotTuning {
        &self.tuning
    }

    pub const fn set_tuning(&mut self, tuning: BotTuning) {
        self.tuning = tuning;
    }

    pub fn add(&mut self, id: CharacterId, rng: &mut impl Rng) -> &mut BotState {
        let (min, max) = self.tuning.direction_interval;
        self.bots.entry(id).or_insert_with(|| BotState {
            direction: rng.random_range(-PI..PI),
            change_direction_timer: 0.0,
            change_direction_interval: rng.random_range(min..=max),
            shoot_cooldown: 0.0,
            intent: BotIntent::Wander,
        })
    }

    pub fn remove(&mut self, id: CharacterId) {
        self.bots.remove(&id);
    }

    #[must_use]
    pub fn contains(&self, id: CharacterId) -> bool {
        self.bots.contains_key(&id)
    }

    #[must_use]
    pub fn state(&self, id: CharacterId) -> Option<&BotState> {
        self.bots.get(&id)
    }

    pub fn state_mut(&mut self, id: CharacterId) -> Option<&mut BotState> {
        self.bots.get_mut(&id)
    }

    pub fn ids(&self) -> impl Iterator<Item = CharacterId> + '_ {
        self.bots.keys().copied()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.bots.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bots.is_empty()
    }

    // A fresh life starts ready to shoot.
    pub fn on_respawn(&mut self, id: CharacterId) {
        if let Some(state) = self.bots.get_mut(&id) {
            state.shoot_cooldown = 0.0;
            state.change_direction_timer = 0.0;
            state.intent = BotIntent::Wander;
        }
    }

    // One tick of the wander / pursue / evade policy for bot `me` against `target`.
    pub fn decide(
        &mut self,
        me: &Character,
        target: Option<&Character>,
        world: &World,
        bolt: &BoltStats,
        can_fire: bool,
        speed_multiplier: f32,
        dt: f32,
        rng: &mut impl Rng,
    ) -> Option<BotDecision> {
        let tuning = self.tuning;
        let state = self.bots.get_mut(&me.id)?;

        state.change_direction_timer += dt;
        if state.change_direction_timer > state.change_direction_interval {
            let (min, max) = tuning.direction_interval;
            state.direction = rng.random_range(-PI..PI);
            state.change_direction_interval = rng.random_range(min..=max);
            state.change_direction_timer = 0.0;
        }

        let here = xz(me.position);
        let target = target.filter(|t| t.is_alive());
        let offset = target.map(|t| xz(t.position) - here);
        let distance = offset.map_or(f32::INFINITY, Vec2::length);
        let visible = target.is_some_and(|t| !world.sweep_collides(me.position, t.position, 0.0));

        state.intent = BotIntent::Wander;
        if let Some(offset) = offset {
            let chase = visible && tuning.avoidance_distance < distance && distance < tuning.follow_distance;
            let flee = distance <= tuning.avoidance_distance;
            let wanted = if chase {
                heading(offset).ok().map(|v| (BotIntent::Pursue, v))
            } else if flee {
                heading(-offset).ok().map(|v| (BotIntent::Evade, v))
            } else {
                None
            };
            if let Some((intent, v)) = wanted {
                state.intent = intent;
                state.direction = v.y.atan2(v.x);
            }
        }

        let speed = me.move_speed * tuning.speed_factor * speed_multiplier;
        let mut displacement = Vec2::from_angle(state.direction) * speed * dt;
        let next = me.position + Vec3::new(displacement.x, 0.0, displacement.y);
        let leaves_arena = {
            let clamped = world.constrain_to_arena(next, me.size);
            clamped.x != next.x || clamped.z != next.z
        };
        let bounced = dt > 0.0 && (leaves_arena || world.will_collide(&Aabb::character(next, me.size, me.height)));
        if bounced {
            let jitter = if rng.random_bool(0.5) { BOT_BOUNCE_JITTER } else { -BOT_BOUNCE_JITTER };
            state.direction = wrap_angle(state.direction + PI + jitter);
            displacement = Vec2::ZERO;
            trace!("{:?} bounced, new heading {:.2}", me.id, state.direction);
        }

        state.shoot_cooldown -= dt;
        let mut fire_at = None;
        if state.shoot_cooldown <= 0.0
            && can_fire
            && distance < tuning.shoot_range
            && distance <= bolt.projectile_speed * bolt.lifetime
            && let Some(offset) = offset
        {
            fire_at = Some(offset);
            state.shoot_cooldown = bolt.cooldown + rng.random_range(0.0..=tuning.shoot_variance.max(0.0));
        }

        Some(BotDecision {
            displacement,
            facing: state.direction,
            fire_at,
            intent: state.intent,
            bounced,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        protocol::{CharacterClass, CharacterKind},
        stats::StatsRegistry,
        world::Obstacle,
    };
    use rand::{SeedableRng, rngs::StdRng};

    fn character(id: u32, kind: CharacterKind, x: f32) -> Character {
        let stats = StatsRegistry::builtin();
        Character::new(
            CharacterId(id),
            kind,
            CharacterClass::A,
            stats.character(CharacterClass::A),
            Vec3::new(x, 0.0, 0.0),
        )
    }

    fn controller_with(bot: &Character, direction: f32, rng: &mut StdRng) -> BotController {
        let mut controller = BotController::new(BotTuning::for_difficulty(Difficulty::Hard));
        let state = controller.add(bot.id, rng);
        state.direction = direction;
        state.change_direction_interval = 100.0;
        state.shoot_cooldown = 100.0;
        controller
    }

    #[test]
    fn pursues_a_visible_player_in_the_follow_band() {
        let mut rng = StdRng::seed_from_u64(5);
        let bot = character(1, CharacterKind::Bot, 0.0);
        let player = character(2, CharacterKind::Player, 5.0);
        let world = World::new(20.0, Vec::new());
        let bolt = StatsRegistry::builtin().bolt(CharacterClass::A).clone();
        let mut controller = controller_with(&bot, PI / 2.0, &mut rng);

        let decision = controller
            .decide(&bot, Some(&player), &world, &bolt, true, 1.0, 0.1, &mut rng)
            .expect("known bot");
        assert_eq!(decision.intent, BotIntent::Pursue);
        assert!(decision.displacement.x > 0.0);
        assert!(decision.facing.abs() < 1e-5);
    }

    #[test]
    fn evades_when_too_close() {
        let mut rng = StdRng::seed_from_u64(5);
        let bot = character(1, CharacterKind::Bot, 0.0);
        let player = character(2, CharacterKind::Player, 1.0);
        let world = World::new(20.0, Vec::new());
        let bolt = StatsRegistry::builtin().bolt(CharacterClass::A).clone();
        let mut controller = controller_with(&bot, 0.0, &mut rng);

        let decision = controller
            .decide(&bot, Some(&player), &world, &bolt, true, 1.0, 0.1, &mut rng)
            .expect("known bot");
        assert_eq!(decision.intent, BotIntent::Evade);
        assert!(decision.displacement.x < 0.0);
    }

    #[test]
    fn wanders_when_the_player_hides_behind_a_wall() {
        let mut rng = StdRng::seed_from_u64(5);
        let bot = character(1, CharacterKind::Bot, 0.0);
        let player = character(2, CharacterKind::Player, 6.0);
        let world = World::new(
            20.0,
            vec![Obstacle::wall(Vec3::new(3.0, 0.0, -2.0), Vec3::new(3.5, 1.5, 2.0))],
        );
        let bolt = StatsRegistry::builtin().bolt(CharacterClass::A).clone();
        let mut controller = controller_with(&bot, PI / 2.0, &mut rng);

        let decision = controller
            .decide(&bot, Some(&player), &world, &bolt, true, 1.0, 0.1, &mut rng)
            .expect("known bot");
        assert_eq!(decision.intent, BotIntent::Wander);
        assert!(decision.displacement.y > 0.0);
    }

    #[test]
    fn shoots_only_when_ready_and_in_range() {
        let mut rng = StdRng::seed_from_u64(9);
        let bot = character(1, CharacterKind::Bot, 0.0);
        let near = character(2, CharacterKind::Player, 4.0);
        let far = character(3, CharacterKind::Player, 9.5);
        let world = World::new(30.0, Vec::new());
        let bolt = StatsRegistry::builtin().bolt(CharacterClass::A).clone();
        let mut controller = controller_with(&bot, 0.0, &mut rng);
        controller.state_mut(bot.id).expect("known bot").shoot_cooldown = 0.0;

        let refused = controller
            .decide(&bot, Some(&near), &world, &bolt, false, 1.0, 0.016, &mut rng)
            .expect("known bot");
        assert!(refused.fire_at.is_none());

        let fired = controller
            .decide(&bot, Some(&near), &world, &bolt, true, 1.0, 0.016, &mut rng)
            .expect("known bot");
        assert!(fired.fire_at.is_some_and(|v| v.x > 0.0));
        let cooldown = controller.state(bot.id).expect("known bot").shoot_cooldown;
        assert!(cooldown >= bolt.cooldown - 0.02);

        // A bolt that cannot cover the distance within its lifetime is not worth firing.
        controller.on_respawn(bot.id);
        controller.set_tuning(BotTuning {
            shoot_range: 20.0,
            ..*controller.tuning()
        });
        let slow = BoltStats {
            projectile_speed: 1.0,
            ..bolt
        };
        let out_of_reach = controller
            .decide(&bot, Some(&far), &world, &slow, true, 1.0, 0.016, &mut rng)
            .expect("known bot");
        assert!(out_of_reach.fire_at.is_none());
    }

    #[test]
    fn learning_scales_follow_distance() {
        let base = BotTuning::for_difficulty(Difficulty::Medium);
        let sloppy = BotLearning {
            shots_fired: 100,
            shots_hit: 0,
            ..BotLearning::default()
        };
        let sharp = BotLearning {
            shots_fired: 100,
            shots_hit: 100,
            ..BotLearning::default()
        };
        let fresh = BotLearning::default();
        assert!(base.with_learning(&sloppy).follow_distance > base.follow_distance);
        assert!(base.with_learning(&sharp).follow_distance < base.follow_distance);
        assert_eq!(base.with_learning(&fresh), base);
    }

    #[test]
    fn difficulty_parses_from_key() {
        assert_eq!("HARD".parse::<Difficulty>(), Ok(Difficulty::Hard));
        assert!("brutal".parse::<Difficulty>().is_err());
    }
}
