use std::collections::{BTreeMap, HashMap};

use tracing::debug;

use crate::{
    character::Character,
    collision::xz,
    combat::Hit,
    constants::PHYSICS_EPSILON,
    events::{DamageSource, GameEvent},
    protocol::CharacterId,
    stats::MeleeStats,
};

// ============================================================================
// Swings & Poison
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
struct Swing {
    attacker: CharacterId,
    remaining: f32,
    accumulator: f32,
    stats: MeleeStats,
}

#[derive(Debug, Clone, PartialEq)]
struct Poison {
    poisoner: CharacterId,
    remaining: f32,
    accumulator: f32,
    damage: f32,
    interval: f32,
    slow: f32,
}

impl Poison {
    fn from_stats(poisoner: CharacterId, stats: &MeleeStats) -> Self {
        Self {
            poisoner,
            remaining: stats.poison_duration,
            accumulator: 0.0,
            damage: stats.poison_damage,
            interval: stats.poison_tick_interval,
            slow: stats.slow_speed_multiplier.clamp(0.0, 1.0),
        }
    }
}

// Consume whole intervals from an accumulator, returning how many elapsed.
fn drain_ticks(accumulator: &mut f32, interval: f32) -> u32 {
    if interval < PHYSICS_EPSILON {
        return 0;
    }
    let mut ticks = 0;
    while *accumulator >= interval {
        *accumulator -= interval;
        ticks += 1;
    }
    ticks
}

fn in_reach(attacker: &Character, range: f32) -> impl Fn(&&Character) -> bool + '_ {
    move |c: &&Character| {
        c.id != attacker.id && c.is_alive() && xz(c.position).distance(xz(attacker.position)) <= range
    }
}

// ============================================================================
// Melee Resolver
// ============================================================================

#[derive(Debug, Default)]
pub struct MeleeResolver {
    cooldowns: HashMap<CharacterId, f32>,
    swings: Vec<Swing>,
    poisons: HashMap<CharacterId, Poison>,
}

impl MeleeResolver {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn can_swing(&self, attacker: CharacterId) -> bool {
        self.cooldowns.get(&attacker).is_none_or(|&left| left <= 0.0)
    }

    #[must_use]
    pub fn is_swinging(&self, attacker: CharacterId) -> bool {
        self.swings.iter().any(|s| s.attacker == attacker)
    }

    #[must_use]
    pub fn is_poisoned(&self, id: CharacterId) -> bool {
        self.poisons.contains_key(&id)
    }

    // Movement multiplier while poisoned; 1 otherwise.
    #[must_use]
    pub fn speed_multiplier(&self, id: CharacterId) -> f32 {
        self.poisons.get(&id).map_or(1.0, |p| p.slow)
    }

    // Start a swing: immediate damage to everyone in range, poison them, keep ticking for the animation.
    // Returns None when the swing is refused.
    pub fn swing(
        &mut self,
        attacker: &Character,
        stats: &MeleeStats,
        characters: &BTreeMap<CharacterId, Character>,
        events: &mut Vec<GameEvent>,
    ) -> Option<Vec<Hit>> {
        if !attacker.is_alive() || !self.can_swing(attacker.id) {
            return None;
        }
        self.cooldowns.insert(attacker.id, stats.cooldown);

        let hits: Vec<Hit> = characters
            .values()
            .filter(in_reach(attacker, stats.range))
            .map(|target| Hit {
                target: target.id,
                attacker: attacker.id,
                amount: stats.initial_damage,
                source: DamageSource::Melee,
            })
            .collect();

        for hit in &hits {
            self.poisons.insert(hit.target, Poison::from_stats(attacker.id, stats));
        }

        debug!("{:?} swings, {} in reach", attacker.id, hits.len());
        events.push(GameEvent::MeleeSwing {
            attacker: attacker.id,
            targets: hits.len(),
        });
        self.swings.push(Swing {
            attacker: attacker.id,
            remaining: stats.animation_duration,
            accumulator: 0.0,
            stats: stats.clone(),
        });
        Some(hits)
    }

    // Advance cooldowns, running swings and poison. Returns the damage that fell due.
    pub fn step(&mut self, dt: f32, characters: &BTreeMap<CharacterId, Character>) -> Vec<Hit> {
        for left in self.cooldowns.values_mut() {
            *left = (*left - dt).max(0.0);
        }

        let mut hits = Vec::new();
        let mut refreshed = Vec::new();

        self.swings.retain_mut(|swing| {
            let Some(attacker) = characters.get(&swing.attacker).filter(|c| c.is_alive()) else {
                return false;
            };
            swing.remaining -= dt;
            swing.accumulator += dt;
            for _ in 0..drain_ticks(&mut swing.accumulator, swing.stats.tick_interval) {
                for target in characters.values().filter(in_reach(attacker, swing.stats.range)) {
                    hits.push(Hit {
                        target: target.id,
                        attacker: swing.attacker,
                        amount: swing.stats.damage,
                        source: DamageSource::Melee,
                    });
                    refreshed.push((target.id, Poison::from_stats(swing.attacker, &swing.stats)));
                }
            }
            swing.remaining > 0.0
        });

        self.poisons.retain(|id, poison| {
            if !characters.get(id).is_some_and(Character::is_alive) {
                return false;
            }
            poison.accumulator += dt;
            let ticks = drain_ticks(&mut poison.accumulator, poison.interval);
            for _ in 0..ticks {
                hits.push(Hit {
                    target: *id,
                    attacker: poison.poisoner,
                    amount: poison.damage,
                    source: DamageSource::Poison,
                });
            }
            poison.remaining -= dt;
            poison.remaining > 0.0
        });

        // Re-hits restart the poison clock.
        for (id, poison) in refreshed {
            self.poisons.insert(id, poison);
        }

        hits
    }

    // Drop everything tied to a character, e.g. when it dies, respawns or leaves.
    pub fn clear(&mut self, id: CharacterId) {
        self.cooldowns.remove(&id);
        self.poisons.remove(&id);
        self.swings.retain(|s| s.attacker != id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        protocol::{CharacterClass, CharacterKind},
        stats::StatsRegistry,
    };
    use bevy_math::Vec3;

    fn roster() -> BTreeMap<CharacterId, Character> {
        let stats = StatsRegistry::builtin();
        [(1, 0.0), (2, 1.0), (3, 5.0)]
            .into_iter()
            .map(|(raw, x)| {
                let c = Character::new(
                    CharacterId(raw),
                    CharacterKind::Bot,
                    CharacterClass::A,
                    stats.character(CharacterClass::A),
                    Vec3::new(x, 0.0, 0.0),
                );
                (c.id, c)
            })
            .collect()
    }

    fn melee() -> MeleeStats {
        StatsRegistry::builtin().melee(CharacterClass::B).clone()
    }

    #[test]
    fn swing_hits_only_characters_in_range() {
        let chars = roster();
        let mut resolver = MeleeResolver::new();
        let mut events = Vec::new();
        let hits = resolver
            .swing(&chars[&CharacterId(1)], &melee(), &chars, &mut events)
            .expect("ready");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].target, CharacterId(2));
        assert_eq!(hits[0].amount, melee().initial_damage);
        assert!(resolver.is_poisoned(CharacterId(2)));
        assert!(!resolver.is_poisoned(CharacterId(3)));
        assert!((resolver.speed_multiplier(CharacterId(2)) - melee().slow_speed_multiplier).abs() < 1e-6);
    }

    #[test]
    fn swing_respects_cooldown() {
        let chars = roster();
        let mut resolver = MeleeResolver::new();
        let mut events = Vec::new();
        assert!(resolver.swing(&chars[&CharacterId(1)], &melee(), &chars, &mut events).is_some());
        assert!(resolver.swing(&chars[&CharacterId(1)], &melee(), &chars, &mut events).is_none());
        resolver.step(melee().cooldown + 0.01, &chars);
        assert!(resolver.can_swing(CharacterId(1)));
    }

    #[test]
    fn swing_ticks_during_animation_and_poison_wears_off() {
        let chars = roster();
        let stats = melee();
        let mut resolver = MeleeResolver::new();
        resolver.swing(&chars[&CharacterId(1)], &stats, &chars, &mut Vec::new());

        let mut melee_hits = 0;
        let mut poison_hits = 0;
        let dt = 1.0 / 60.0;
        for _ in 0..(60 * 6) {
            for hit in resolver.step(dt, &chars) {
                match hit.source {
                    DamageSource::Melee => melee_hits += 1,
                    DamageSource::Poison => poison_hits += 1,
                    _ => {}
                }
            }
        }
        let expected_swing_ticks = (stats.animation_duration / stats.tick_interval).floor() as i32;
        assert!((melee_hits - expected_swing_ticks).abs() <= 1);
        assert!(poison_hits > 0);
        assert!(!resolver.is_poisoned(CharacterId(2)));
        assert!(!resolver.is_swinging(CharacterId(1)));
    }
}
