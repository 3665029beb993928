use std::collections::BTreeMap;

use bevy_math::Vec3;
use tracing::trace;

use crate::{
    character::Character,
    collision::xz,
    combat::Hit,
    constants::{PHYSICS_EPSILON, SPLASH_EXPAND_DURATION, SPLASH_HEIGHT_TOLERANCE, SPLASH_TICKS_PER_SECOND},
    events::{DamageSource, GameEvent},
    protocol::{CharacterClass, CharacterId, SplashId},
    stats::MortarStats,
};

// ============================================================================
// Splash Area
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SplashPhase {
    Expanding,
    Holding,
    Shrinking,
    Removed,
}

// A burning disk on the ground left behind by a mortar.
#[derive(Debug, Clone, PartialEq)]
pub struct SplashArea {
    pub id: SplashId,
    pub shooter: CharacterId,
    pub class: CharacterClass,
    pub position: Vec3,
    pub initial_radius: f32,
    pub current_radius: f32,
    pub lifetime: f32,
    pub expand_duration: f32,
    pub shrink_delay: f32,
    pub shrink_duration: f32,
    pub total_duration: f32,
    pub tick_accumulator: f32,
    pub damage_per_tick: f32,
    // Areas mirrored from a peer burn visually but deal no damage here.
    pub authoritative: bool,
}

impl SplashArea {
    // The whole lifecycle fits inside `fireDuration`: a short expand, a hold of up to `shrinkDelay`,
    // and the remainder spent shrinking.
    #[must_use]
    pub fn new(
        id: SplashId,
        shooter: CharacterId,
        class: CharacterClass,
        position: Vec3,
        stats: &MortarStats,
        authoritative: bool,
    ) -> Self {
        let total_duration = stats.fire_duration.max(0.0);
        let expand_duration = SPLASH_EXPAND_DURATION.min(total_duration);
        let shrink_delay = stats.shrink_delay.clamp(0.0, total_duration - expand_duration);
        let shrink_duration = total_duration - expand_duration - shrink_delay;

        Self {
            id,
            shooter,
            class,
            position,
            initial_radius: stats.splash_radius.max(0.0),
            current_radius: 0.0,
            lifetime: 0.0,
            expand_duration,
            shrink_delay,
            shrink_duration,
            total_duration,
            tick_accumulator: 0.0,
            damage_per_tick: stats.area_damage,
            authoritative,
        }
    }

    #[must_use]
    pub fn phase(&self) -> SplashPhase {
        if self.lifetime >= self.total_duration {
            SplashPhase::Removed
        } else if self.lifetime < self.expand_duration {
            SplashPhase::Expanding
        } else if self.lifetime < self.expand_duration + self.shrink_delay {
            SplashPhase::Holding
        } else {
            SplashPhase::Shrinking
        }
    }

    #[must_use]
    pub fn radius_at(&self, lifetime: f32) -> f32 {
        let hold_end = self.expand_duration + self.shrink_delay;
        if lifetime >= self.total_duration {
            0.0
        } else if lifetime < self.expand_duration {
            self.initial_radius * (lifetime / self.expand_duration)
        } else if lifetime < hold_end || self.shrink_duration < PHYSICS_EPSILON {
            self.initial_radius
        } else {
            let t = lifetime - hold_end;
            self.initial_radius * (1.0 - t / self.shrink_duration).max(0.0)
        }
    }

    // Render opacity follows the radius so the disk fades as it shrinks.
    #[must_use]
    pub fn opacity(&self) -> f32 {
        if self.initial_radius < PHYSICS_EPSILON {
            0.0
        } else {
            (self.current_radius / self.initial_radius).clamp(0.0, 1.0)
        }
    }

    fn covers(&self, character: &Character) -> bool {
        character.is_alive()
            && xz(character.position).distance(xz(self.position)) <= self.current_radius
            && (character.feet_y() - self.position.y).abs() <= SPLASH_HEIGHT_TOLERANCE
    }
}

// ============================================================================
// Splash Area Pool
// ============================================================================

#[derive(Debug, Default)]
pub struct SplashAreaPool {
    areas: Vec<SplashArea>,
    next_id: u32,
}

impl SplashAreaPool {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn spawn(
        &mut self,
        shooter: CharacterId,
        class: CharacterClass,
        position: Vec3,
        stats: &MortarStats,
        authoritative: bool,
        events: &mut Vec<GameEvent>,
    ) -> SplashId {
        let id = SplashId(self.next_id);
        self.next_id = self.next_id.wrapping_add(1);
        let area = SplashArea::new(id, shooter, class, position, stats, authoritative);
        events.push(GameEvent::SplashCreated {
            id,
            shooter,
            position,
            radius: area.initial_radius,
        });
        self.areas.push(area);
        id
    }

    #[must_use]
    pub fn areas(&self) -> &[SplashArea] {
        &self.areas
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.areas.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.areas.is_empty()
    }

    // Advance every area and collect the damage ticks that fell due this step.
    pub fn step(
        &mut self,
        dt: f32,
        characters: &BTreeMap<CharacterId, Character>,
        events: &mut Vec<GameEvent>,
    ) -> Vec<Hit> {
        let period = 1.0 / SPLASH_TICKS_PER_SECOND;
        let mut hits = Vec::new();

        for area in &mut self.areas {
            area.lifetime += dt;
            area.current_radius = area.radius_at(area.lifetime);
            area.tick_accumulator += dt;

            while area.tick_accumulator >= period {
                area.tick_accumulator -= period;
                if !area.authoritative || area.current_radius <= 0.0 {
                    continue;
                }
                for character in characters.values().filter(|c| area.covers(c)) {
                    trace!("{:?} burns {:?}", area.id, character.id);
                    hits.push(Hit {
                        target: character.id,
                        attacker: area.shooter,
                        amount: area.damage_per_tick,
                        source: DamageSource::Splash,
                    });
                }
            }
        }

        self.areas.retain(|area| {
            let alive = area.phase() != SplashPhase::Removed;
            if !alive {
                events.push(GameEvent::SplashRemoved { id: area.id });
            }
            alive
        });

        hits
    }

    pub fn clear(&mut self) {
        self.areas.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{protocol::CharacterKind, stats::StatsRegistry};

    fn mortar() -> MortarStats {
        let mut stats = StatsRegistry::builtin().mortar(CharacterClass::A).clone();
        stats.splash_radius = 0.9;
        stats.fire_duration = 1.75;
        stats.shrink_delay = 0.9;
        stats.area_damage = 8.0;
        stats
    }

    fn area() -> SplashArea {
        SplashArea::new(SplashId(0), CharacterId(1), CharacterClass::A, Vec3::ZERO, &mortar(), true)
    }

    #[test]
    fn durations_partition_the_fire_duration() {
        let a = area();
        assert!((a.expand_duration + a.shrink_delay + a.shrink_duration - a.total_duration).abs() < 1e-6);
        assert!((a.total_duration - 1.75).abs() < 1e-6);
    }

    #[test]
    fn radius_is_piecewise_monotone() {
        let a = area();
        assert!((a.radius_at(a.expand_duration) - a.initial_radius).abs() < 1e-6);
        assert_eq!(a.radius_at(a.total_duration), 0.0);

        let mut last = 0.0;
        let mut t = 0.0;
        while t < a.expand_duration {
            let r = a.radius_at(t);
            assert!(r >= last);
            last = r;
            t += 0.01;
        }
        let hold_end = a.expand_duration + a.shrink_delay;
        assert_eq!(a.radius_at(hold_end - 0.01), a.initial_radius);
        let mut last = f32::INFINITY;
        let mut t = hold_end;
        while t < a.total_duration {
            let r = a.radius_at(t);
            assert!(r <= last);
            last = r;
            t += 0.01;
        }
    }

    #[test]
    fn short_fire_duration_squeezes_phases() {
        let mut stats = mortar();
        stats.fire_duration = 0.2;
        let a = SplashArea::new(SplashId(0), CharacterId(1), CharacterClass::A, Vec3::ZERO, &stats, true);
        assert!((a.expand_duration - 0.2).abs() < 1e-6);
        assert_eq!(a.shrink_delay, 0.0);
        assert_eq!(a.shrink_duration, 0.0);
    }

    #[test]
    fn ticks_damage_characters_inside_the_radius() {
        let stats = StatsRegistry::builtin();
        let victim = Character::new(
            CharacterId(2),
            CharacterKind::Bot,
            CharacterClass::A,
            stats.character(CharacterClass::A),
            Vec3::new(0.2, 0.0, 0.0),
        );
        let far = Character::new(
            CharacterId(3),
            CharacterKind::Bot,
            CharacterClass::A,
            stats.character(CharacterClass::A),
            Vec3::new(3.0, 0.0, 0.0),
        );
        let characters: BTreeMap<_, _> = [(victim.id, victim), (far.id, far)].into_iter().collect();

        let mut pool = SplashAreaPool::new();
        let mut events = Vec::new();
        pool.spawn(CharacterId(1), CharacterClass::A, Vec3::ZERO, &mortar(), true, &mut events);

        let mut hits = Vec::new();
        for _ in 0..120 {
            hits.extend(pool.step(1.0 / 60.0, &characters, &mut events));
        }
        assert!(pool.is_empty());
        assert!(events.iter().any(|e| matches!(e, GameEvent::SplashRemoved { .. })));
        assert!(hits.iter().all(|h| h.target == CharacterId(2) && h.attacker == CharacterId(1)));
        assert!(hits.len() >= 4 && hits.len() <= 9);
    }

    #[test]
    fn zero_dt_leaves_areas_untouched() {
        let mut pool = SplashAreaPool::new();
        let mut events = Vec::new();
        pool.spawn(CharacterId(1), CharacterClass::A, Vec3::ZERO, &mortar(), true, &mut events);
        let before = pool.areas()[0].clone();
        let hits = pool.step(0.0, &BTreeMap::new(), &mut events);
        assert!(hits.is_empty());
        assert_eq!(pool.areas()[0], before);
    }
}
