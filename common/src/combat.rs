use std::{collections::BTreeMap, time::Duration};

use bevy_math::{Vec2, Vec3};
use rand::Rng;
use tracing::{debug, info};

use crate::{
    character::Character,
    collision::{separation_push, xz},
    constants::{RESPAWN_AREA_RATIO, SPAWN_CLEARANCE, STREAK_WINDOW},
    error::ArenaError,
    events::{DamageSource, GameEvent},
    protocol::{AnimKey, CharacterId},
    world::World,
};

// ============================================================================
// Game Mode
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GameMode {
    #[default]
    Practice,
    Pvp,
}

impl GameMode {
    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::Practice => "practice",
            Self::Pvp => "pvp",
        }
    }

    // Pvp forbids hopping over cover walls.
    #[must_use]
    pub const fn blocks_jump_over(self) -> bool {
        matches!(self, Self::Pvp)
    }
}

impl std::str::FromStr for GameMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "practice" => Ok(Self::Practice),
            "pvp" => Ok(Self::Pvp),
            other => Err(format!("unknown game mode {other:?}")),
        }
    }
}

// ============================================================================
// Damage Requests
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DamageOutcome {
    // Nothing changed: zero damage or an already dying target.
    Ignored,
    Damaged,
    Killed,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hit {
    pub target: CharacterId,
    pub attacker: CharacterId,
    pub amount: f32,
    pub source: DamageSource,
}

// ============================================================================
// Scoreboard
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct Tally {
    kills: u32,
    deaths: u32,
    hit_streak: u32,
    last_hit_at: Option<f32>,
    kill_streak: u32,
    best_streak: u32,
    last_kill_at: Option<f32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScoreRow {
    pub id: CharacterId,
    pub kills: u32,
    pub deaths: u32,
    pub streak: u32,
    pub best_streak: u32,
}

// Successive events within `STREAK_WINDOW` of the previous one extend a streak.
fn bump_streak(streak: &mut u32, last_at: &mut Option<f32>, now: f32) -> u32 {
    let within = last_at.is_some_and(|last| now - last <= STREAK_WINDOW);
    *streak = if within { *streak + 1 } else { 1 };
    *last_at = Some(now);
    *streak
}

// ============================================================================
// Combat Resolver
// ============================================================================

#[derive(Debug, Default)]
pub struct CombatResolver {
    tallies: BTreeMap<CharacterId, Tally>,
    clock: f32,
}

impl CombatResolver {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // Streak windows are measured on this clock, advanced once per tick.
    pub fn advance(&mut self, dt: f32) {
        self.clock += dt.max(0.0);
    }

    #[must_use]
    pub const fn clock(&self) -> f32 {
        self.clock
    }

    // Apply `hit` to its target. Zero or negative amounts change nothing; dead targets take no damage.
    pub fn apply_damage(
        &mut self,
        characters: &mut BTreeMap<CharacterId, Character>,
        hit: Hit,
        events: &mut Vec<GameEvent>,
    ) -> Result<DamageOutcome, ArenaError> {
        if hit.amount.is_nan() || hit.amount <= 0.0 {
            return Ok(DamageOutcome::Ignored);
        }

        let target = characters
            .get_mut(&hit.target)
            .ok_or(ArenaError::EntityNotFound(hit.target))?;
        if !target.is_alive() {
            return Ok(DamageOutcome::Ignored);
        }

        target.health = (target.health - hit.amount).clamp(0.0, target.max_health);
        let remaining = target.health;
        events.push(GameEvent::Damage {
            target: hit.target,
            attacker: hit.attacker,
            amount: hit.amount,
            remaining,
            source: hit.source,
        });

        if hit.source.is_direct() && hit.attacker != hit.target {
            let now = self.clock;
            let tally = self.tallies.entry(hit.attacker).or_default();
            bump_streak(&mut tally.hit_streak, &mut tally.last_hit_at, now);
        }

        if remaining > 0.0 {
            return Ok(DamageOutcome::Damaged);
        }

        target.is_dying = true;
        target.killer_id = Some(hit.attacker);
        target.anim = AnimKey::Dying;
        target.velocity_y = 0.0;
        target.death_fade.reset();
        info!("{:?} killed by {:?}", hit.target, hit.attacker);
        events.push(GameEvent::Death {
            target: hit.target,
            killer: hit.attacker,
        });

        self.record_kill(hit.attacker, hit.target, events);
        Ok(DamageOutcome::Killed)
    }

    fn record_kill(&mut self, killer: CharacterId, victim: CharacterId, events: &mut Vec<GameEvent>) {
        let now = self.clock;

        let victim_tally = self.tallies.entry(victim).or_default();
        victim_tally.deaths += 1;
        victim_tally.kill_streak = 0;
        victim_tally.last_kill_at = None;
        victim_tally.hit_streak = 0;
        victim_tally.last_hit_at = None;

        if killer == victim {
            return;
        }

        let tally = self.tallies.entry(killer).or_default();
        tally.kills += 1;
        let count = bump_streak(&mut tally.kill_streak, &mut tally.last_kill_at, now);
        tally.best_streak = tally.best_streak.max(count);
        if count > 1 {
            info!("{killer:?} is on a {count}-kill streak");
        }
        events.push(GameEvent::KillStreak { attacker: killer, count });
    }

    // Advance death fades and bring finished characters back. Returns the ids that respawned.
    pub fn update_respawns(
        &mut self,
        characters: &mut BTreeMap<CharacterId, Character>,
        world: &World,
        mode: GameMode,
        rng: &mut impl Rng,
        dt: f32,
        events: &mut Vec<GameEvent>,
    ) -> Vec<CharacterId> {
        let mut respawned = Vec::new();
        let delta = Duration::from_secs_f32(dt.max(0.0));

        for character in characters.values_mut() {
            if !character.is_dying {
                continue;
            }
            character.death_fade.tick(delta);
            if !character.death_fade.is_finished() {
                continue;
            }

            let feet = respawn_point(world, mode, character.size, rng);
            character.respawn_at(feet);
            debug!("{:?} respawned at {:?}", character.id, feet);
            events.push(GameEvent::Respawn {
                id: character.id,
                position: character.position,
            });
            respawned.push(character.id);
        }

        respawned
    }

    #[must_use]
    pub fn kills(&self, id: CharacterId) -> u32 {
        self.tallies.get(&id).map_or(0, |t| t.kills)
    }

    #[must_use]
    pub fn deaths(&self, id: CharacterId) -> u32 {
        self.tallies.get(&id).map_or(0, |t| t.deaths)
    }

    #[must_use]
    pub fn kill_streak(&self, id: CharacterId) -> u32 {
        self.tallies.get(&id).map_or(0, |t| t.kill_streak)
    }

    #[must_use]
    pub fn hit_streak(&self, id: CharacterId) -> u32 {
        self.tallies.get(&id).map_or(0, |t| t.hit_streak)
    }

    // Rows for every character that scored or died, most kills first.
    #[must_use]
    pub fn scoreboard(&self) -> Vec<ScoreRow> {
        let mut rows: Vec<ScoreRow> = self
            .tallies
            .iter()
            .map(|(id, t)| ScoreRow {
                id: *id,
                kills: t.kills,
                deaths: t.deaths,
                streak: t.kill_streak,
                best_streak: t.best_streak,
            })
            .collect();
        rows.sort_by(|a, b| b.kills.cmp(&a.kills).then(a.deaths.cmp(&b.deaths)).then(a.id.cmp(&b.id)));
        rows
    }

    pub fn forget(&mut self, id: CharacterId) {
        self.tallies.remove(&id);
    }
}

// ============================================================================
// Respawn Placement
// ============================================================================

// Pvp picks a random obstacle-free point in the inner part of the arena; practice uses the center.
pub fn respawn_point(world: &World, mode: GameMode, size: f32, rng: &mut impl Rng) -> Vec3 {
    let point = match mode {
        GameMode::Pvp => world.random_open_point(rng, RESPAWN_AREA_RATIO, SPAWN_CLEARANCE),
        GameMode::Practice => Vec2::ZERO,
    };
    let clamped = world.constrain_to_arena(Vec3::new(point.x, 0.0, point.y), size);
    let ground = world.ground_height(clamped.x, clamped.z, size).max(0.0);
    Vec3::new(clamped.x, ground, clamped.z)
}

// ============================================================================
// Inter-Character Separation
// ============================================================================

// Push `desired` out of every other living character in xz. Other characters are never moved.
#[must_use]
pub fn separate_from_others(
    mover: CharacterId,
    desired: Vec3,
    size: f32,
    characters: &BTreeMap<CharacterId, Character>,
) -> Vec3 {
    let mut position = xz(desired);
    for other in characters.values() {
        if other.id == mover || !other.is_alive() {
            continue;
        }
        let combined = size / 2.0 + other.size / 2.0;
        if let Some(push) = separation_push(position, xz(other.position), combined) {
            position += push;
        }
    }
    Vec3::new(position.x, desired.y, position.y)
}
