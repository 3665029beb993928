use std::{
    collections::{BTreeMap, HashMap},
    time::Duration,
};

use bevy_math::{Vec2, Vec3};
use bevy_time::{Timer, TimerMode};
use tracing::{debug, trace};

use crate::{
    character::Character,
    collision::{Aabb, overlap_bolt_vs_character, overlap_mortar_vs_character, xz},
    combat::Hit,
    constants::{
        BOLT_SPAWN_OFFSET, MORTAR_CLOSE_TO_GROUND_DISTANCE, MORTAR_DIRECT_HIT_RADIUS, MORTAR_MAX_LIFETIME,
        MORTAR_NEAR_TARGET_DISTANCE,
    },
    events::{DamageSource, GameEvent, RemovalReason},
    physics::{bolt_speed_at, bolt_speed_range, heading, mortar_launch, step_ballistic, steer_toward},
    protocol::{Ability, CharacterClass, CharacterId, ProjectileId},
    splash::SplashAreaPool,
    stats::{BoltStats, MortarStats},
    world::World,
};

// ============================================================================
// Projectiles
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct Bolt {
    pub direction: Vec2,
    pub velocity: Vec2,
    pub start_speed: f32,
    pub end_speed: f32,
    pub current_speed: f32,
    pub max_lifetime: f32,
    pub follow_strength: f32,
    pub target: Option<Vec2>,
    pub damage: f32,
    pub has_hit: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Mortar {
    pub velocity: Vec3,
    pub gravity: f32,
    pub target: Vec2,
    pub stats: MortarStats,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ProjectileKind {
    Bolt(Bolt),
    Mortar(Mortar),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Projectile {
    pub id: ProjectileId,
    pub shooter: CharacterId,
    pub class: CharacterClass,
    pub position: Vec3,
    pub size: f32,
    pub lifetime: f32,
    // Mirrored shots from a peer move and vanish here but never deal damage.
    pub authoritative: bool,
    pub kind: ProjectileKind,
}

impl Projectile {
    #[must_use]
    pub const fn ability(&self) -> Ability {
        match self.kind {
            ProjectileKind::Bolt(_) => Ability::Bolt,
            ProjectileKind::Mortar(_) => Ability::Mortar,
        }
    }

    #[must_use]
    pub fn velocity(&self) -> Vec3 {
        match &self.kind {
            ProjectileKind::Bolt(bolt) => Vec3::new(bolt.velocity.x, 0.0, bolt.velocity.y),
            ProjectileKind::Mortar(mortar) => mortar.velocity,
        }
    }
}

// Who fired, from where, and whether this pool owns the outcome.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Shot {
    pub shooter: CharacterId,
    pub class: CharacterClass,
    pub origin: Vec3,
    pub authoritative: bool,
}

impl Shot {
    #[must_use]
    pub const fn from_character(character: &Character) -> Self {
        Self {
            shooter: character.id,
            class: character.class,
            origin: character.position,
            authoritative: true,
        }
    }
}

// ============================================================================
// Fire Cadence
// ============================================================================

// Per-shooter bolt ammo. Emptying the magazine starts a full refill after `rechargeCooldown`.
#[derive(Debug, Clone)]
pub struct Magazine {
    pub ammo: u32,
    pub capacity: u32,
    pub cooldown_remaining: f32,
    pub recharge: Option<Timer>,
}

impl Magazine {
    fn new(capacity: u32) -> Self {
        Self {
            ammo: capacity,
            capacity,
            cooldown_remaining: 0.0,
            recharge: None,
        }
    }

    fn ready(&self) -> bool {
        self.ammo > 0 && self.cooldown_remaining <= 0.0
    }

    fn consume(&mut self, stats: &BoltStats) {
        self.ammo = self.ammo.saturating_sub(1);
        self.cooldown_remaining = stats.cooldown;
        if self.ammo == 0 {
            self.recharge = Some(Timer::from_seconds(stats.recharge_cooldown.max(0.0), TimerMode::Once));
        }
    }

    fn tick(&mut self, dt: f32) {
        self.cooldown_remaining = (self.cooldown_remaining - dt).max(0.0);
        if let Some(timer) = &mut self.recharge {
            timer.tick(Duration::from_secs_f32(dt.max(0.0)));
            if timer.is_finished() {
                self.ammo = self.capacity;
                self.recharge = None;
            }
        }
    }
}

// ============================================================================
// Projectile Pool
// ============================================================================

/// Every live bolt and mortar, plus the per-shooter ammo and cooldown state that gates firing.
#[derive(Debug, Default)]
pub struct ProjectilePool {
    projectiles: Vec<Projectile>,
    magazines: HashMap<CharacterId, Magazine>,
    mortar_cooldowns: HashMap<CharacterId, f32>,
    next_id: u32,
}

impl ProjectilePool {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn projectiles(&self) -> &[Projectile] {
        &self.projectiles
    }

    #[must_use]
    pub fn get(&self, id: ProjectileId) -> Option<&Projectile> {
        self.projectiles.iter().find(|p| p.id == id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.projectiles.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.projectiles.is_empty()
    }

    #[must_use]
    pub fn magazine(&self, shooter: CharacterId) -> Option<&Magazine> {
        self.magazines.get(&shooter)
    }

    // Melee is not a projectile and is never fired through the pool.
    #[must_use]
    pub fn can_fire(&self, shooter: CharacterId, ability: Ability) -> bool {
        match ability {
            Ability::Bolt => self.magazines.get(&shooter).is_none_or(Magazine::ready),
            Ability::Mortar => self.mortar_cooldowns.get(&shooter).is_none_or(|&left| left <= 0.0),
            Ability::Melee => false,
        }
    }

    fn allocate_id(&mut self) -> ProjectileId {
        let id = ProjectileId(self.next_id);
        self.next_id = self.next_id.wrapping_add(1);
        id
    }

    /// Spawn a bolt heading along `direction`. Authoritative shots honor and consume ammo;
    /// mirrored ones always spawn and never deal damage.
    pub fn fire_bolt(
        &mut self,
        shot: Shot,
        stats: &BoltStats,
        direction: Vec2,
        target: Option<Vec2>,
        events: &mut Vec<GameEvent>,
    ) -> Option<ProjectileId> {
        let Ok(direction) = heading(direction) else {
            trace!("{:?} fired a bolt with no direction", shot.shooter);
            return None;
        };

        if shot.authoritative {
            let capacity = stats.bullet_capacity();
            let magazine = self
                .magazines
                .entry(shot.shooter)
                .or_insert_with(|| Magazine::new(capacity));
            magazine.capacity = capacity;
            magazine.ammo = magazine.ammo.min(capacity);
            if !magazine.ready() {
                return None;
            }
            magazine.consume(stats);
        }

        let (start_speed, end_speed) = bolt_speed_range(shot.class, stats);
        let offset = direction * BOLT_SPAWN_OFFSET;
        let position = shot.origin + Vec3::new(offset.x, 0.0, offset.y);
        let id = self.allocate_id();

        self.projectiles.push(Projectile {
            id,
            shooter: shot.shooter,
            class: shot.class,
            position,
            size: stats.size,
            lifetime: 0.0,
            authoritative: shot.authoritative,
            kind: ProjectileKind::Bolt(Bolt {
                direction,
                velocity: direction * start_speed,
                start_speed,
                end_speed,
                current_speed: start_speed,
                max_lifetime: stats.lifetime,
                follow_strength: stats.cursor_follow_strength,
                target,
                damage: stats.damage,
                has_hit: false,
            }),
        });
        events.push(GameEvent::BoltCreated {
            id,
            shooter: shot.shooter,
            class: shot.class,
            position,
        });
        Some(id)
    }

    // Lob a mortar at a ground point, clamped to `maxRange`. Too-close targets spawn nothing.
    pub fn fire_mortar(
        &mut self,
        shot: Shot,
        stats: &MortarStats,
        target: Vec2,
        gravity: f32,
        events: &mut Vec<GameEvent>,
    ) -> Option<ProjectileId> {
        if shot.authoritative && !self.can_fire(shot.shooter, Ability::Mortar) {
            return None;
        }

        let origin_xz = xz(shot.origin);
        let reach = target - origin_xz;
        let target = if reach.length() > stats.max_range {
            origin_xz + reach.clamp_length_max(stats.max_range)
        } else {
            target
        };

        let Some(launch) = mortar_launch(shot.origin, target, stats.arc_height, gravity) else {
            trace!("{:?} mortar target too close, no trajectory", shot.shooter);
            return None;
        };

        if shot.authoritative {
            self.mortar_cooldowns.insert(shot.shooter, stats.cooldown);
        }

        let id = self.allocate_id();
        self.projectiles.push(Projectile {
            id,
            shooter: shot.shooter,
            class: shot.class,
            position: shot.origin,
            size: stats.size,
            lifetime: 0.0,
            authoritative: shot.authoritative,
            kind: ProjectileKind::Mortar(Mortar {
                velocity: launch.velocity,
                gravity,
                target,
                stats: stats.clone(),
            }),
        });
        events.push(GameEvent::MortarLaunched {
            id,
            shooter: shot.shooter,
            class: shot.class,
            position: shot.origin,
            target,
        });
        Some(id)
    }

    // Point every homing bolt of `shooter` at a new target (usually the cursor).
    pub fn retarget(&mut self, shooter: CharacterId, target: Option<Vec2>) {
        for projectile in self.projectiles.iter_mut().filter(|p| p.shooter == shooter) {
            if let ProjectileKind::Bolt(bolt) = &mut projectile.kind {
                bolt.target = target;
            }
        }
    }

    // Forget a shooter's cadence state, e.g. on respawn or when they leave.
    pub fn reset_shooter(&mut self, shooter: CharacterId) {
        self.magazines.remove(&shooter);
        self.mortar_cooldowns.remove(&shooter);
    }

    // ============================================================================
    // Per-Tick Update
    // ============================================================================

    /// Advance cadence timers and every projectile; returns the damage to resolve this tick.
    pub fn step(
        &mut self,
        dt: f32,
        world: &World,
        characters: &BTreeMap<CharacterId, Character>,
        splashes: &mut SplashAreaPool,
        events: &mut Vec<GameEvent>,
    ) -> Vec<Hit> {
        for magazine in self.magazines.values_mut() {
            magazine.tick(dt);
        }
        for left in self.mortar_cooldowns.values_mut() {
            *left = (*left - dt).max(0.0);
        }

        let mut hits = Vec::new();
        let mut kept = Vec::with_capacity(self.projectiles.len());
        for mut projectile in self.projectiles.drain(..) {
            let alive = if matches!(projectile.kind, ProjectileKind::Bolt(_)) {
                step_bolt(&mut projectile, dt, world, characters, &mut hits, events)
            } else {
                step_mortar(&mut projectile, dt, world, characters, splashes, &mut hits, events)
            };
            if alive {
                kept.push(projectile);
            }
        }
        self.projectiles = kept;
        hits
    }

    pub fn clear(&mut self) {
        self.projectiles.clear();
    }
}

fn remove_bolt(id: ProjectileId, position: Vec3, reason: RemovalReason, events: &mut Vec<GameEvent>) -> bool {
    events.push(GameEvent::BoltRemoved { id, position, reason });
    false
}

// Returns false once the bolt is gone.
fn step_bolt(
    projectile: &mut Projectile,
    dt: f32,
    world: &World,
    characters: &BTreeMap<CharacterId, Character>,
    hits: &mut Vec<Hit>,
    events: &mut Vec<GameEvent>,
) -> bool {
    let ProjectileKind::Bolt(bolt) = &mut projectile.kind else {
        return true;
    };

    // A bolt that connected last tick is removed now; it never deals damage twice.
    if bolt.has_hit {
        return remove_bolt(projectile.id, projectile.position, RemovalReason::Hit, events);
    }

    projectile.lifetime += dt;
    if projectile.lifetime >= bolt.max_lifetime {
        return remove_bolt(projectile.id, projectile.position, RemovalReason::Expired, events);
    }

    let here = xz(projectile.position);
    if let Some(target) = bolt.target {
        bolt.direction = steer_toward(bolt.direction, here, target, bolt.follow_strength, dt);
    }
    let progress = if bolt.max_lifetime > 0.0 { projectile.lifetime / bolt.max_lifetime } else { 1.0 };
    bolt.current_speed = bolt_speed_at(bolt.start_speed, bolt.end_speed, progress);
    bolt.velocity = bolt.direction * bolt.current_speed;

    // Height tracks the shooter while they are around; otherwise keep the last height.
    let y = characters
        .get(&projectile.shooter)
        .map_or(projectile.position.y, |shooter| shooter.position.y);
    let next_xz = here + bolt.velocity * dt;
    let next = Vec3::new(next_xz.x, y, next_xz.y);

    if dt > 0.0 {
        let blocked = !world.is_inside_arena(next.x, next.z)
            || world.will_collide(&Aabb::cube(next, projectile.size))
            || world.sweep_collides(projectile.position, next, projectile.size);
        if blocked {
            return remove_bolt(projectile.id, projectile.position, RemovalReason::Collided, events);
        }
    }
    projectile.position = next;

    let struck = characters.values().find(|c| {
        c.id != projectile.shooter
            && c.is_alive()
            && overlap_bolt_vs_character(projectile.position, projectile.size, c.position, c.size, c.height)
    });
    if let Some(target) = struck {
        bolt.has_hit = true;
        trace!("{:?} hit {:?}", projectile.id, target.id);
        if projectile.authoritative {
            hits.push(Hit {
                target: target.id,
                attacker: projectile.shooter,
                amount: bolt.damage,
                source: DamageSource::Bolt,
            });
        }
    }
    true
}

// Returns false once the mortar has exploded.
fn step_mortar(
    projectile: &mut Projectile,
    dt: f32,
    world: &World,
    characters: &BTreeMap<CharacterId, Character>,
    splashes: &mut SplashAreaPool,
    hits: &mut Vec<Hit>,
    events: &mut Vec<GameEvent>,
) -> bool {
    let ProjectileKind::Mortar(mortar) = &mut projectile.kind else {
        return true;
    };

    if dt > 0.0 {
        step_ballistic(&mut projectile.position, &mut mortar.velocity, mortar.gravity, dt);
        projectile.lifetime += dt;
    }

    let position = projectile.position;
    let ground = world.ground_height(position.x, position.z, projectile.size);
    let direct = characters.values().find(|c| {
        c.id != projectile.shooter
            && c.is_alive()
            && overlap_mortar_vs_character(position, MORTAR_DIRECT_HIT_RADIUS, c.position, c.size, c.height)
    });
    let near_target = xz(position).distance(mortar.target) <= MORTAR_NEAR_TARGET_DISTANCE
        && position.y - ground <= MORTAR_CLOSE_TO_GROUND_DISTANCE;

    let explode = projectile.lifetime >= MORTAR_MAX_LIFETIME || position.y <= ground || near_target || direct.is_some();
    if !explode {
        return true;
    }

    if let Some(target) = direct
        && projectile.authoritative
    {
        hits.push(Hit {
            target: target.id,
            attacker: projectile.shooter,
            amount: mortar.stats.damage,
            source: DamageSource::MortarDirect,
        });
    }

    debug!("{:?} from {:?} exploded at {:?}", projectile.id, projectile.shooter, position);
    events.push(GameEvent::MortarExploded {
        id: projectile.id,
        shooter: projectile.shooter,
        class: projectile.class,
        position,
    });

    // Off the arena there is no ground to burn.
    if ground.is_finite() {
        let floor = Vec3::new(position.x, ground, position.z);
        splashes.spawn(
            projectile.shooter,
            projectile.class,
            floor,
            &mortar.stats,
            projectile.authoritative,
            events,
        );
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{constants::GRAVITY, protocol::CharacterKind, stats::StatsRegistry, world::Obstacle};

    fn bolt_stats() -> BoltStats {
        let mut stats = StatsRegistry::builtin().bolt(CharacterClass::A).clone();
        stats.cooldown = 0.1;
        stats.max_bullets = 2.0;
        stats.recharge_cooldown = 1.0;
        stats.cursor_follow_strength = 0.0;
        stats
    }

    fn shot(origin: Vec3) -> Shot {
        Shot {
            shooter: CharacterId(1),
            class: CharacterClass::A,
            origin,
            authoritative: true,
        }
    }

    fn dummy(id: u32, feet: Vec3) -> (CharacterId, Character) {
        let stats = StatsRegistry::builtin();
        let c = Character::new(
            CharacterId(id),
            CharacterKind::Bot,
            CharacterClass::A,
            stats.character(CharacterClass::A),
            feet,
        );
        (c.id, c)
    }

    #[test]
    fn ammo_refills_fully_after_recharge() {
        let mut pool = ProjectilePool::new();
        let mut events = Vec::new();
        let stats = bolt_stats();
        let world = World::new(20.0, Vec::new());
        let mut splashes = SplashAreaPool::new();
        let empty = BTreeMap::new();

        assert!(pool.fire_bolt(shot(Vec3::ZERO), &stats, Vec2::X, None, &mut events).is_some());
        assert!(!pool.can_fire(CharacterId(1), Ability::Bolt));
        pool.step(0.15, &world, &empty, &mut splashes, &mut events);
        assert!(pool.fire_bolt(shot(Vec3::ZERO), &stats, Vec2::X, None, &mut events).is_some());
        assert_eq!(pool.magazine(CharacterId(1)).map(|m| m.ammo), Some(0));

        pool.step(0.5, &world, &empty, &mut splashes, &mut events);
        assert!(!pool.can_fire(CharacterId(1), Ability::Bolt));
        pool.step(0.6, &world, &empty, &mut splashes, &mut events);
        assert!(pool.can_fire(CharacterId(1), Ability::Bolt));
        assert_eq!(pool.magazine(CharacterId(1)).map(|m| m.ammo), Some(2));
    }

    #[test]
    fn zero_direction_spawns_nothing() {
        let mut pool = ProjectilePool::new();
        let mut events = Vec::new();
        assert!(pool.fire_bolt(shot(Vec3::ZERO), &bolt_stats(), Vec2::ZERO, None, &mut events).is_none());
        assert!(pool.is_empty());
        assert!(events.is_empty());
    }

    #[test]
    fn bolt_without_follow_strength_flies_straight() {
        let mut pool = ProjectilePool::new();
        let mut events = Vec::new();
        let world = World::new(40.0, Vec::new());
        let mut splashes = SplashAreaPool::new();
        let dir = Vec2::new(3.0, 4.0).normalize();
        pool.fire_bolt(shot(Vec3::new(0.0, 0.6, 0.0)), &bolt_stats(), dir, Some(Vec2::new(-5.0, 0.0)), &mut events);
        for _ in 0..30 {
            pool.step(1.0 / 60.0, &world, &BTreeMap::new(), &mut splashes, &mut events);
        }
        let p = pool.projectiles()[0].position;
        assert!((p.x * dir.y - p.z * dir.x).abs() < 1e-4);
    }

    #[test]
    fn bolt_hits_once_then_disappears() {
        let mut pool = ProjectilePool::new();
        let mut events = Vec::new();
        let world = World::new(20.0, Vec::new());
        let mut splashes = SplashAreaPool::new();
        let characters: BTreeMap<_, _> = [dummy(2, Vec3::new(1.0, 0.0, 0.0))].into_iter().collect();

        pool.fire_bolt(shot(Vec3::new(0.0, 0.6, 0.0)), &bolt_stats(), Vec2::X, None, &mut events);
        let mut hits = Vec::new();
        for _ in 0..60 {
            hits.extend(pool.step(1.0 / 60.0, &world, &characters, &mut splashes, &mut events));
        }
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].target, CharacterId(2));
        assert!(pool.is_empty());
        assert!(events.iter().any(|e| matches!(
            e,
            GameEvent::BoltRemoved {
                reason: RemovalReason::Hit,
                ..
            }
        )));
    }

    #[test]
    fn bolt_stops_at_walls() {
        let mut pool = ProjectilePool::new();
        let mut events = Vec::new();
        let world = World::new(
            20.0,
            vec![Obstacle::wall(Vec3::new(1.0, 0.0, -1.0), Vec3::new(1.2, 1.5, 1.0))],
        );
        let mut splashes = SplashAreaPool::new();
        pool.fire_bolt(shot(Vec3::new(0.0, 0.6, 0.0)), &bolt_stats(), Vec2::X, None, &mut events);
        for _ in 0..60 {
            pool.step(1.0 / 60.0, &world, &BTreeMap::new(), &mut splashes, &mut events);
        }
        assert!(pool.is_empty());
        assert!(events.iter().any(|e| matches!(
            e,
            GameEvent::BoltRemoved {
                reason: RemovalReason::Collided,
                ..
            }
        )));
    }

    #[test]
    fn remote_bolts_never_damage() {
        let mut pool = ProjectilePool::new();
        let mut events = Vec::new();
        let world = World::new(20.0, Vec::new());
        let mut splashes = SplashAreaPool::new();
        let characters: BTreeMap<_, _> = [dummy(2, Vec3::new(1.0, 0.0, 0.0))].into_iter().collect();
        let mut remote = shot(Vec3::new(0.0, 0.6, 0.0));
        remote.authoritative = false;
        pool.fire_bolt(remote, &bolt_stats(), Vec2::X, None, &mut events);
        let mut hits = Vec::new();
        for _ in 0..60 {
            hits.extend(pool.step(1.0 / 60.0, &world, &characters, &mut splashes, &mut events));
        }
        assert!(hits.is_empty());
        assert!(pool.magazine(CharacterId(1)).is_none());
    }

    #[test]
    fn mortar_explodes_into_a_splash_area() {
        let mut pool = ProjectilePool::new();
        let mut events = Vec::new();
        let world = World::new(20.0, Vec::new());
        let mut splashes = SplashAreaPool::new();
        let stats = StatsRegistry::builtin().mortar(CharacterClass::A).clone();

        let id = pool.fire_mortar(shot(Vec3::new(0.0, 0.6, 0.0)), &stats, Vec2::new(3.0, 0.0), GRAVITY, &mut events);
        assert!(id.is_some());
        assert!(!pool.can_fire(CharacterId(1), Ability::Mortar));
        for _ in 0..120 {
            pool.step(1.0 / 60.0, &world, &BTreeMap::new(), &mut splashes, &mut events);
            if pool.is_empty() {
                break;
            }
        }
        assert!(pool.is_empty());
        assert_eq!(splashes.len(), 1);
        let area = &splashes.areas()[0];
        assert!((area.position.x - 3.0).abs() < 0.5);
        assert_eq!(area.position.y, 0.0);
    }

    #[test]
    fn mortar_target_is_clamped_to_range() {
        let mut pool = ProjectilePool::new();
        let mut events = Vec::new();
        let stats = StatsRegistry::builtin().mortar(CharacterClass::A).clone();
        pool.fire_mortar(shot(Vec3::new(0.0, 0.6, 0.0)), &stats, Vec2::new(50.0, 0.0), GRAVITY, &mut events);
        let ProjectileKind::Mortar(mortar) = &pool.projectiles()[0].kind else {
            panic!("expected a mortar");
        };
        assert!((mortar.target.x - stats.max_range).abs() < 1e-4);
    }

    #[test]
    fn mortar_at_own_feet_spawns_nothing() {
        let mut pool = ProjectilePool::new();
        let mut events = Vec::new();
        let stats = StatsRegistry::builtin().mortar(CharacterClass::A).clone();
        let fired = pool.fire_mortar(shot(Vec3::new(1.0, 0.6, 1.0)), &stats, Vec2::new(1.0, 1.0), GRAVITY, &mut events);
        assert!(fired.is_none());
        assert!(pool.can_fire(CharacterId(1), Ability::Mortar));
    }
}
