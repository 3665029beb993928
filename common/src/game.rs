use std::collections::{BTreeMap, HashSet, VecDeque};

use bevy_ecs::prelude::*;
use bevy_math::{Vec2, Vec3};
use rand::{SeedableRng, rngs::StdRng};
use tracing::{debug, info, trace};

use crate::{
    bots::{BotController, BotTuning, Difficulty},
    character::Character,
    collision::{Aabb, xz},
    combat::{CombatResolver, DamageOutcome, GameMode, Hit, respawn_point, separate_from_others},
    constants::{ARENA_SIZE, CHARACTER_SIZE, MAX_FRAME_DELTA, RESPAWN_AREA_RATIO, SPAWN_CLEARANCE, UPDATE_BROADCAST_INTERVAL},
    error::{ArenaError, ErrorLog},
    events::{DamageSource, GameEvent},
    input::Input,
    map::ArenaLayout,
    melee::MeleeResolver,
    persistence::BotLearning,
    physics::{PhysicsTuning, step_character, try_jump},
    projectiles::{ProjectileKind, ProjectilePool, Shot},
    protocol::{
        Ability, Aim, AnimKey, CharacterChange, CharacterClass, CharacterId, CharacterKind, NetMessage, PlayerDamage,
        PlayerState, ProjectileCreate, ProjectileId,
    },
    scene::{CharacterView, ProjectileView, Scene, SplashView},
    splash::SplashAreaPool,
    stats::StatsRegistry,
    world::World,
};

// ============================================================================
// Collaborators
// ============================================================================

/// Receives the results of a frame. Every method defaults to doing nothing.
pub trait FrameSink {
    fn on_event(&mut self, _event: &GameEvent) {}

    fn is_net_connected(&self) -> bool {
        false
    }

    fn send_net(&mut self, _message: NetMessage) {}

    fn present(&mut self, _scene: &Scene) {}
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl FrameSink for NullSink {}

// ============================================================================
// Arena Configuration
// ============================================================================

#[derive(Debug, Clone)]
pub struct ArenaConfig {
    pub mode: GameMode,
    pub difficulty: Difficulty,
    pub arena_size: f32,
    pub seed: u64,
    pub learning: BotLearning,
}

impl Default for ArenaConfig {
    fn default() -> Self {
        Self {
            mode: GameMode::Practice,
            difficulty: Difficulty::Medium,
            arena_size: ARENA_SIZE,
            seed: 0,
            learning: BotLearning::default(),
        }
    }
}

// What the local player asked for this tick.
#[derive(Debug, Clone, Copy, Default)]
struct PlayerIntent {
    movement: Vec2,
    aim: Option<Vec2>,
    jump: bool,
    levitate: bool,
    fire_bolt: bool,
    fire_mortar: bool,
    melee: bool,
    switch_to: Option<CharacterClass>,
}

impl PlayerIntent {
    fn read(input: &dyn Input) -> Self {
        Self {
            movement: input.move_vector().clamp_length_max(1.0),
            aim: input.aim_target(),
            jump: input.jump_pressed(),
            levitate: input.levitate_held(),
            fire_bolt: input.fire_bolt_pressed(),
            fire_mortar: input.fire_mortar_pressed(),
            melee: input.melee_pressed(),
            switch_to: input.switch_class(),
        }
    }
}

// ============================================================================
// Arena
// ============================================================================

/// The simulation core: one arena with its characters, pools and resolvers, advanced one tick at a time.
#[derive(Resource)]
pub struct Arena {
    world: World,
    stats: StatsRegistry,
    physics: PhysicsTuning,
    mode: GameMode,
    difficulty: Difficulty,
    characters: BTreeMap<CharacterId, Character>,
    bots: BotController,
    projectiles: ProjectilePool,
    splashes: SplashAreaPool,
    combat: CombatResolver,
    melee: MeleeResolver,
    learning: BotLearning,
    local_player: Option<CharacterId>,
    paused: bool,
    last_time: Option<f32>,
    rng: StdRng,
    next_id: u32,
    pending_remote: VecDeque<NetMessage>,
    events: Vec<GameEvent>,
    outbox: Vec<NetMessage>,
    broadcast_timer: f32,
    errors: ErrorLog,
}

impl Arena {
    #[must_use]
    pub fn new(config: ArenaConfig, stats: StatsRegistry, layout: ArenaLayout) -> Self {
        let world = layout.into_world(config.mode.blocks_jump_over());
        let tuning = BotTuning::for_difficulty(config.difficulty).with_learning(&config.learning);
        info!(
            "arena ready: {:?} mode, {:?} bots, {} obstacles",
            config.mode,
            config.difficulty,
            world.obstacles().len()
        );

        Self {
            world,
            stats,
            physics: PhysicsTuning::default(),
            mode: config.mode,
            difficulty: config.difficulty,
            characters: BTreeMap::new(),
            bots: BotController::new(tuning),
            projectiles: ProjectilePool::new(),
            splashes: SplashAreaPool::new(),
            combat: CombatResolver::new(),
            melee: MeleeResolver::new(),
            learning: config.learning,
            local_player: None,
            paused: false,
            last_time: None,
            rng: StdRng::seed_from_u64(config.seed),
            next_id: 1,
            pending_remote: VecDeque::new(),
            events: Vec::new(),
            outbox: Vec::new(),
            broadcast_timer: 0.0,
            errors: ErrorLog::default(),
        }
    }

    // Standard layout sized from the config.
    #[must_use]
    pub fn standard(config: ArenaConfig, stats: StatsRegistry) -> Self {
        let layout = ArenaLayout::standard(config.arena_size);
        Self::new(config, stats, layout)
    }

    // ============================================================================
    // Accessors
    // ============================================================================

    #[must_use]
    pub const fn world(&self) -> &World {
        &self.world
    }

    #[must_use]
    pub const fn stats(&self) -> &StatsRegistry {
        &self.stats
    }

    #[must_use]
    pub const fn mode(&self) -> GameMode {
        self.mode
    }

    #[must_use]
    pub const fn difficulty(&self) -> Difficulty {
        self.difficulty
    }

    #[must_use]
    pub const fn physics(&self) -> &PhysicsTuning {
        &self.physics
    }

    #[must_use]
    pub const fn characters(&self) -> &BTreeMap<CharacterId, Character> {
        &self.characters
    }

    #[must_use]
    pub fn character(&self, id: CharacterId) -> Option<&Character> {
        self.characters.get(&id)
    }

    pub fn character_mut(&mut self, id: CharacterId) -> Option<&mut Character> {
        self.characters.get_mut(&id)
    }

    #[must_use]
    pub const fn bots(&self) -> &BotController {
        &self.bots
    }

    pub const fn bots_mut(&mut self) -> &mut BotController {
        &mut self.bots
    }

    #[must_use]
    pub const fn projectiles(&self) -> &ProjectilePool {
        &self.projectiles
    }

    #[must_use]
    pub const fn splashes(&self) -> &SplashAreaPool {
        &self.splashes
    }

    #[must_use]
    pub const fn combat(&self) -> &CombatResolver {
        &self.combat
    }

    #[must_use]
    pub const fn melee(&self) -> &MeleeResolver {
        &self.melee
    }

    #[must_use]
    pub const fn learning(&self) -> &BotLearning {
        &self.learning
    }

    pub const fn learning_mut(&mut self) -> &mut BotLearning {
        &mut self.learning
    }

    #[must_use]
    pub const fn local_player(&self) -> Option<CharacterId> {
        self.local_player
    }

    #[must_use]
    pub const fn is_paused(&self) -> bool {
        self.paused
    }

    pub const fn set_paused(&mut self, paused: bool) {
        self.paused = paused;
    }

    // Events raised since the last drain, in the order they happened.
    pub fn drain_events(&mut self) -> Vec<GameEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn drain_outbox(&mut self) -> Vec<NetMessage> {
        std::mem::take(&mut self.outbox)
    }

    // ============================================================================
    // Roster
    // ============================================================================

    fn allocate_id(&mut self) -> CharacterId {
        let id = CharacterId(self.next_id);
        self.next_id = self.next_id.wrapping_add(1);
        id
    }

    // Add a character with no controller attached. `feet` of None picks a respawn point.
    pub fn spawn_character(&mut self, kind: CharacterKind, class: CharacterClass, feet: Option<Vec3>) -> CharacterId {
        let id = self.allocate_id();
        let size = CHARACTER_SIZE;
        let feet = feet.unwrap_or_else(|| respawn_point(&self.world, self.mode, size, &mut self.rng));
        let character = Character::new(id, kind, class, self.stats.character(class), feet);
        debug!("spawned {:?} {:?} ({:?}) at {:?}", kind, id, class, feet);
        self.characters.insert(id, character);
        id
    }

    pub fn spawn_player(&mut self, class: CharacterClass, feet: Option<Vec3>) -> CharacterId {
        let id = self.spawn_character(CharacterKind::Player, class, feet);
        self.local_player = Some(id);
        id
    }

    // Bots start anywhere open, regardless of mode.
    pub fn spawn_bot(&mut self, class: CharacterClass) -> CharacterId {
        let size = CHARACTER_SIZE;
        let point = self.world.random_open_point(
            &mut self.rng,
            RESPAWN_AREA_RATIO,
            SPAWN_CLEARANCE,
        );
        let ground = self.world.ground_height(point.x, point.y, size).max(0.0);
        self.spawn_bot_at(class, Vec3::new(point.x, ground, point.y))
    }

    pub fn spawn_bot_at(&mut self, class: CharacterClass, feet: Vec3) -> CharacterId {
        let id = self.spawn_character(CharacterKind::Bot, class, Some(feet));
        self.bots.add(id, &mut self.rng);
        id
    }

    pub fn spawn_remote(&mut self, class: CharacterClass) -> CharacterId {
        self.spawn_character(CharacterKind::Remote, class, None)
    }

    pub fn remove_character(&mut self, id: CharacterId) -> Option<Character> {
        let removed = self.characters.remove(&id)?;
        self.bots.remove(id);
        self.melee.clear(id);
        self.projectiles.reset_shooter(id);
        self.combat.forget(id);
        if self.local_player == Some(id) {
            self.local_player = None;
        }
        debug!("removed {:?}", id);
        Some(removed)
    }

    // Peer messages are applied at the start of the next tick. Ids must already be the sender's.
    pub fn queue_remote(&mut self, message: NetMessage) {
        self.pending_remote.push_back(message);
    }

    // Public entry point for damage from outside the tick, e.g. scripted hazards.
    pub fn apply_damage(
        &mut self,
        target: CharacterId,
        amount: f32,
        attacker: CharacterId,
    ) -> Result<DamageOutcome, ArenaError> {
        let outcome = self.combat.apply_damage(
            &mut self.characters,
            Hit {
                target,
                attacker,
                amount,
                source: DamageSource::Remote,
            },
            &mut self.events,
        )?;
        if outcome == DamageOutcome::Killed {
            self.on_killed(target, attacker);
        }
        Ok(outcome)
    }

    pub fn switch_class(&mut self, id: CharacterId, class: CharacterClass) -> Result<(), ArenaError> {
        let character = self.characters.get_mut(&id).ok_or(ArenaError::EntityNotFound(id))?;
        if character.class == class {
            return Ok(());
        }
        character.switch_class(class, self.stats.character(class));
        self.projectiles.reset_shooter(id);
        self.events.push(GameEvent::ClassChanged { id, class });
        if character.kind != CharacterKind::Remote {
            self.outbox.push(NetMessage::CharacterChange(CharacterChange { player_id: id, class }));
        }
        Ok(())
    }

    // ============================================================================
    // Frame
    // ============================================================================

    /// One host frame. `now` is in seconds; the delta since the previous frame is capped at
    /// [`MAX_FRAME_DELTA`] and the first frame advances nothing. Paused or stopped input skips the
    /// tick, but events, peer messages and the scene still reach `sink`.
    pub fn frame(&mut self, now: f32, input: &dyn Input, sink: &mut impl FrameSink) {
        let dt = self.last_time.map_or(0.0, |last| (now - last).clamp(0.0, MAX_FRAME_DELTA));
        self.last_time = Some(now);

        if !self.paused && input.is_running() {
            self.tick(dt, input);
        }

        for event in self.events.drain(..) {
            sink.on_event(&event);
        }
        let outbox = std::mem::take(&mut self.outbox);
        if sink.is_net_connected() {
            for message in outbox {
                sink.send_net(message);
            }
        }
        sink.present(&self.scene());
    }

    /// Advance the simulation by `dt` seconds in the fixed per-tick order.
    pub fn tick(&mut self, dt: f32, input: &dyn Input) {
        let dt = dt.clamp(0.0, MAX_FRAME_DELTA);
        self.combat.advance(dt);

        // Input and peer state
        self.apply_remote_messages();
        let intent = PlayerIntent::read(input);

        // Characters
        let mut moved = HashSet::new();
        self.step_characters(dt, &intent, &mut moved);

        // Bots
        self.step_bots(dt, &mut moved);

        // Projectiles
        if let Some(id) = self.local_player {
            self.projectiles.retarget(id, intent.aim);
        }
        let hits = self
            .projectiles
            .step(dt, &self.world, &self.characters, &mut self.splashes, &mut self.events);
        self.resolve_hits(hits, true);

        // Splash areas and melee over time
        let mut hits = self.splashes.step(dt, &self.characters, &mut self.events);
        hits.extend(self.melee.step(dt, &self.characters));
        self.resolve_hits(hits, true);

        // Death and respawn
        let respawned =
            self.combat
                .update_respawns(&mut self.characters, &self.world, self.mode, &mut self.rng, dt, &mut self.events);
        for id in respawned {
            self.bots.on_respawn(id);
            self.melee.clear(id);
            self.projectiles.reset_shooter(id);
        }

        self.refresh_animations(&moved);
        self.emit_states(dt);
    }

    // ============================================================================
    // Tick Steps
    // ============================================================================

    fn apply_remote_messages(&mut self) {
        while let Some(message) = self.pending_remote.pop_front() {
            if let Err(e) = self.apply_remote(message) {
                self.errors.report("remote message", &e);
            }
        }
    }

    fn apply_remote(&mut self, message: NetMessage) -> Result<(), ArenaError> {
        match message {
            NetMessage::PlayerState(state) => {
                let character = self
                    .characters
                    .get_mut(&state.player_id)
                    .filter(|c| c.kind == CharacterKind::Remote)
                    .ok_or(ArenaError::EntityNotFound(state.player_id))?;
                character.position = state.position.into();
                character.facing = state.facing;
                character.anim = state.anim;
                if character.is_dying && state.health > 0.0 {
                    character.is_dying = false;
                    character.killer_id = None;
                    character.death_fade.reset();
                }
                character.health = state.health.clamp(0.0, character.max_health);
            }
            NetMessage::ProjectileCreate(create) => {
                let shot = Shot {
                    shooter: create.player_id,
                    class: create.class,
                    origin: create.origin.into(),
                    authoritative: false,
                };
                match (create.ability, create.aim) {
                    (Ability::Bolt, Aim::Direction { x, z }) => {
                        self.projectiles.fire_bolt(
                            shot,
                            self.stats.bolt(create.class),
                            Vec2::new(x, z),
                            None,
                            &mut self.events,
                        );
                    }
                    (Ability::Mortar, Aim::Target { x, z }) => {
                        self.projectiles.fire_mortar(
                            shot,
                            self.stats.mortar(create.class),
                            Vec2::new(x, z),
                            self.physics.gravity,
                            &mut self.events,
                        );
                    }
                    (ability, aim) => trace!("ignoring {:?} shot aimed with {:?}", ability, aim),
                }
            }
            NetMessage::ProjectileUpdate(update) => {
                // Peers re-simulate their own copies.
                trace!("ignoring projectile update for {:?}", update.projectile_id);
            }
            NetMessage::PlayerDamage(damage) => {
                self.resolve_hits(
                    vec![Hit {
                        target: damage.target_id,
                        attacker: damage.attacker_id,
                        amount: damage.amount,
                        source: DamageSource::Remote,
                    }],
                    false,
                );
            }
            NetMessage::CharacterChange(change) => {
                self.switch_class(change.player_id, change.class)?;
            }
        }
        Ok(())
    }

    fn step_characters(&mut self, dt: f32, intent: &PlayerIntent, moved: &mut HashSet<CharacterId>) {
        let local = self.local_player;

        if let (Some(id), Some(class)) = (local, intent.switch_to)
            && let Err(e) = self.switch_class(id, class)
        {
            self.errors.report("class switch", &e);
        }

        for character in self.characters.values_mut() {
            if character.kind == CharacterKind::Remote || !character.is_alive() {
                continue;
            }
            if Some(character.id) == local {
                character.levitating = intent.levitate;
                if intent.jump
                    && let Some(kind) = try_jump(character, &self.physics)
                {
                    self.events.push(GameEvent::Jumped { id: character.id, kind });
                }
            }
            if step_character(character, &self.world, &self.physics, dt) {
                self.events.push(GameEvent::Landed { id: character.id });
            }
        }

        let Some(id) = local else {
            return;
        };
        let Some(player) = self.characters.get(&id).filter(|c| c.is_alive()) else {
            return;
        };
        let here = xz(player.position);
        let speed = player.move_speed * self.melee.speed_multiplier(id);
        if self.move_character(id, intent.movement * speed * dt) {
            moved.insert(id);
        }

        let facing = intent
            .aim
            .map(|aim| aim - here)
            .filter(|v| v.length_squared() > 0.0)
            .or_else(|| Some(intent.movement).filter(|v| v.length_squared() > 0.0))
            .map(|v| v.y.atan2(v.x));
        if let (Some(facing), Some(player)) = (facing, self.characters.get_mut(&id)) {
            player.facing = facing;
        }

        self.player_actions(id, intent);
    }

    fn player_actions(&mut self, id: CharacterId, intent: &PlayerIntent) {
        let Some(player) = self.characters.get(&id) else {
            return;
        };
        let here = xz(player.position);
        let forward = Vec2::from_angle(player.facing);
        let reach = self.stats.mortar(player.class).max_range;

        if intent.fire_bolt {
            let direction = intent.aim.map_or(forward, |aim| aim - here);
            self.fire_bolt_from(id, direction, intent.aim);
        }

        if intent.fire_mortar {
            let target = intent.aim.unwrap_or(here + forward * reach * 0.5);
            self.fire_mortar_from(id, target);
        }

        if intent.melee {
            self.swing_from(id);
        }
    }

    fn step_bots(&mut self, dt: f32, moved: &mut HashSet<CharacterId>) {
        let ids: Vec<CharacterId> = self.bots.ids().collect();
        for id in ids {
            let Some(me) = self.characters.get(&id) else {
                self.errors.report("bot update", &ArenaError::EntityNotFound(id));
                self.bots.remove(id);
                continue;
            };
            if !me.is_alive() {
                continue;
            }

            let target = nearest_opponent(&self.characters, me);
            let can_fire = self.projectiles.can_fire(id, Ability::Bolt);
            let slow = self.melee.speed_multiplier(id);
            let bolt = self.stats.bolt(me.class);
            let Some(decision) = self
                .bots
                .decide(me, target, &self.world, bolt, can_fire, slow, dt, &mut self.rng)
            else {
                continue;
            };

            if self.move_character(id, decision.displacement) {
                moved.insert(id);
            }
            if let Some(bot) = self.characters.get_mut(&id) {
                bot.facing = decision.facing;
            }
            if let Some(direction) = decision.fire_at
                && self.fire_bolt_from(id, direction, None).is_some()
            {
                self.learning.shots_fired += 1;
            }
        }
    }

    // Commit a horizontal move: clamp to the arena, slide along obstacles, then separate from others.
    fn move_character(&mut self, id: CharacterId, displacement: Vec2) -> bool {
        if displacement.length_squared() <= 0.0 {
            return false;
        }
        let Some(character) = self.characters.get(&id).filter(|c| c.is_alive()) else {
            return false;
        };
        let (start, size, height) = (character.position, character.size, character.height);
        let blocked = |p: Vec3| self.world.will_collide(&Aabb::character(p, size, height));
        let candidate = |d: Vec2| self.world.constrain_to_arena(start + Vec3::new(d.x, 0.0, d.y), size);

        let full = candidate(displacement);
        let along_x = candidate(Vec2::new(displacement.x, 0.0));
        let along_z = candidate(Vec2::new(0.0, displacement.y));
        let Some(desired) = [full, along_x, along_z].into_iter().find(|p| !blocked(*p)) else {
            return false;
        };

        let separated = self
            .world
            .constrain_to_arena(separate_from_others(id, desired, size, &self.characters), size);
        let target = if blocked(separated) { desired } else { separated };

        let Some(character) = self.characters.get_mut(&id) else {
            return false;
        };
        let moved = xz(target) != xz(start);
        character.position = target;
        moved
    }

    // ============================================================================
    // Abilities
    // ============================================================================

    pub fn fire_bolt_from(&mut self, id: CharacterId, direction: Vec2, target: Option<Vec2>) -> Option<ProjectileId> {
        let shooter = self.characters.get(&id).filter(|c| c.is_alive())?;
        let shot = Shot::from_character(shooter);
        let kind = shooter.kind;
        let fired = self
            .projectiles
            .fire_bolt(shot, self.stats.bolt(shot.class), direction, target, &mut self.events)?;

        if kind != CharacterKind::Remote {
            let heading = direction.normalize_or_zero();
            self.outbox.push(NetMessage::ProjectileCreate(ProjectileCreate {
                player_id: id,
                ability: Ability::Bolt,
                origin: shot.origin.into(),
                aim: Aim::Direction {
                    x: heading.x,
                    z: heading.y,
                },
                class: shot.class,
            }));
        }
        Some(fired)
    }

    pub fn fire_mortar_from(&mut self, id: CharacterId, target: Vec2) -> Option<ProjectileId> {
        let shooter = self.characters.get(&id).filter(|c| c.is_alive())?;
        let shot = Shot::from_character(shooter);
        let kind = shooter.kind;
        let fired = self.projectiles.fire_mortar(
            shot,
            self.stats.mortar(shot.class),
            target,
            self.physics.gravity,
            &mut self.events,
        )?;

        if kind != CharacterKind::Remote {
            let aimed = self
                .projectiles
                .get(fired)
                .and_then(|p| match &p.kind {
                    ProjectileKind::Mortar(mortar) => Some(mortar.target),
                    ProjectileKind::Bolt(_) => None,
                })
                .unwrap_or(target);
            self.outbox.push(NetMessage::ProjectileCreate(ProjectileCreate {
                player_id: id,
                ability: Ability::Mortar,
                origin: shot.origin.into(),
                aim: Aim::Target {
                    x: aimed.x,
                    z: aimed.y,
                },
                class: shot.class,
            }));
        }
        Some(fired)
    }

    pub fn swing_from(&mut self, id: CharacterId) -> bool {
        let Some(attacker) = self.characters.get(&id) else {
            return false;
        };
        let stats = self.stats.melee(attacker.class);
        let Some(hits) = self.melee.swing(attacker, stats, &self.characters, &mut self.events) else {
            return false;
        };
        self.resolve_hits(hits, true);
        true
    }

    // ============================================================================
    // Damage Resolution
    // ============================================================================

    // Feed hits to the resolver. Local hits are also reported to peers.
    fn resolve_hits(&mut self, hits: Vec<Hit>, report: bool) {
        for hit in hits {
            let outcome = match self.combat.apply_damage(&mut self.characters, hit, &mut self.events) {
                Ok(outcome) => outcome,
                Err(e) => {
                    self.errors.report("damage", &e);
                    continue;
                }
            };
            if outcome == DamageOutcome::Ignored {
                continue;
            }

            let attacker_kind = self.characters.get(&hit.attacker).map(|c| c.kind);
            if hit.source == DamageSource::Bolt && attacker_kind == Some(CharacterKind::Bot) {
                self.learning.shots_hit += 1;
            }
            if report && attacker_kind.is_some_and(|k| k != CharacterKind::Remote) {
                self.outbox.push(NetMessage::PlayerDamage(PlayerDamage {
                    target_id: hit.target,
                    amount: hit.amount,
                    attacker_id: hit.attacker,
                }));
            }
            if outcome == DamageOutcome::Killed {
                self.on_killed(hit.target, hit.attacker);
            }
        }
    }

    fn on_killed(&mut self, target: CharacterId, killer: CharacterId) {
        self.melee.clear(target);
        let kind_of = |id| self.characters.get(&id).map(|c: &Character| c.kind);
        if kind_of(killer) == Some(CharacterKind::Bot) && killer != target {
            self.learning.kills += 1;
        }
        if kind_of(target) == Some(CharacterKind::Bot) {
            self.learning.deaths += 1;
        }
    }

    // ============================================================================
    // Presentation
    // ============================================================================

    fn refresh_animations(&mut self, moved: &HashSet<CharacterId>) {
        for character in self.characters.values_mut() {
            if character.kind == CharacterKind::Remote {
                continue;
            }
            character.anim = if character.is_dying {
                AnimKey::Dying
            } else if self.melee.is_swinging(character.id) {
                AnimKey::Attack
            } else if !character.is_grounded {
                AnimKey::Jump
            } else if moved.contains(&character.id) {
                AnimKey::Run
            } else {
                AnimKey::Idle
            };
        }
    }

    fn emit_states(&mut self, dt: f32) {
        self.broadcast_timer += dt;
        if self.broadcast_timer < UPDATE_BROADCAST_INTERVAL {
            return;
        }
        self.broadcast_timer = 0.0;

        for character in self.characters.values() {
            if character.kind == CharacterKind::Remote {
                continue;
            }
            self.outbox.push(NetMessage::PlayerState(PlayerState {
                player_id: character.id,
                position: character.position.into(),
                facing: character.facing,
                anim: character.anim,
                health: character.health,
            }));
        }
    }

    #[must_use]
    pub fn scene(&self) -> Scene {
        let color = |class: CharacterClass| self.stats.character(class).color.clone();

        let characters = self
            .characters
            .values()
            .map(|c| CharacterView {
                id: c.id,
                kind: c.kind,
                class: c.class,
                position: c.position,
                facing: c.facing,
                anim: c.anim,
                health: c.health,
                max_health: c.max_health,
                opacity: c.opacity(),
                respawn_in: c.respawn_countdown(),
                color: color(c.class),
            })
            .collect();

        let projectiles = self
            .projectiles
            .projectiles()
            .iter()
            .map(|p| ProjectileView {
                id: p.id,
                ability: p.ability(),
                position: p.position,
                color: color(p.class),
                trail_light: matches!(p.kind, ProjectileKind::Bolt(_)),
            })
            .collect();

        let splashes = self
            .splashes
            .areas()
            .iter()
            .map(|a| SplashView {
                id: a.id,
                center: a.position,
                radius: a.current_radius,
                opacity: a.opacity(),
                color: color(a.class),
            })
            .collect();

        Scene {
            characters,
            projectiles,
            splashes,
            scoreboard: self.combat.scoreboard(),
            paused: self.paused,
        }
    }
}

// Bots hunt players and remote peers, never each other.
fn nearest_opponent<'a>(characters: &'a BTreeMap<CharacterId, Character>, me: &Character) -> Option<&'a Character> {
    characters
        .values()
        .filter(|c| c.id != me.id && c.kind != CharacterKind::Bot && c.is_alive())
        .min_by(|a, b| {
            let da = xz(a.position).distance_squared(xz(me.position));
            let db = xz(b.position).distance_squared(xz(me.position));
            da.total_cmp(&db)
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::InputFrame;

    const DT: f32 = 1.0 / 60.0;

    fn arena(mode: GameMode) -> Arena {
        let config = ArenaConfig {
            mode,
            seed: 7,
            ..ArenaConfig::default()
        };
        Arena::new(config, StatsRegistry::builtin(), ArenaLayout::open(20.0))
    }

    #[derive(Default)]
    struct RecordingSink {
        events: Vec<GameEvent>,
        sent: Vec<NetMessage>,
        frames: usize,
        connected: bool,
    }

    impl FrameSink for RecordingSink {
        fn on_event(&mut self, event: &GameEvent) {
            self.events.push(event.clone());
        }

        fn is_net_connected(&self) -> bool {
            self.connected
        }

        fn send_net(&mut self, message: NetMessage) {
            self.sent.push(message);
        }

        fn present(&mut self, _scene: &Scene) {
            self.frames += 1;
        }
    }

    #[test]
    fn frame_caps_large_hitches() {
        let mut arena = arena(GameMode::Practice);
        let player = arena.spawn_player(CharacterClass::A, Some(Vec3::ZERO));
        let mut sink = RecordingSink::default();
        let input = InputFrame {
            move_vector: Vec2::X,
            ..InputFrame::running()
        };
        arena.frame(0.0, &input, &mut sink);
        arena.frame(5.0, &input, &mut sink);
        let x = arena.character(player).expect("spawned").position.x;
        let speed = arena.character(player).expect("spawned").move_speed;
        assert!((x - speed * MAX_FRAME_DELTA).abs() < 1e-4);
        assert_eq!(sink.frames, 2);
    }

    #[test]
    fn paused_frames_only_present() {
        let mut arena = arena(GameMode::Practice);
        let player = arena.spawn_player(CharacterClass::A, Some(Vec3::ZERO));
        arena.set_paused(true);
        let mut sink = RecordingSink::default();
        let input = InputFrame {
            move_vector: Vec2::X,
            ..InputFrame::running()
        };
        arena.frame(0.0, &input, &mut sink);
        arena.frame(0.02, &input, &mut sink);
        assert_eq!(arena.character(player).expect("spawned").position.x, 0.0);
        assert_eq!(sink.frames, 2);
    }

    #[test]
    fn zero_dt_tick_moves_nothing() {
        let mut arena = arena(GameMode::Practice);
        let player = arena.spawn_player(CharacterClass::A, Some(Vec3::ZERO));
        arena.spawn_bot_at(CharacterClass::B, Vec3::new(4.0, 0.0, 0.0));
        arena.tick(DT, &InputFrame {
            fire_bolt: true,
            aim_target: Some(Vec2::new(4.0, 0.0)),
            ..InputFrame::running()
        });
        let before = arena.scene();
        arena.tick(0.0, &InputFrame {
            move_vector: Vec2::X,
            ..InputFrame::running()
        });
        let after = arena.scene();
        for (a, b) in before.characters.iter().zip(&after.characters) {
            assert_eq!(a.position, b.position);
        }
        for (a, b) in before.projectiles.iter().zip(&after.projectiles) {
            assert_eq!(a.position, b.position);
        }
        assert!(arena.character(player).is_some());
    }

    #[test]
    fn walls_block_player_movement() {
        let layout = ArenaLayout {
            arena_size: 20.0,
            obstacles: vec![crate::world::Obstacle::wall(
                Vec3::new(1.0, 0.0, -2.0),
                Vec3::new(2.0, 1.5, 2.0),
            )],
        };
        let mut arena = Arena::new(ArenaConfig::default(), StatsRegistry::builtin(), layout);
        let player = arena.spawn_player(CharacterClass::A, Some(Vec3::ZERO));
        for _ in 0..120 {
            arena.tick(DT, &InputFrame {
                move_vector: Vec2::X,
                ..InputFrame::running()
            });
        }
        let x = arena.character(player).expect("spawned").position.x;
        assert!(x + 0.25 <= 1.0 + 1e-4);
    }

    #[test]
    fn local_actions_are_reported_to_peers() {
        let mut arena = arena(GameMode::Practice);
        arena.spawn_player(CharacterClass::A, Some(Vec3::ZERO));
        let mut sink = RecordingSink {
            connected: true,
            ..RecordingSink::default()
        };
        arena.frame(0.0, &InputFrame::running(), &mut sink);
        arena.frame(0.1, &InputFrame {
            fire_bolt: true,
            aim_target: Some(Vec2::new(3.0, 0.0)),
            switch_to: Some(CharacterClass::B),
            ..InputFrame::running()
        }, &mut sink);
        arena.frame(0.2, &InputFrame::running(), &mut sink);
        assert!(sink.sent.iter().any(|m| matches!(m, NetMessage::ProjectileCreate(_))));
        assert!(sink.sent.iter().any(|m| matches!(m, NetMessage::CharacterChange(c) if c.class == CharacterClass::B)));
        assert!(sink.sent.iter().any(|m| matches!(m, NetMessage::PlayerState(_))));
    }

    #[test]
    fn remote_state_and_damage_are_applied_between_ticks() {
        let mut arena = arena(GameMode::Practice);
        let player = arena.spawn_player(CharacterClass::A, Some(Vec3::ZERO));
        let remote = arena.spawn_remote(CharacterClass::B);
        arena.queue_remote(NetMessage::PlayerState(PlayerState {
            player_id: remote,
            position: Vec3::new(3.0, 0.6, 1.0).into(),
            facing: 1.0,
            anim: AnimKey::Run,
            health: 50.0,
        }));
        arena.queue_remote(NetMessage::PlayerDamage(PlayerDamage {
            target_id: player,
            amount: 30.0,
            attacker_id: remote,
        }));
        arena.tick(DT, &InputFrame::running());

        let r = arena.character(remote).expect("joined");
        assert_eq!(r.position, Vec3::new(3.0, 0.6, 1.0));
        assert_eq!(r.health, 50.0);
        let p = arena.character(player).expect("spawned");
        assert!((p.health - (p.max_health - 30.0)).abs() < 1e-5);
        // Damage that came from a peer is not echoed back.
        assert!(!arena.drain_outbox().iter().any(|m| matches!(m, NetMessage::PlayerDamage(_))));
    }

    #[test]
    fn unknown_remote_ids_are_skipped() {
        let mut arena = arena(GameMode::Practice);
        arena.queue_remote(NetMessage::PlayerState(PlayerState {
            player_id: CharacterId(99),
            position: Vec3::ZERO.into(),
            facing: 0.0,
            anim: AnimKey::Idle,
            health: 10.0,
        }));
        arena.frame(0.0, &InputFrame::running(), &mut NullSink);
        assert!(arena.characters().is_empty());
        assert!(arena.drain_events().is_empty());
    }

    #[test]
    fn bots_hunt_and_shoot_the_player() {
        let mut arena = arena(GameMode::Practice);
        arena.spawn_player(CharacterClass::A, Some(Vec3::ZERO));
        arena.spawn_bot_at(CharacterClass::A, Vec3::new(5.0, 0.0, 0.0));
        let mut created = 0;
        for _ in 0..120 {
            arena.tick(DT, &InputFrame::running());
            created += arena
                .drain_events()
                .iter()
                .filter(|e| matches!(e, GameEvent::BoltCreated { .. }))
                .count();
        }
        assert!(created > 0);
        assert!(arena.learning().shots_fired > 0);
    }

    #[test]
    fn melee_swing_damages_adjacent_characters() {
        let mut arena = arena(GameMode::Practice);
        arena.spawn_player(CharacterClass::A, Some(Vec3::ZERO));
        let dummy = arena.spawn_character(CharacterKind::Bot, CharacterClass::A, Some(Vec3::new(1.0, 0.0, 0.0)));
        arena.tick(DT, &InputFrame {
            melee: true,
            ..InputFrame::running()
        });
        let d = arena.character(dummy).expect("spawned");
        assert!(d.health < d.max_health);
        assert!(arena.melee().is_poisoned(dummy));
    }
}
