use bevy_math::{Vec2, Vec3};

use crate::{
    character::Character,
    constants::{
        BOLT_B_ACCEL_MULTIPLIER, BOLT_FOLLOW_SPEED_MULTIPLIER, GRAVITY, JUMP_COOLDOWN, JUMP_FORCE, LEVITATION_FORCE,
        MORTAR_MIN_DISTANCE, PHYSICS_EPSILON,
    },
    error::ArenaError,
    protocol::CharacterClass,
    stats::BoltStats,
    world::World,
};

// ============================================================================
// Tuning
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhysicsTuning {
    pub gravity: f32,
    pub jump_force: f32,
    pub jump_cooldown: f32,
    pub levitation_force: f32,
}

impl Default for PhysicsTuning {
    fn default() -> Self {
        Self {
            gravity: GRAVITY,
            jump_force: JUMP_FORCE,
            jump_cooldown: JUMP_COOLDOWN,
            levitation_force: LEVITATION_FORCE,
        }
    }
}

// ============================================================================
// Character Physics
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JumpKind {
    Ground,
    Double,
}

// Integrate one tick of vertical motion and resolve the ground. Returns true on landing.
pub fn step_character(character: &mut Character, world: &World, tuning: &PhysicsTuning, dt: f32) -> bool {
    character.jump_cooldown_remaining = (character.jump_cooldown_remaining - dt).max(0.0);

    character.velocity_y += tuning.gravity * dt;
    if character.levitating && character.velocity_y < 0.0 {
        character.velocity_y += tuning.levitation_force * dt;
    }
    character.position.y += character.velocity_y * dt;

    let ground = world.ground_height(character.position.x, character.position.z, character.size);
    let half_height = character.height / 2.0;
    if character.position.y - half_height <= ground {
        let was_airborne = !character.is_grounded;
        character.position.y = ground + half_height;
        character.velocity_y = 0.0;
        character.is_grounded = true;
        character.has_double_jumped = false;
        was_airborne
    } else {
        character.is_grounded = false;
        false
    }
}

// Ground jump when standing and rested, otherwise one mid-air jump per airtime.
pub fn try_jump(character: &mut Character, tuning: &PhysicsTuning) -> Option<JumpKind> {
    if !character.is_alive() {
        return None;
    }

    if character.is_grounded {
        if character.jump_cooldown_remaining > 0.0 {
            return None;
        }
        character.velocity_y = tuning.jump_force;
        character.is_grounded = false;
        character.jump_cooldown_remaining = tuning.jump_cooldown;
        return Some(JumpKind::Ground);
    }

    if character.has_double_jumped {
        return None;
    }
    character.velocity_y = tuning.jump_force;
    character.has_double_jumped = true;
    Some(JumpKind::Double)
}

// ============================================================================
// Bolt Kinematics
// ============================================================================

// Start and end speed of a bolt's speed curve. A starts fast and slows, B starts slow and accelerates.
#[must_use]
pub fn bolt_speed_range(class: CharacterClass, stats: &BoltStats) -> (f32, f32) {
    match class {
        CharacterClass::A => (stats.max_speed, stats.min_speed),
        CharacterClass::B => (stats.min_speed, stats.max_speed * BOLT_B_ACCEL_MULTIPLIER),
    }
}

// Unit xz heading, or `CollisionDegenerate` for a zero vector.
pub fn heading(direction: Vec2) -> Result<Vec2, ArenaError> {
    direction.try_normalize().ok_or(ArenaError::CollisionDegenerate)
}

// Linear in lifetime progress, so monotonic over a bolt's life.
#[must_use]
pub fn bolt_speed_at(start_speed: f32, end_speed: f32, progress: f32) -> f32 {
    (end_speed - start_speed).mul_add(progress.clamp(0.0, 1.0), start_speed)
}

// Turn a unit heading toward `target`. Zero strength or a target under the bolt leaves it untouched.
#[must_use]
pub fn steer_toward(heading: Vec2, from: Vec2, target: Vec2, strength: f32, dt: f32) -> Vec2 {
    let strength = strength.clamp(0.0, 1.0);
    if strength <= 0.0 {
        return heading;
    }

    let to_target = target - from;
    let distance = to_target.length();
    if distance < PHYSICS_EPSILON {
        return heading;
    }

    let blend = (strength * BOLT_FOLLOW_SPEED_MULTIPLIER * dt).clamp(0.0, 1.0);
    let blended = heading.lerp(to_target / distance, blend);
    if blended.length() < PHYSICS_EPSILON {
        heading
    } else {
        blended.normalize()
    }
}

// ============================================================================
// Mortar Kinematics
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MortarLaunch {
    pub velocity: Vec3,
    pub flight_time: f32,
}

// Closed-form arc from `origin` to the ground point `target` peaking `arc_height` above launch.
// Targets closer than `MORTAR_MIN_DISTANCE` have no trajectory.
#[must_use]
pub fn mortar_launch(origin: Vec3, target: Vec2, arc_height: f32, gravity: f32) -> Option<MortarLaunch> {
    let g = gravity.abs();
    if g < PHYSICS_EPSILON || arc_height <= 0.0 {
        return None;
    }

    let horizontal = target - Vec2::new(origin.x, origin.z);
    let distance = horizontal.length();
    if distance < MORTAR_MIN_DISTANCE {
        return None;
    }

    let time_to_peak = (2.0 * arc_height / g).sqrt();
    let flight_time = 2.0 * time_to_peak;
    let speed = distance / flight_time;
    let direction = horizontal / distance;

    Some(MortarLaunch {
        velocity: Vec3::new(direction.x * speed, g * time_to_peak, direction.y * speed),
        flight_time,
    })
}

pub fn step_ballistic(position: &mut Vec3, velocity: &mut Vec3, gravity: f32, dt: f32) {
    velocity.y += gravity * dt;
    *position += *velocity * dt;
}
