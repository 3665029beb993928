use std::collections::HashMap;

use bevy_ecs::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value, json};
use tracing::{debug, error, warn};

use crate::{
    constants::DEFAULT_MOVE_SPEED,
    error::{ArenaError, ErrorLog},
    protocol::{Ability, CharacterClass},
};

// ============================================================================
// Resolved Stat Tables
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoltStats {
    pub damage: f32,
    pub cooldown: f32,
    pub projectile_speed: f32,
    pub min_speed: f32,
    pub max_speed: f32,
    pub size: f32,
    pub lifetime: f32,
    pub cursor_follow_strength: f32,
    pub max_bullets: f32,
    pub recharge_cooldown: f32,
}

impl BoltStats {
    // Multipliers may leave a fractional bullet count; round to whole bullets, never below one.
    #[must_use]
    pub fn bullet_capacity(&self) -> u32 {
        self.max_bullets.round().max(1.0) as u32
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MortarStats {
    pub damage: f32,
    pub area_damage: f32,
    pub cooldown: f32,
    pub arc_height: f32,
    pub max_range: f32,
    pub splash_radius: f32,
    pub fire_duration: f32,
    pub shrink_delay: f32,
    pub size: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeleeStats {
    pub initial_damage: f32,
    pub damage: f32,
    pub tick_interval: f32,
    pub range: f32,
    pub animation_duration: f32,
    pub cooldown: f32,
    pub poison_damage: f32,
    pub poison_tick_interval: f32,
    pub poison_duration: f32,
    pub slow_speed_multiplier: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CharacterStats {
    pub name: String,
    pub color: String,
    pub max_health: f32,
    pub move_speed: f32,
    pub bolt: BoltStats,
    pub mortar: MortarStats,
    pub melee: MeleeStats,
}

// Read-only view of one ability's resolved numbers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AbilityStats<'a> {
    Bolt(&'a BoltStats),
    Mortar(&'a MortarStats),
    Melee(&'a MeleeStats),
}

impl AbilityStats<'_> {
    #[must_use]
    pub const fn cooldown(&self) -> f32 {
        match self {
            Self::Bolt(s) => s.cooldown,
            Self::Mortar(s) => s.cooldown,
            Self::Melee(s) => s.cooldown,
        }
    }
}

// ============================================================================
// Layer Composition
// ============================================================================

// Merge a character layer onto a base table.
// Numbers multiply, nested tables recurse, anything else from the layer replaces the base.
// Keys only present in the layer are added verbatim; keys missing from the layer inherit.
#[must_use]
pub fn compose(base: &Value, layer: &Value) -> Value {
    match (base, layer) {
        (Value::Object(base_map), Value::Object(layer_map)) => {
            let mut out: Map<String, Value> = base_map.clone();
            for (key, layer_value) in layer_map {
                let merged = match base_map.get(key) {
                    Some(base_value) => compose_leaf(base_value, layer_value),
                    None => layer_value.clone(),
                };
                out.insert(key.clone(), merged);
            }
            Value::Object(out)
        }
        _ => layer.clone(),
    }
}

fn compose_leaf(base: &Value, layer: &Value) -> Value {
    match (base, layer) {
        (Value::Number(b), Value::Number(m)) => {
            let product = b.as_f64().unwrap_or(0.0) * m.as_f64().unwrap_or(1.0);
            Number::from_f64(product).map_or_else(|| base.clone(), Value::Number)
        }
        (Value::Object(_), Value::Object(_)) => compose(base, layer),
        _ => layer.clone(),
    }
}

// ============================================================================
// Stats Registry
// ============================================================================

/// Per-class stat tables, composed once from a base table and character layers.
/// Class A doubles as the fallback for anything the registry does not know.
#[derive(Resource, Debug, Clone)]
pub struct StatsRegistry {
    fallback: CharacterStats,
    others: HashMap<CharacterClass, CharacterStats>,
    composed: HashMap<CharacterClass, Value>,
}

impl StatsRegistry {
    /// Compose and type every known class. Fails when a merged table does not deserialize.
    pub fn new(base: &Value, layers: &Map<String, Value>) -> Result<Self, ArenaError> {
        for name in layers.keys() {
            if CharacterClass::parse(name).is_none() {
                warn!("ignoring stat layer for unknown character {name:?}");
            }
        }

        let mut composed = HashMap::new();
        let mut type_class = |class: CharacterClass| -> Result<CharacterStats, ArenaError> {
            let merged = layers
                .get(class.key())
                .map_or_else(|| base.clone(), |layer| compose(base, layer));
            let stats: CharacterStats =
                serde_json::from_value(merged.clone()).map_err(|source| ArenaError::Config { class, source })?;
            debug!("resolved stats for {:?} ({})", class, stats.name);
            composed.insert(class, merged);
            Ok(stats)
        };

        let fallback = type_class(CharacterClass::A)?;
        let mut others = HashMap::new();
        for class in CharacterClass::ALL.into_iter().filter(|c| *c != CharacterClass::A) {
            others.insert(class, type_class(class)?);
        }

        Ok(Self {
            fallback,
            others,
            composed,
        })
    }

    // Document shape: { "base": {...}, "characters": { "A": {...}, "B": {...} } }
    pub fn from_document(doc: &Value) -> Result<Self, ArenaError> {
        let base = doc.get("base").cloned().unwrap_or_else(|| Value::Object(Map::new()));
        let layers = doc
            .get("characters")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default();
        Self::new(&base, &layers)
    }

    /// The shipped tables. If they ever stop composing, every class gets the plain base table.
    #[must_use]
    pub fn builtin() -> Self {
        Self::from_document(&builtin_document()).unwrap_or_else(|err| {
            error!("built-in stat layers rejected, using base stats for every class: {err}");
            Self::uniform(CharacterStats::default())
        })
    }

    // Same table for every class.
    #[must_use]
    pub fn uniform(stats: CharacterStats) -> Self {
        Self {
            fallback: stats,
            others: HashMap::new(),
            composed: HashMap::new(),
        }
    }

    #[must_use]
    pub fn resolve(&self, class: CharacterClass, ability: Ability) -> AbilityStats<'_> {
        let stats = self.character(class);
        match ability {
            Ability::Bolt => AbilityStats::Bolt(&stats.bolt),
            Ability::Mortar => AbilityStats::Mortar(&stats.mortar),
            Ability::Melee => AbilityStats::Melee(&stats.melee),
        }
    }

    /// Name-based lookup for data arriving from outside the core.
    pub fn lookup_named(&self, name: &str, ability: Ability) -> Result<AbilityStats<'_>, ArenaError> {
        CharacterClass::parse(name)
            .map(|class| self.resolve(class, ability))
            .ok_or_else(|| ArenaError::ConfigMissing {
                name: name.to_string(),
                ability,
            })
    }

    /// Like [`Self::lookup_named`], but unknown names are reported once to `errors` and resolve as A.
    pub fn resolve_named(&self, name: &str, ability: Ability, errors: &mut ErrorLog) -> AbilityStats<'_> {
        self.lookup_named(name, ability).unwrap_or_else(|err| {
            errors.report("stats", &err);
            self.resolve(CharacterClass::A, ability)
        })
    }

    #[must_use]
    pub fn character(&self, class: CharacterClass) -> &CharacterStats {
        self.others.get(&class).unwrap_or(&self.fallback)
    }

    #[must_use]
    pub fn bolt(&self, class: CharacterClass) -> &BoltStats {
        &self.character(class).bolt
    }

    #[must_use]
    pub fn mortar(&self, class: CharacterClass) -> &MortarStats {
        &self.character(class).mortar
    }

    #[must_use]
    pub fn melee(&self, class: CharacterClass) -> &MeleeStats {
        &self.character(class).melee
    }

    // The merged JSON view, before typing. Useful for tooling and invariant checks.
    #[must_use]
    pub fn composed(&self, class: CharacterClass) -> Option<&Value> {
        self.composed.get(&class)
    }
}

impl Default for StatsRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

// ============================================================================
// Built-In Tables
// ============================================================================

impl Default for BoltStats {
    fn default() -> Self {
        Self {
            damage: 20.0,
            cooldown: 0.4,
            projectile_speed: 8.0,
            min_speed: 6.0,
            max_speed: 10.0,
            size: 0.13,
            lifetime: 3.0,
            cursor_follow_strength: 0.5,
            max_bullets: 6.0,
            recharge_cooldown: 2.0,
        }
    }
}

impl Default for MortarStats {
    fn default() -> Self {
        Self {
            damage: 35.0,
            area_damage: 8.0,
            cooldown: 2.5,
            arc_height: 2.5,
            max_range: 8.0,
            splash_radius: 0.9,
            fire_duration: 1.75,
            shrink_delay: 0.9,
            size: 0.2,
        }
    }
}

impl Default for MeleeStats {
    fn default() -> Self {
        Self {
            initial_damage: 15.0,
            damage: 5.0,
            tick_interval: 0.25,
            range: 1.5,
            animation_duration: 0.6,
            cooldown: 1.2,
            poison_damage: 2.0,
            poison_tick_interval: 0.5,
            poison_duration: 3.0,
            slow_speed_multiplier: 0.6,
        }
    }
}

// The base table every character layer multiplies.
impl Default for CharacterStats {
    fn default() -> Self {
        Self {
            name: "Fighter".to_string(),
            color: "#ffffff".to_string(),
            max_health: 100.0,
            move_speed: DEFAULT_MOVE_SPEED,
            bolt: BoltStats::default(),
            mortar: MortarStats::default(),
            melee: MeleeStats::default(),
        }
    }
}

#[must_use]
pub fn builtin_document() -> Value {
    let base = serde_json::to_value(CharacterStats::default()).unwrap_or_default();
    json!({
        "base": base,
        "characters": {
            "A": {
                "name": "Ember",
                "color": "#ff7a1a",
                "bolt": {
                    "damage": 0.5,
                    "cooldown": 0.375,
                    "cursorFollowStrength": 2.0,
                    "maxBullets": 1.5
                },
                "mortar": { "areaDamage": 0.75 },
                "melee": { "poisonDuration": 1.5 }
            },
            "B": {
                "name": "Frost",
                "color": "#4fc3ff",
                "maxHealth": 1.2,
                "moveSpeed": 0.9,
                "bolt": {
                    "damage": 1.75,
                    "cooldown": 2.0,
                    "cursorFollowStrength": 0.0,
                    "maxBullets": 0.5,
                    "rechargeCooldown": 1.5
                },
                "mortar": { "damage": 1.2, "splashRadius": 1.25 },
                "melee": { "slowSpeedMultiplier": 0.75 }
            }
        }
    })
}
