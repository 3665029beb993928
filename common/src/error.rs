use std::collections::HashSet;

use thiserror::Error;
use tracing::warn;

use crate::protocol::{Ability, CharacterClass, CharacterId};

// ============================================================================
// Error Taxonomy
// ============================================================================

#[derive(Debug, Error)]
pub enum ArenaError {
    // Unknown character name. Callers substitute class A.
    #[error("no {ability:?} stats for character {name:?}")]
    ConfigMissing { name: String, ability: Ability },

    // Damage target or shooter vanished mid-frame.
    #[error("entity {0:?} not found")]
    EntityNotFound(CharacterId),

    // Zero-length direction vectors. Treated as a no-op.
    #[error("degenerate direction vector")]
    CollisionDegenerate,

    // Persistent store read/write failed.
    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),

    // Stat tables that merge but do not deserialize.
    #[error("invalid stat table for {class:?}: {source}")]
    Config {
        class: CharacterClass,
        #[source]
        source: serde_json::Error,
    },
}

impl ArenaError {
    // Stable key so repeated failures of the same kind are only logged once.
    #[must_use]
    pub fn cause_key(&self) -> String {
        match self {
            Self::ConfigMissing { name, .. } => format!("config:{name}"),
            Self::EntityNotFound(id) => format!("entity:{}", id.0),
            Self::CollisionDegenerate => "degenerate".to_string(),
            Self::StorageUnavailable(what) => format!("storage:{what}"),
            Self::Config { class, .. } => format!("table:{class:?}"),
        }
    }
}

// ============================================================================
// Once-Per-Cause Logging
// ============================================================================

#[derive(Debug, Default)]
pub struct ErrorLog {
    seen: HashSet<String>,
}

impl ErrorLog {
    // Log `err` unless its cause was already reported. Returns true when logged.
    pub fn report(&mut self, context: &str, err: &ArenaError) -> bool {
        if self.seen.insert(err.cause_key()) {
            warn!("{context}: {err}");
            true
        } else {
            false
        }
    }

    #[must_use]
    pub fn reported(&self) -> usize {
        self.seen.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_cause_is_logged_once() {
        let mut log = ErrorLog::default();
        let err = ArenaError::EntityNotFound(CharacterId(7));
        assert!(log.report("damage", &err));
        assert!(!log.report("damage", &ArenaError::EntityNotFound(CharacterId(7))));
        assert!(log.report("damage", &ArenaError::EntityNotFound(CharacterId(8))));
        assert_eq!(log.reported(), 2);
    }
}
