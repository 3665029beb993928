use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
    time::{SystemTime, UNIX_EPOCH},
};

use serde::{Deserialize, Serialize, de::DeserializeOwned};
use tracing::{debug, warn};

use crate::{bots::Difficulty, combat::GameMode, error::ArenaError};

// ============================================================================
// Keys
// ============================================================================

pub const SETTINGS_KEY: &str = "hife_settings";

#[must_use]
pub fn learning_key(difficulty: Difficulty) -> String {
    format!("hife_bot_learning_{}", difficulty.key())
}

#[must_use]
pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| elapsed.as_secs())
}

// ============================================================================
// Stores
// ============================================================================

pub trait KeyValueStore {
    fn load(&self, key: &str) -> Result<Option<String>, ArenaError>;
    fn save(&mut self, key: &str, value: &str) -> Result<(), ArenaError>;
}

// One `<key>.json` file per key inside a directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let safe: String = key
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '-' { c } else { '_' })
            .collect();
        self.dir.join(format!("{safe}.json"))
    }
}

impl KeyValueStore for FileStore {
    fn load(&self, key: &str) -> Result<Option<String>, ArenaError> {
        let path = self.path_for(key);
        match fs::read_to_string(&path) {
            Ok(text) => Ok(Some(text)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(ArenaError::StorageUnavailable(format!("{}: {e}", path.display()))),
        }
    }

    fn save(&mut self, key: &str, value: &str) -> Result<(), ArenaError> {
        let path = self.path_for(key);
        fs::create_dir_all(&self.dir)
            .and_then(|()| fs::write(&path, value))
            .map_err(|e| ArenaError::StorageUnavailable(format!("{}: {e}", path.display())))
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: HashMap<String, String>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn load(&self, key: &str) -> Result<Option<String>, ArenaError> {
        Ok(self.entries.get(key).cloned())
    }

    fn save(&mut self, key: &str, value: &str) -> Result<(), ArenaError> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

// ============================================================================
// Records
// ============================================================================

// Missing, unreadable and corrupt records all come back as None.
pub fn load_record<T: DeserializeOwned>(store: &dyn KeyValueStore, key: &str) -> Option<T> {
    let text = match store.load(key) {
        Ok(Some(text)) => text,
        Ok(None) => return None,
        Err(e) => {
            warn!("failed to read {key}: {e}");
            return None;
        }
    };
    match serde_json::from_str(&text) {
        Ok(record) => Some(record),
        Err(e) => {
            warn!("ignoring corrupt record {key}: {e}");
            None
        }
    }
}

pub fn save_record<T: Serialize>(store: &mut dyn KeyValueStore, key: &str, record: &T) -> Result<(), ArenaError> {
    let text = serde_json::to_string_pretty(record).map_err(|e| ArenaError::StorageUnavailable(e.to_string()))?;
    store.save(key, &text)?;
    debug!("saved {key}");
    Ok(())
}

// What bots of one difficulty have learned across matches.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BotLearning {
    pub shots_fired: u32,
    pub shots_hit: u32,
    pub kills: u32,
    pub deaths: u32,
    pub matches: u32,
    pub saved_at: u64,
}

impl BotLearning {
    // Fraction of bolts that connected, once enough shots were fired to mean anything.
    #[must_use]
    pub fn hit_rate(&self, min_shots: u32) -> Option<f32> {
        if self.shots_fired == 0 || self.shots_fired < min_shots {
            return None;
        }
        Some((self.shots_hit as f32 / self.shots_fired as f32).clamp(0.0, 1.0))
    }

    pub fn load(store: &dyn KeyValueStore, difficulty: Difficulty) -> Self {
        load_record(store, &learning_key(difficulty)).unwrap_or_default()
    }

    pub fn save(&mut self, store: &mut dyn KeyValueStore, difficulty: Difficulty) -> Result<(), ArenaError> {
        self.saved_at = unix_now();
        save_record(store, &learning_key(difficulty), self)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ArenaSettings {
    pub mode: GameMode,
    pub difficulty: Difficulty,
    pub bot_count: u32,
    pub show_scoreboard: bool,
    pub saved_at: u64,
}

impl Default for ArenaSettings {
    fn default() -> Self {
        Self {
            mode: GameMode::Practice,
            difficulty: Difficulty::Medium,
            bot_count: 3,
            show_scoreboard: true,
            saved_at: 0,
        }
    }
}

impl ArenaSettings {
    pub fn load(store: &dyn KeyValueStore) -> Self {
        load_record(store, SETTINGS_KEY).unwrap_or_default()
    }

    pub fn save(&mut self, store: &mut dyn KeyValueStore) -> Result<(), ArenaError> {
        self.saved_at = unix_now();
        save_record(store, SETTINGS_KEY, self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn learning_round_trips_through_a_store() {
        let mut store = MemoryStore::new();
        let mut learning = BotLearning {
            shots_fired: 30,
            shots_hit: 12,
            ..BotLearning::default()
        };
        learning.save(&mut store, Difficulty::Hard).expect("memory store");
        assert!(learning.saved_at > 0);

        let loaded = BotLearning::load(&store, Difficulty::Hard);
        assert_eq!(loaded, learning);
        assert_eq!(BotLearning::load(&store, Difficulty::Easy), BotLearning::default());
    }

    #[test]
    fn corrupt_records_read_as_missing() {
        let mut store = MemoryStore::new();
        store.save(SETTINGS_KEY, "{not json").expect("memory store");
        assert_eq!(ArenaSettings::load(&store), ArenaSettings::default());
    }

    #[test]
    fn records_use_camel_case_with_timestamp() {
        let mut store = MemoryStore::new();
        ArenaSettings::default().save(&mut store).expect("memory store");
        let text = store.load(SETTINGS_KEY).expect("memory store").expect("saved");
        assert!(text.contains("savedAt"));
        assert!(text.contains("\"mode\": \"practice\""));
    }

    #[test]
    fn hit_rate_needs_enough_shots() {
        let few = BotLearning {
            shots_fired: 5,
            shots_hit: 5,
            ..BotLearning::default()
        };
        assert_eq!(few.hit_rate(20), None);
        assert_eq!(few.hit_rate(5), Some(1.0));
    }

    #[test]
    fn file_store_writes_one_file_per_key() {
        let dir = std::env::temp_dir().join(format!("arena-store-{}", std::process::id()));
        let mut store = FileStore::new(&dir);
        assert_eq!(store.load("hife_settings").expect("readable"), None);
        store.save("hife_settings", "{}").expect("writable");
        assert_eq!(store.load("hife_settings").expect("readable").as_deref(), Some("{}"));
        assert!(dir.join("hife_settings.json").exists());
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn keys_follow_the_difficulty() {
        assert_eq!(learning_key(Difficulty::Easy), "hife_bot_learning_easy");
    }
}
