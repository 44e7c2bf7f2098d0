//! Client-side session persistence
//!
//! A family's browser keeps a handful of string keys so a reload lands
//! them back on the riddle they were working on. The controller reads these
//! keys once when the page loads and is the only writer afterwards.
//! [`SessionRepository`] abstracts the storage so resume logic runs without
//! a browser.

use std::{collections::HashMap, str::FromStr};

use crate::{id::Id, riddle::DifficultyFilter};

/// Storage keys, all string valued and cleared together
pub mod keys {
    /// Family identifier
    pub const FAMILY_ID: &str = "zooSafariFamilyId";
    /// Family display name
    pub const FAMILY_NAME: &str = "zooSafariFamilyName";
    /// Selected difficulty
    pub const DIFFICULTY: &str = "zooSafariDifficulty";
    /// Index into the riddle sequence
    pub const CURRENT_RIDDLE: &str = "zooSafariCurrentRiddle";
    /// Analytics session identifier
    pub const SESSION_ID: &str = "zooSafariSessionId";
    /// Seed the riddle sequence was shuffled with
    pub const SEQUENCE_SEED: &str = "zooSafariSequenceSeed";

    /// Every key owned by the game
    pub const ALL: [&str; 6] = [
        FAMILY_ID,
        FAMILY_NAME,
        DIFFICULTY,
        CURRENT_RIDDLE,
        SESSION_ID,
        SEQUENCE_SEED,
    ];
}

/// What the controller needs to pick an adventure back up
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredSession {
    /// Family playing on this device
    pub family_id: Id,
    /// Family display name
    pub family_name: String,
    /// Selected difficulty
    pub difficulty: DifficultyFilter,
    /// Index into the riddle sequence
    pub current_index: usize,
    /// Analytics session, absent when its creation failed
    pub session_id: Option<Id>,
    /// Seed the riddle sequence was shuffled with
    pub sequence_seed: Option<u64>,
}

impl StoredSession {
    /// Encodes the session as string key/value pairs
    pub fn to_entries(&self) -> Vec<(&'static str, String)> {
        let mut entries = vec![
            (keys::FAMILY_ID, self.family_id.to_string()),
            (keys::FAMILY_NAME, self.family_name.clone()),
            (keys::DIFFICULTY, self.difficulty.to_string()),
            (keys::CURRENT_RIDDLE, self.current_index.to_string()),
        ];
        if let Some(session_id) = self.session_id {
            entries.push((keys::SESSION_ID, session_id.to_string()));
        }
        if let Some(seed) = self.sequence_seed {
            entries.push((keys::SEQUENCE_SEED, seed.to_string()));
        }
        entries
    }

    /// Decodes a session from string values looked up by key
    ///
    /// A session without a parsable family id or without a family name is
    /// treated as absent. Unparsable optional values fall back to their
    /// defaults.
    pub fn from_lookup<'a>(lookup: impl Fn(&str) -> Option<&'a str>) -> Option<Self> {
        let family_id = lookup(keys::FAMILY_ID).and_then(|raw| Id::from_str(raw).ok())?;
        let family_name = lookup(keys::FAMILY_NAME)?.to_owned();

        let difficulty = lookup(keys::DIFFICULTY)
            .and_then(|raw| {
                DifficultyFilter::from_str(raw)
                    .inspect_err(|e| log::warn!("Ignoring stored difficulty: {e}"))
                    .ok()
            })
            .unwrap_or_default();
        let current_index = lookup(keys::CURRENT_RIDDLE)
            .and_then(|raw| raw.parse().ok())
            .unwrap_or_default();

        Some(Self {
            family_id,
            family_name,
            difficulty,
            current_index,
            session_id: lookup(keys::SESSION_ID).and_then(|raw| Id::from_str(raw).ok()),
            sequence_seed: lookup(keys::SEQUENCE_SEED).and_then(|raw| raw.parse().ok()),
        })
    }
}

/// Durable client-side storage for the active adventure
///
/// Implementations wrap whatever the host offers (browser local storage, a
/// kiosk's config file).
pub trait SessionRepository {
    /// Reads the stored session, if any
    fn load(&self) -> Option<StoredSession>;

    /// Replaces the stored session
    fn save(&mut self, session: &StoredSession);

    /// Removes every key the game owns
    fn clear(&mut self);
}

/// Key/value repository kept in memory
#[derive(Debug, Default, Clone)]
pub struct MemorySessionRepository {
    values: HashMap<String, String>,
}

impl MemorySessionRepository {
    /// Creates an empty repository
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads a raw key
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Writes a raw key
    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        self.values.insert(key.to_owned(), value.into());
    }

    /// Number of stored keys
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether no key is stored
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl SessionRepository for MemorySessionRepository {
    fn load(&self) -> Option<StoredSession> {
        StoredSession::from_lookup(|key| self.get(key))
    }

    fn save(&mut self, session: &StoredSession) {
        self.clear();
        for (key, value) in session.to_entries() {
            self.set(key, value);
        }
    }

    fn clear(&mut self) {
        for key in keys::ALL {
            self.values.remove(key);
        }
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::riddle::Difficulty;

    fn stored() -> StoredSession {
        StoredSession {
            family_id: Id::new(),
            family_name: "Smiths".to_owned(),
            difficulty: DifficultyFilter::Only(Difficulty::Easy),
            current_index: 2,
            session_id: Some(Id::new()),
            sequence_seed: Some(42),
        }
    }

    #[test]
    fn test_save_then_load() {
        let mut repository = MemorySessionRepository::new();
        let session = stored();
        repository.save(&session);

        assert_eq!(repository.get(keys::DIFFICULTY), Some("easy"));
        assert_eq!(repository.get(keys::CURRENT_RIDDLE), Some("2"));
        assert_eq!(repository.load(), Some(session));
    }

    #[test]
    fn test_clear_removes_only_game_keys() {
        let mut repository = MemorySessionRepository::new();
        repository.set("theme", "dark");
        repository.save(&stored());
        assert_eq!(repository.len(), 7);

        repository.clear();
        assert_eq!(repository.load(), None);
        assert_eq!(repository.len(), 1);
        assert_eq!(repository.get("theme"), Some("dark"));
    }

    #[test]
    fn test_missing_family_means_no_session() {
        let mut repository = MemorySessionRepository::new();
        repository.set(keys::FAMILY_NAME, "Smiths");
        assert_eq!(repository.load(), None);

        repository.set(keys::FAMILY_ID, "garbage");
        assert_eq!(repository.load(), None);
    }

    #[test]
    fn test_garbage_optional_values_fall_back() {
        let mut repository = MemorySessionRepository::new();
        let family_id = Id::new();
        repository.set(keys::FAMILY_ID, family_id.to_string());
        repository.set(keys::FAMILY_NAME, "Smiths");
        repository.set(keys::DIFFICULTY, "impossible");
        repository.set(keys::CURRENT_RIDDLE, "NaN");
        repository.set(keys::SEQUENCE_SEED, "-3");

        let session = repository.load().unwrap();
        assert_eq!(session.family_id, family_id);
        assert_eq!(session.difficulty, DifficultyFilter::All);
        assert_eq!(session.current_index, 0);
        assert_eq!(session.session_id, None);
        assert_eq!(session.sequence_seed, None);
    }

    #[test]
    fn test_save_without_session_drops_stale_key() {
        let mut repository = MemorySessionRepository::new();
        repository.save(&stored());

        let mut without = stored();
        without.session_id = None;
        repository.save(&without);
        assert_eq!(repository.get(keys::SESSION_ID), None);
    }
}
