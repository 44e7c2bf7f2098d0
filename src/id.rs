//! Identifiers for durable records
//!
//! Families, analytics sessions, progress rows, riddle events and survey
//! responses are keyed by random UUIDs. Riddles keep the small numeric
//! identifiers staff see in the admin dashboard.

use std::{fmt::Display, str::FromStr};

use serde::{Deserialize, Serialize};
use serde_with::{DeserializeFromStr, SerializeDisplay};
use uuid::Uuid;

/// A unique identifier for a durable record
///
/// Serialized as the hyphenated UUID string so it can be stored in the
/// string-valued local session keys and sent over JSON unchanged.
#[derive(
    Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, DeserializeFromStr, SerializeDisplay,
)]
pub struct Id(Uuid);

impl Id {
    /// Creates a new random identifier
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for Id {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for Id {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for Id {
    type Err = uuid::Error;

    /// Parses an identifier from a UUID string
    ///
    /// # Errors
    ///
    /// Returns a `uuid::Error` if the string is not a valid UUID.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::from_str(s)?))
    }
}

/// Stable identifier of a riddle
///
/// Assigned by the riddle store in increasing order; the active riddle
/// list is always returned sorted by this value.
#[derive(
    Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, derive_more::Display,
)]
#[serde(transparent)]
pub struct RiddleId(pub u64);

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn test_id_string_round_trip() {
        let id = Id::new();
        let parsed = Id::from_str(&id.to_string()).unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn test_id_rejects_garbage() {
        assert!(Id::from_str("not-a-uuid").is_err());
        assert!(Id::from_str("").is_err());
    }

    #[test]
    fn test_id_serializes_as_string() {
        let id = Id::from_str("67e55044-10b1-426f-9247-bb680e5fe0c8").unwrap();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"67e55044-10b1-426f-9247-bb680e5fe0c8\"");
    }

    #[test]
    fn test_riddle_id_is_transparent_number() {
        let json = serde_json::to_string(&RiddleId(7)).unwrap();
        assert_eq!(json, "7");
        assert_eq!(RiddleId(7).to_string(), "7");
        assert!(RiddleId(3) < RiddleId(10));
    }
}
