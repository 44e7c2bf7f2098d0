//! Typed durable records
//!
//! Every row the persistence gateway hands back is mapped onto one of the
//! structs in this module. Rows that arrive untyped (JSON from a hosted
//! backend, seed files) go through [`decode_rows`], which validates them at
//! the boundary and drops the ones that do not fit.

use chrono::{DateTime, Utc};
use garde::Validate;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_with::skip_serializing_none;

use crate::{
    constants,
    id::{Id, RiddleId},
    riddle::DifficultyFilter,
};

/// A visiting group and the identity of one play-through
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct Family {
    /// Identifier assigned on insert
    #[garde(skip)]
    pub id: Id,
    /// Display name chosen on the welcome screen
    #[serde(rename = "family_name")]
    #[garde(length(min = 1, max = constants::family::MAX_NAME_LENGTH))]
    pub name: String,
    /// Difficulty chosen on the welcome screen
    #[garde(skip)]
    pub selected_difficulty: DifficultyFilter,
    /// Creation time
    #[garde(skip)]
    pub created_at: DateTime<Utc>,
}

/// Input for creating a family
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewFamily {
    /// Validated family name
    pub name: String,
    /// Selected difficulty
    pub selected_difficulty: DifficultyFilter,
}

/// Durable proof that a family solved a riddle
///
/// At most one exists per `(family_id, riddle_id)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct ProgressRecord {
    /// Row identifier
    #[garde(skip)]
    pub id: Id,
    /// Family that solved the riddle
    #[garde(skip)]
    pub family_id: Id,
    /// Riddle that was solved
    #[garde(skip)]
    pub riddle_id: RiddleId,
    /// Points credited for the solve
    #[garde(range(min = constants::riddle::MIN_POINTS))]
    pub points_earned: u32,
    /// Time the solve was recorded
    #[garde(skip)]
    pub completed_at: DateTime<Utc>,
}

impl ProgressRecord {
    /// Creates a fresh row for a solve happening now
    pub fn new(family_id: Id, riddle_id: RiddleId, points_earned: u32) -> Self {
        Self {
            id: Id::new(),
            family_id,
            riddle_id,
            points_earned,
            completed_at: Utc::now(),
        }
    }
}

/// Lifecycle of an analytics session, as shown on the completion funnel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, enum_map::Enum)]
#[serde(rename_all = "lowercase")]
pub enum CompletionStatus {
    /// Still playing, or left without finishing and not yet swept
    Active,
    /// Every riddle in the sequence was solved
    Completed,
    /// Closed by an external inactivity sweep
    Abandoned,
}

/// Telemetry wrapper around one family's play-through
#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct AnalyticsSession {
    /// Row identifier
    #[garde(skip)]
    pub id: Id,
    /// Family being tracked
    #[garde(skip)]
    pub family_id: Id,
    /// Difficulty the family plays at
    #[garde(skip)]
    pub difficulty: DifficultyFilter,
    /// Adventure start
    #[garde(skip)]
    pub started_at: DateTime<Utc>,
    /// Set when the session is completed or abandoned
    #[serde(default)]
    #[garde(custom(ends_after_start(&self.started_at)))]
    pub ended_at: Option<DateTime<Utc>>,
    /// Riddles solved so far
    #[serde(default)]
    #[garde(skip)]
    pub riddles_completed: u32,
    /// Points earned so far
    #[serde(default)]
    #[garde(skip)]
    pub total_points: u32,
    /// Funnel classification
    #[garde(skip)]
    pub completion_status: CompletionStatus,
}

fn ends_after_start(
    started_at: &DateTime<Utc>,
) -> impl FnOnce(&Option<DateTime<Utc>>, &()) -> garde::Result + '_ {
    move |ended_at, _| match ended_at {
        Some(ended_at) if ended_at < started_at => {
            Err(garde::Error::new("session ends before it starts"))
        }
        _ => Ok(()),
    }
}

impl AnalyticsSession {
    /// Creates an active session starting now
    pub fn start(family_id: Id, difficulty: DifficultyFilter) -> Self {
        Self {
            id: Id::new(),
            family_id,
            difficulty,
            started_at: Utc::now(),
            ended_at: None,
            riddles_completed: 0,
            total_points: 0,
            completion_status: CompletionStatus::Active,
        }
    }

    /// Duration of a finished session in minutes
    pub fn duration_minutes(&self) -> Option<f64> {
        let ended_at = self.ended_at?;
        Some((ended_at - self.started_at).num_milliseconds() as f64 / 60_000.)
    }
}

/// Kinds of riddle telemetry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    /// A riddle was presented
    Viewed,
    /// The hint was revealed
    HintUsed,
    /// A QR code for another exhibit was scanned
    WrongScan,
    /// The right exhibit was scanned
    CorrectScan,
}

/// Append-only telemetry entry
#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiddleEvent {
    /// Analytics session the event belongs to
    pub session_id: Id,
    /// Riddle the event is about
    pub riddle_id: RiddleId,
    /// What happened
    pub event_type: EventType,
    /// When it happened
    #[serde(rename = "event_timestamp")]
    pub timestamp: DateTime<Utc>,
    /// Seconds since the riddle was first viewed (correct scans only)
    #[serde(default)]
    pub time_spent_seconds: Option<u64>,
}

impl RiddleEvent {
    /// Creates an event happening now
    pub fn now(session_id: Id, riddle_id: RiddleId, event_type: EventType) -> Self {
        Self {
            session_id,
            riddle_id,
            event_type,
            timestamp: Utc::now(),
            time_spent_seconds: None,
        }
    }
}

/// Decodes untyped rows into validated records
///
/// Rows that fail to deserialize or to validate are skipped and logged;
/// the backend's shape is never trusted blindly.
pub fn decode_rows<T>(table: &str, rows: impl IntoIterator<Item = serde_json::Value>) -> Vec<T>
where
    T: DeserializeOwned + Validate,
    T::Context: Default,
{
    rows.into_iter()
        .enumerate()
        .filter_map(|(position, row)| {
            let record = match serde_json::from_value::<T>(row) {
                Ok(record) => record,
                Err(e) => {
                    log::warn!("Skipping malformed {table} row #{position}: {e}");
                    return None;
                }
            };
            match record.validate() {
                Ok(()) => Some(record),
                Err(report) => {
                    log::warn!("Skipping invalid {table} row #{position}: {report}");
                    None
                }
            }
        })
        .collect()
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::riddle::Riddle;
    use serde_json::json;

    #[test]
    fn test_decode_rows_skips_malformed_and_invalid() {
        let rows = vec![
            json!({
                "id": 1, "animal": "Lion", "riddle": "Roar", "hint": "Mane",
                "fact": "Big cat", "difficulty": "easy", "points": 50,
                "qr_code": "LION", "zone": "Africa", "icon": "🦁", "active": true
            }),
            // missing qr_code
            json!({
                "id": 2, "animal": "Tiger", "riddle": "Stripes", "hint": "Orange",
                "fact": "Big cat", "difficulty": "hard", "points": 50
            }),
            // zero points fails validation
            json!({
                "id": 3, "animal": "Owl", "riddle": "Hoot", "hint": "Night",
                "fact": "Bird", "difficulty": "medium", "points": 0, "qr_code": "OWL"
            }),
            json!("not even an object"),
        ];

        let riddles: Vec<Riddle> = decode_rows("riddles", rows);
        assert_eq!(riddles.len(), 1);
        assert_eq!(riddles[0].animal, "Lion");
    }

    #[test]
    fn test_decode_rows_keeps_riddles_without_zone_or_icon() {
        let rows = vec![json!({
            "id": 1, "animal": "Lion", "riddle": "Roar", "hint": "Mane",
            "fact": "Big cat", "difficulty": "easy", "points": 50,
            "qr_code": "LION", "zone": null, "icon": null, "active": true
        })];

        let riddles: Vec<Riddle> = decode_rows("riddles", rows);
        assert_eq!(riddles.len(), 1);
        assert_eq!(riddles[0].zone, None);
        assert!(riddles[0].icon.is_empty());
    }

    #[test]
    fn test_session_rejects_end_before_start() {
        let mut session = AnalyticsSession::start(Id::new(), DifficultyFilter::All);
        assert!(session.validate().is_ok());

        session.ended_at = Some(session.started_at - chrono::Duration::minutes(5));
        assert!(session.validate().is_err());

        session.ended_at = Some(session.started_at + chrono::Duration::minutes(5));
        assert!(session.validate().is_ok());
        assert_eq!(session.duration_minutes(), Some(5.));
    }

    #[test]
    fn test_event_serializes_wire_names() {
        let event = RiddleEvent::now(Id::new(), RiddleId(4), EventType::HintUsed);
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["event_type"], "hint_used");
        assert!(value.get("event_timestamp").is_some());
        assert!(value.get("time_spent_seconds").is_none());
    }

    #[test]
    fn test_completion_status_wire_names() {
        let value = serde_json::to_value(CompletionStatus::Abandoned).unwrap();
        assert_eq!(value, "abandoned");
    }
}
