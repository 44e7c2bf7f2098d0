//! Persistence seams
//!
//! The game never talks to a database directly. The host application hands
//! the controller something implementing [`PersistenceGateway`] (families,
//! progress, analytics sessions, events, survey responses) and
//! [`RiddleStore`] (riddle content). Implementations may block on network
//! calls; the controller awaits each call before touching dependent state.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::{
    id::{Id, RiddleId},
    records::{AnalyticsSession, Family, NewFamily, ProgressRecord, RiddleEvent},
    riddle::{Riddle, RiddleDraft},
    survey::SurveyResponse,
};

/// Failures reported by a persistence backend
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    /// The addressed row does not exist
    #[error("record not found")]
    NotFound,
    /// A uniqueness constraint rejected the write
    #[error("uniqueness constraint violated: {0}")]
    Conflict(String),
    /// The backend could not be reached or failed to store the data
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

impl GatewayError {
    /// Whether the failure is a uniqueness violation
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }
}

/// Result alias for gateway calls
pub type GatewayResult<T> = Result<T, GatewayError>;

/// Durable store for families, progress, analytics sessions, events and surveys
///
/// Implementations must reject a second progress row for the same
/// `(family_id, riddle_id)` with [`GatewayError::Conflict`], and deleting a
/// family must delete its progress rows.
pub trait PersistenceGateway {
    /// Inserts a family and returns the stored row
    fn insert_family(&self, family: NewFamily) -> GatewayResult<Family>;

    /// Looks a family up by id
    fn find_family(&self, family_id: Id) -> GatewayResult<Option<Family>>;

    /// Deletes a family together with its progress rows
    fn delete_family(&self, family_id: Id) -> GatewayResult<()>;

    /// Lists every family, oldest first
    fn list_families(&self) -> GatewayResult<Vec<Family>>;

    /// Looks up the progress row for a family and riddle
    fn find_progress(&self, family_id: Id, riddle_id: RiddleId)
    -> GatewayResult<Option<ProgressRecord>>;

    /// Inserts a progress row
    ///
    /// # Errors
    ///
    /// [`GatewayError::Conflict`] when the family already has a row for the riddle.
    fn insert_progress(&self, record: ProgressRecord) -> GatewayResult<ProgressRecord>;

    /// Lists a family's progress rows in solve order
    fn list_family_progress(&self, family_id: Id) -> GatewayResult<Vec<ProgressRecord>>;

    /// Lists every progress row
    fn list_all_progress(&self) -> GatewayResult<Vec<ProgressRecord>>;

    /// Inserts an analytics session
    fn insert_session(&self, session: AnalyticsSession) -> GatewayResult<AnalyticsSession>;

    /// Records running totals on an analytics session
    fn update_session_progress(
        &self,
        session_id: Id,
        riddles_completed: u32,
        total_points: u32,
    ) -> GatewayResult<()>;

    /// Marks an analytics session completed
    fn complete_session(&self, session_id: Id, ended_at: DateTime<Utc>) -> GatewayResult<()>;

    /// Lists every analytics session, oldest first
    fn list_sessions(&self) -> GatewayResult<Vec<AnalyticsSession>>;

    /// Appends a telemetry event
    fn insert_event(&self, event: RiddleEvent) -> GatewayResult<()>;

    /// Stores a survey response
    fn insert_survey(&self, response: SurveyResponse) -> GatewayResult<()>;

    /// Lists every survey response
    fn list_surveys(&self) -> GatewayResult<Vec<SurveyResponse>>;
}

/// Source of riddle content
pub trait RiddleStore {
    /// Active riddles ordered by id
    fn list_active_riddles(&self) -> GatewayResult<Vec<Riddle>>;

    /// Every riddle, active or not, ordered by id
    fn list_riddles(&self) -> GatewayResult<Vec<Riddle>>;

    /// Stores a new riddle and assigns its id
    fn insert_riddle(&self, draft: RiddleDraft) -> GatewayResult<Riddle>;

    /// Replaces a riddle's content
    fn update_riddle(&self, riddle_id: RiddleId, draft: RiddleDraft) -> GatewayResult<Riddle>;

    /// Removes a riddle
    fn delete_riddle(&self, riddle_id: RiddleId) -> GatewayResult<()>;
}
