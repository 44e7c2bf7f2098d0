//! In-process persistence backend
//!
//! [`MemoryGateway`] implements both [`PersistenceGateway`] and
//! [`RiddleStore`] on top of plain collections guarded by a mutex. It keeps
//! the same integrity rules a hosted backend is expected to enforce: one
//! progress row per family and riddle, cascade delete of progress with its
//! family, and unique QR payloads among active riddles. It backs demos,
//! kiosks running offline, and the crate's tests.

use std::{
    collections::BTreeMap,
    sync::{
        Mutex, MutexGuard,
        atomic::{AtomicBool, Ordering},
    },
};

use chrono::{DateTime, Utc};
use itertools::Itertools;

use crate::{
    gateway::{GatewayError, GatewayResult, PersistenceGateway, RiddleStore},
    id::{Id, RiddleId},
    records::{self, AnalyticsSession, CompletionStatus, Family, NewFamily, ProgressRecord, RiddleEvent},
    riddle::{Riddle, RiddleDraft},
    survey::SurveyResponse,
};

#[derive(Debug, Default)]
struct Tables {
    families: Vec<Family>,
    progress: Vec<ProgressRecord>,
    sessions: Vec<AnalyticsSession>,
    events: Vec<RiddleEvent>,
    surveys: Vec<SurveyResponse>,
    riddles: BTreeMap<RiddleId, Riddle>,
}

impl Tables {
    fn session_mut(&mut self, session_id: Id) -> GatewayResult<&mut AnalyticsSession> {
        self.sessions
            .iter_mut()
            .find(|session| session.id == session_id)
            .ok_or(GatewayError::NotFound)
    }

    fn qr_code_taken(&self, qr_code: &str, except: Option<RiddleId>) -> bool {
        self.riddles
            .values()
            .any(|riddle| riddle.active && riddle.qr_code == qr_code && Some(riddle.id) != except)
    }
}

/// Mutex-guarded in-memory tables
#[derive(Debug, Default)]
pub struct MemoryGateway {
    tables: Mutex<Tables>,
    offline: AtomicBool,
}

impl MemoryGateway {
    /// Creates an empty backend
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a backend preloaded with riddles
    ///
    /// Riddles whose id is already taken are ignored.
    pub fn with_riddles(riddles: impl IntoIterator<Item = Riddle>) -> Self {
        let gateway = Self::new();
        if let Ok(mut tables) = gateway.tables.lock() {
            for riddle in riddles {
                tables.riddles.entry(riddle.id).or_insert(riddle);
            }
        }
        gateway
    }

    /// Creates a backend from untyped riddle rows, skipping malformed ones
    pub fn from_riddle_rows(rows: impl IntoIterator<Item = serde_json::Value>) -> Self {
        Self::with_riddles(records::decode_rows::<Riddle>("riddles", rows))
    }

    /// Simulates losing the connection: every call fails while set
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Every telemetry event recorded so far
    pub fn events(&self) -> GatewayResult<Vec<RiddleEvent>> {
        Ok(self.tables()?.events.clone())
    }

    fn tables(&self) -> GatewayResult<MutexGuard<'_, Tables>> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(GatewayError::Unavailable("backend offline".to_owned()));
        }
        self.tables
            .lock()
            .map_err(|_| GatewayError::Unavailable("lock poisoned".to_owned()))
    }
}

impl PersistenceGateway for MemoryGateway {
    fn insert_family(&self, family: NewFamily) -> GatewayResult<Family> {
        let family = Family {
            id: Id::new(),
            name: family.name,
            selected_difficulty: family.selected_difficulty,
            created_at: Utc::now(),
        };
        self.tables()?.families.push(family.clone());
        Ok(family)
    }

    fn find_family(&self, family_id: Id) -> GatewayResult<Option<Family>> {
        Ok(self
            .tables()?
            .families
            .iter()
            .find(|family| family.id == family_id)
            .cloned())
    }

    fn delete_family(&self, family_id: Id) -> GatewayResult<()> {
        let mut tables = self.tables()?;
        let before = tables.families.len();
        tables.families.retain(|family| family.id != family_id);
        if tables.families.len() == before {
            return Err(GatewayError::NotFound);
        }
        tables.progress.retain(|record| record.family_id != family_id);
        Ok(())
    }

    fn list_families(&self) -> GatewayResult<Vec<Family>> {
        Ok(self.tables()?.families.clone())
    }

    fn find_progress(
        &self,
        family_id: Id,
        riddle_id: RiddleId,
    ) -> GatewayResult<Option<ProgressRecord>> {
        Ok(self
            .tables()?
            .progress
            .iter()
            .find(|record| record.family_id == family_id && record.riddle_id == riddle_id)
            .cloned())
    }

    fn insert_progress(&self, record: ProgressRecord) -> GatewayResult<ProgressRecord> {
        let mut tables = self.tables()?;
        if !tables.families.iter().any(|family| family.id == record.family_id) {
            return Err(GatewayError::NotFound);
        }
        if tables
            .progress
            .iter()
            .any(|row| row.family_id == record.family_id && row.riddle_id == record.riddle_id)
        {
            return Err(GatewayError::Conflict(format!(
                "family_progress({}, {})",
                record.family_id, record.riddle_id
            )));
        }
        tables.progress.push(record.clone());
        Ok(record)
    }

    fn list_family_progress(&self, family_id: Id) -> GatewayResult<Vec<ProgressRecord>> {
        Ok(self
            .tables()?
            .progress
            .iter()
            .filter(|record| record.family_id == family_id)
            .cloned()
            .collect_vec())
    }

    fn list_all_progress(&self) -> GatewayResult<Vec<ProgressRecord>> {
        Ok(self.tables()?.progress.clone())
    }

    fn insert_session(&self, session: AnalyticsSession) -> GatewayResult<AnalyticsSession> {
        self.tables()?.sessions.push(session.clone());
        Ok(session)
    }

    fn update_session_progress(
        &self,
        session_id: Id,
        riddles_completed: u32,
        total_points: u32,
    ) -> GatewayResult<()> {
        let mut tables = self.tables()?;
        let session = tables.session_mut(session_id)?;
        session.riddles_completed = riddles_completed;
        session.total_points = total_points;
        Ok(())
    }

    fn complete_session(&self, session_id: Id, ended_at: DateTime<Utc>) -> GatewayResult<()> {
        let mut tables = self.tables()?;
        let session = tables.session_mut(session_id)?;
        session.ended_at = Some(ended_at);
        session.completion_status = CompletionStatus::Completed;
        Ok(())
    }

    fn list_sessions(&self) -> GatewayResult<Vec<AnalyticsSession>> {
        Ok(self.tables()?.sessions.clone())
    }

    fn insert_event(&self, event: RiddleEvent) -> GatewayResult<()> {
        self.tables()?.events.push(event);
        Ok(())
    }

    fn insert_survey(&self, response: SurveyResponse) -> GatewayResult<()> {
        self.tables()?.surveys.push(response);
        Ok(())
    }

    fn list_surveys(&self) -> GatewayResult<Vec<SurveyResponse>> {
        Ok(self.tables()?.surveys.clone())
    }
}

impl RiddleStore for MemoryGateway {
    fn list_active_riddles(&self) -> GatewayResult<Vec<Riddle>> {
        Ok(self
            .tables()?
            .riddles
            .values()
            .filter(|riddle| riddle.active)
            .cloned()
            .collect_vec())
    }

    fn list_riddles(&self) -> GatewayResult<Vec<Riddle>> {
        Ok(self.tables()?.riddles.values().cloned().collect_vec())
    }

    fn insert_riddle(&self, draft: RiddleDraft) -> GatewayResult<Riddle> {
        let mut tables = self.tables()?;
        if draft.active && tables.qr_code_taken(&draft.qr_code, None) {
            return Err(GatewayError::Conflict(format!("riddles.qr_code({})", draft.qr_code)));
        }
        let next_id = tables
            .riddles
            .keys()
            .next_back()
            .map_or(RiddleId(1), |last| RiddleId(last.0 + 1));
        let riddle = draft.into_riddle(next_id);
        tables.riddles.insert(next_id, riddle.clone());
        Ok(riddle)
    }

    fn update_riddle(&self, riddle_id: RiddleId, draft: RiddleDraft) -> GatewayResult<Riddle> {
        let mut tables = self.tables()?;
        if !tables.riddles.contains_key(&riddle_id) {
            return Err(GatewayError::NotFound);
        }
        if draft.active && tables.qr_code_taken(&draft.qr_code, Some(riddle_id)) {
            return Err(GatewayError::Conflict(format!("riddles.qr_code({})", draft.qr_code)));
        }
        let riddle = draft.into_riddle(riddle_id);
        tables.riddles.insert(riddle_id, riddle.clone());
        Ok(riddle)
    }

    fn delete_riddle(&self, riddle_id: RiddleId) -> GatewayResult<()> {
        self.tables()?
            .riddles
            .remove(&riddle_id)
            .map(|_| ())
            .ok_or(GatewayError::NotFound)
    }
}
