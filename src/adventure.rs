//! Adventure session controller
//!
//! An [`Adventure`] owns one family's play-through on one device: which
//! riddle they are on, what they have found, how many points they hold and
//! which screen they should see. Durable rows live behind the
//! [`PersistenceGateway`]; the controller only credits points locally once
//! the matching progress row is known to exist, so local state may lag the
//! backend but never leads it. Telemetry (events, session totals) is best
//! effort and never blocks play.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use web_time::SystemTime;

use crate::{
    config::Options,
    gateway::{GatewayError, PersistenceGateway, RiddleStore},
    id::{Id, RiddleId},
    names,
    records::{AnalyticsSession, EventType, Family, NewFamily, ProgressRecord, RiddleEvent},
    riddle::{DifficultyFilter, Riddle},
    sequence::RiddleSequence,
    session::{SessionRepository, StoredSession},
};

/// Screen the family is currently looking at
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum State {
    /// Welcome screen, no adventure running
    NotStarted,
    /// Reading the current riddle and looking for the exhibit
    InRiddle,
    /// Overlay shown after scanning another exhibit's code
    WrongCode {
        /// Payload that was scanned
        scanned: String,
    },
    /// Celebration after solving a riddle that is not the last one
    Success,
    /// Every riddle in the sequence has been found
    LimitReached,
}

/// Timed events the host delivers back through [`Adventure::receive_alarm`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AlarmMessage {
    /// Offer the feedback survey
    ShowSurvey {
        /// Prompt the alarm was scheduled for; stale prompts are ignored
        generation: u64,
    },
}

/// Result of a scan attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ScanOutcome {
    /// The scan matched the current riddle
    Solved {
        /// Points newly credited to the family, zero when already credited
        points_awarded: u32,
        /// Whether this solve finished the sequence
        completed: bool,
    },
    /// The riddle had already been solved and nothing changed
    AlreadySolved,
    /// The scan belongs to another exhibit
    WrongExhibit {
        /// Payload that was scanned
        scanned: String,
    },
}

impl ScanOutcome {
    /// Line shown to the family for a wrong exhibit
    pub fn user_message(&self) -> Option<String> {
        match self {
            Self::WrongExhibit { scanned } => {
                Some(format!("That's not the right animal! You scanned: {scanned}"))
            }
            _ => None,
        }
    }
}

/// What [`Adventure::resume_session`] found on the device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResumeOutcome {
    /// Nothing stored; the welcome screen stays
    Fresh,
    /// The stored family no longer exists and the local keys were removed
    Cleared,
    /// The adventure was rebuilt from durable rows
    Restored,
}

/// An animal in the family's digital zoo
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Discovery {
    /// Riddle that was solved
    pub riddle_id: RiddleId,
    /// Points credited for it
    pub points: u32,
    /// When the solve was recorded
    pub discovered_at: DateTime<Utc>,
    /// Riddle content, absent when the riddle is no longer active
    pub riddle: Option<Riddle>,
}

/// Errors surfaced to the family
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The family name was rejected
    #[error("invalid family name: {0}")]
    InvalidName(#[from] names::Error),
    /// No active riddle matches the selected difficulty
    #[error("no riddles match the selected difficulty")]
    NoRiddles,
    /// The operation does not apply to the current screen
    #[error("operation not allowed in the current state")]
    InvalidState,
    /// A gameplay-critical read or write failed
    #[error("storage failure: {0}")]
    Storage(#[from] GatewayError),
}

impl Error {
    /// One-line, non-technical message suitable for players
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::InvalidName(names::Error::Empty) => "Please enter your family name.",
            Self::InvalidName(names::Error::TooLong) => "Please choose a shorter family name.",
            Self::InvalidName(names::Error::Sinful) => "Please choose a different family name.",
            Self::NoRiddles => "There are no riddles for this level yet. Please pick another one.",
            Self::InvalidState => "That isn't possible right now.",
            Self::Storage(_) => "We couldn't reach the zoo. Please check your connection and try again.",
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct SurveyPrompt {
    generation: u64,
    pending: bool,
    visible: bool,
}

impl SurveyPrompt {
    /// Drops any scheduled or visible prompt
    fn cancel(&mut self) {
        self.generation += 1;
        self.pending = false;
        self.visible = false;
    }
}

/// One family's play-through on this device
#[derive(Debug)]
pub struct Adventure<R> {
    options: Options,
    repository: R,
    rng: fastrand::Rng,

    state: State,
    family: Option<Family>,
    difficulty: DifficultyFilter,
    session_id: Option<Id>,
    sequence: RiddleSequence,
    current_index: usize,
    hint_shown: bool,
    discovered: Vec<Discovery>,
    current_points: u32,
    riddle_started_at: Option<SystemTime>,
    survey: SurveyPrompt,
}

impl<R: SessionRepository> Adventure<R> {
    /// Creates a controller on the welcome screen
    ///
    /// # Arguments
    ///
    /// * `options` - Venue options (zone order, survey delay)
    /// * `repository` - Durable client-side store used for resuming
    /// * `rng` - Source of sequence seeds
    pub fn new(options: Options, repository: R, rng: fastrand::Rng) -> Self {
        Self {
            options,
            repository,
            rng,
            state: State::NotStarted,
            family: None,
            difficulty: DifficultyFilter::All,
            session_id: None,
            sequence: RiddleSequence::default(),
            current_index: 0,
            hint_shown: false,
            discovered: Vec::new(),
            current_points: 0,
            riddle_started_at: None,
            survey: SurveyPrompt::default(),
        }
    }

    /// Current screen
    pub fn state(&self) -> &State {
        &self.state
    }

    /// Family playing, once the adventure has started
    pub fn family(&self) -> Option<&Family> {
        self.family.as_ref()
    }

    /// Selected difficulty
    pub fn difficulty(&self) -> DifficultyFilter {
        self.difficulty
    }

    /// Analytics session, absent when its creation failed
    pub fn session_id(&self) -> Option<Id> {
        self.session_id
    }

    /// Riddles in play order
    pub fn sequence(&self) -> &RiddleSequence {
        &self.sequence
    }

    /// Position in the sequence
    pub fn current_index(&self) -> usize {
        self.current_index
    }

    /// Riddle the family is working on
    pub fn current_riddle(&self) -> Option<&Riddle> {
        match self.state {
            State::NotStarted => None,
            _ => self.sequence.get(self.current_index),
        }
    }

    /// The hint, once revealed
    pub fn hint(&self) -> Option<&str> {
        if self.hint_shown {
            self.current_riddle().map(|riddle| riddle.hint.as_str())
        } else {
            None
        }
    }

    /// Points credited so far
    pub fn current_points(&self) -> u32 {
        self.current_points
    }

    /// Animals found so far, in the order they were credited
    pub fn discovered(&self) -> &[Discovery] {
        &self.discovered
    }

    /// Whether the feedback survey should be on screen
    pub fn survey_visible(&self) -> bool {
        self.survey.visible
    }

    /// Client-side store backing this controller
    pub fn repository(&self) -> &R {
        &self.repository
    }

    fn family_id(&self) -> Option<Id> {
        self.family.as_ref().map(|family| family.id)
    }

    fn discovered_in_sequence(&self) -> usize {
        self.discovered
            .iter()
            .filter(|discovery| self.sequence.contains(discovery.riddle_id))
            .count()
    }

    fn stored_session(&self) -> Option<StoredSession> {
        let family = self.family.as_ref()?;
        Some(StoredSession {
            family_id: family.id,
            family_name: family.name.clone(),
            difficulty: self.difficulty,
            current_index: self.current_index,
            session_id: self.session_id,
            sequence_seed: Some(self.sequence.seed()),
        })
    }

    fn persist_locally(&mut self) {
        if let Some(stored) = self.stored_session() {
            self.repository.save(&stored);
        }
    }

    fn emit<G: PersistenceGateway>(
        &self,
        gateway: &G,
        riddle_id: RiddleId,
        event_type: EventType,
        time_spent_seconds: Option<u64>,
    ) {
        let Some(session_id) = self.session_id else {
            return;
        };
        let event = RiddleEvent {
            time_spent_seconds,
            ..RiddleEvent::now(session_id, riddle_id, event_type)
        };
        if let Err(e) = gateway.insert_event(event) {
            log::warn!("Dropping {event_type:?} event for riddle {riddle_id}: {e}");
        }
    }

    fn present_riddle<G: PersistenceGateway>(&mut self, gateway: &G) {
        self.state = State::InRiddle;
        self.hint_shown = false;
        self.riddle_started_at = Some(SystemTime::now());
        if let Some(riddle_id) = self.current_riddle().map(|riddle| riddle.id) {
            self.emit(gateway, riddle_id, EventType::Viewed, None);
        }
    }

    /// Starts a new adventure for a family
    ///
    /// The family row is written before anything is stored on the device,
    /// so a failed start never leaves local keys pointing at nothing.
    ///
    /// # Errors
    ///
    /// * `Error::InvalidState` - An adventure is already running
    /// * `Error::InvalidName` - The family name was rejected
    /// * `Error::NoRiddles` - No active riddle matches `difficulty`
    /// * `Error::Storage` - Riddles could not be read or the family could not be created
    pub fn start_adventure<S: RiddleStore, G: PersistenceGateway>(
        &mut self,
        family_name: &str,
        difficulty: DifficultyFilter,
        riddle_store: &S,
        gateway: &G,
    ) -> Result<(), Error> {
        if self.state != State::NotStarted {
            return Err(Error::InvalidState);
        }
        let name = names::validate_family_name(family_name)?;

        let riddles = riddle_store.list_active_riddles().inspect_err(|e| {
            log::error!("Could not load riddles: {e}");
        })?;
        let sequence = RiddleSequence::build(
            &riddles,
            difficulty,
            self.options.canonical_zones(),
            self.rng.u64(..),
        );
        if sequence.is_empty() {
            return Err(Error::NoRiddles);
        }

        let family = gateway
            .insert_family(NewFamily {
                name,
                selected_difficulty: difficulty,
            })
            .inspect_err(|e| log::error!("Could not create family: {e}"))?;

        let session_id = match gateway.insert_session(AnalyticsSession::start(family.id, difficulty)) {
            Ok(session) => Some(session.id),
            Err(e) => {
                log::warn!("Starting family {} without an analytics session: {e}", family.id);
                None
            }
        };

        log::info!(
            "Family {} started a {difficulty} adventure with {} riddles",
            family.id,
            sequence.len()
        );

        self.family = Some(family);
        self.difficulty = difficulty;
        self.session_id = session_id;
        self.sequence = sequence;
        self.current_index = 0;
        self.discovered.clear();
        self.current_points = 0;
        self.survey.cancel();

        self.persist_locally();
        self.present_riddle(gateway);
        Ok(())
    }

    /// Reveals the hint for the current riddle
    ///
    /// Only the first reveal of each riddle is reported.
    ///
    /// # Errors
    ///
    /// `Error::InvalidState` unless a riddle is on screen.
    pub fn request_hint<G: PersistenceGateway>(&mut self, gateway: &G) -> Result<&str, Error> {
        if self.state != State::InRiddle {
            return Err(Error::InvalidState);
        }
        let riddle_id = self.current_riddle().ok_or(Error::InvalidState)?.id;
        if !self.hint_shown {
            self.hint_shown = true;
            self.emit(gateway, riddle_id, EventType::HintUsed, None);
        }
        self.hint().ok_or(Error::InvalidState)
    }

    /// Handles a decoded QR payload
    ///
    /// # Errors
    ///
    /// * `Error::InvalidState` - No riddle is waiting for a scan
    /// * `Error::Storage` - The solve could not be recorded; nothing changed
    pub fn submit_scan<G: PersistenceGateway, F: FnMut(AlarmMessage, web_time::Duration)>(
        &mut self,
        payload: &str,
        gateway: &G,
        schedule_message: F,
    ) -> Result<ScanOutcome, Error> {
        let riddle = self.current_riddle().cloned().ok_or(Error::InvalidState)?;
        match self.state {
            State::InRiddle | State::WrongCode { .. } => {
                if riddle.is_answered_by(payload) {
                    self.record_solve(&riddle, gateway, schedule_message)
                } else {
                    log::debug!("Wrong exhibit scanned for riddle {}", riddle.id);
                    self.emit(gateway, riddle.id, EventType::WrongScan, None);
                    self.state = State::WrongCode {
                        scanned: payload.to_owned(),
                    };
                    Ok(ScanOutcome::WrongExhibit {
                        scanned: payload.to_owned(),
                    })
                }
            }
            State::Success | State::LimitReached if riddle.is_answered_by(payload) => {
                Ok(ScanOutcome::AlreadySolved)
            }
            _ => Err(Error::InvalidState),
        }
    }

    /// Records that the family solved the current riddle
    ///
    /// Safe to call more than once for the same riddle: the backend holds at
    /// most one progress row per family and riddle, and points are credited
    /// locally once.
    ///
    /// # Errors
    ///
    /// * `Error::InvalidState` - `riddle` is not the current riddle
    /// * `Error::Storage` - The progress row could not be checked or written;
    ///   no points were credited
    pub fn record_solve<G: PersistenceGateway, F: FnMut(AlarmMessage, web_time::Duration)>(
        &mut self,
        riddle: &Riddle,
        gateway: &G,
        schedule_message: F,
    ) -> Result<ScanOutcome, Error> {
        let family_id = self.family_id().ok_or(Error::InvalidState)?;
        if self.current_riddle().map(|current| current.id) != Some(riddle.id) {
            return Err(Error::InvalidState);
        }

        let existing = gateway
            .find_progress(family_id, riddle.id)
            .inspect_err(|e| log::error!("Could not check progress for riddle {}: {e}", riddle.id))?;
        if existing.is_some() {
            log::debug!("Riddle {} already recorded for family {family_id}", riddle.id);
        } else {
            match gateway.insert_progress(ProgressRecord::new(family_id, riddle.id, riddle.points)) {
                Ok(_) => {}
                Err(e) if e.is_conflict() => {
                    log::debug!("Riddle {} recorded concurrently: {e}", riddle.id);
                }
                Err(e) => {
                    log::error!("Could not record riddle {}: {e}", riddle.id);
                    return Err(Error::Storage(e));
                }
            }
        }

        let credited = self.credit(riddle);
        if !credited && matches!(self.state, State::Success | State::LimitReached) {
            return Ok(ScanOutcome::AlreadySolved);
        }

        // a riddle credited before a resume was already reported
        if credited {
            self.push_session_progress(gateway);

            let time_spent = self
                .riddle_started_at
                .and_then(|started| started.elapsed().ok())
                .map(|elapsed| elapsed.as_secs());
            self.emit(gateway, riddle.id, EventType::CorrectScan, time_spent);
        }

        let completed = self.discovered_in_sequence() >= self.sequence.len();
        if completed {
            self.finish(gateway, schedule_message);
        } else {
            self.state = State::Success;
        }

        Ok(ScanOutcome::Solved {
            points_awarded: if credited { riddle.points } else { 0 },
            completed,
        })
    }

    fn credit(&mut self, riddle: &Riddle) -> bool {
        if self
            .discovered
            .iter()
            .any(|discovery| discovery.riddle_id == riddle.id)
        {
            return false;
        }
        self.discovered.push(Discovery {
            riddle_id: riddle.id,
            points: riddle.points,
            discovered_at: Utc::now(),
            riddle: Some(riddle.clone()),
        });
        self.current_points = self.current_points.saturating_add(riddle.points);
        true
    }

    fn push_session_progress<G: PersistenceGateway>(&self, gateway: &G) {
        let Some(session_id) = self.session_id else {
            return;
        };
        let riddles_completed = u32::try_from(self.discovered_in_sequence()).unwrap_or(u32::MAX);
        if let Err(e) =
            gateway.update_session_progress(session_id, riddles_completed, self.current_points)
        {
            log::warn!("Could not update session {session_id}: {e}");
        }
    }

    fn finish<G: PersistenceGateway, F: FnMut(AlarmMessage, web_time::Duration)>(
        &mut self,
        gateway: &G,
        mut schedule_message: F,
    ) {
        if let Some(session_id) = self.session_id {
            if let Err(e) = gateway.complete_session(session_id, Utc::now()) {
                log::warn!("Could not complete session {session_id}: {e}");
            }
        }
        if let Some(family) = &self.family {
            log::info!(
                "Family {} finished with {} points",
                family.id,
                self.current_points
            );
        }
        self.state = State::LimitReached;

        self.survey.cancel();
        self.survey.pending = true;
        schedule_message(
            AlarmMessage::ShowSurvey {
                generation: self.survey.generation,
            },
            self.options.survey_delay(),
        );
    }

    /// Closes the wrong exhibit overlay
    ///
    /// # Errors
    ///
    /// `Error::InvalidState` unless the overlay is shown.
    pub fn dismiss_wrong_code(&mut self) -> Result<(), Error> {
        match self.state {
            State::WrongCode { .. } => {
                self.state = State::InRiddle;
                Ok(())
            }
            _ => Err(Error::InvalidState),
        }
    }

    /// Moves from the celebration screen to the next riddle
    ///
    /// On the last riddle this goes straight to the final screen instead.
    ///
    /// # Errors
    ///
    /// `Error::InvalidState` unless the celebration screen is shown.
    pub fn advance_to_next_riddle<G: PersistenceGateway>(&mut self, gateway: &G) -> Result<(), Error> {
        if self.state != State::Success {
            return Err(Error::InvalidState);
        }
        if self.sequence.is_last(self.current_index) {
            self.state = State::LimitReached;
            return Ok(());
        }
        self.current_index += 1;
        self.persist_locally();
        self.present_riddle(gateway);
        Ok(())
    }

    /// Picks an adventure back up after a reload
    ///
    /// Points and discoveries are rebuilt from the family's progress rows,
    /// never from anything cached on the device. The riddle order is rebuilt
    /// from the stored seed.
    ///
    /// # Errors
    ///
    /// * `Error::InvalidState` - An adventure is already running
    /// * `Error::NoRiddles` - No active riddle matches the stored difficulty
    /// * `Error::Storage` - The backend could not be read; local keys are kept
    pub fn resume_session<S: RiddleStore, G: PersistenceGateway>(
        &mut self,
        riddle_store: &S,
        gateway: &G,
    ) -> Result<ResumeOutcome, Error> {
        if self.state != State::NotStarted {
            return Err(Error::InvalidState);
        }
        let Some(stored) = self.repository.load() else {
            return Ok(ResumeOutcome::Fresh);
        };

        let Some(family) = gateway
            .find_family(stored.family_id)
            .inspect_err(|e| log::error!("Could not look up family {}: {e}", stored.family_id))?
        else {
            log::info!("Family {} no longer exists, clearing device", stored.family_id);
            self.repository.clear();
            return Ok(ResumeOutcome::Cleared);
        };

        let progress = gateway.list_family_progress(family.id)?;
        let riddles = riddle_store.list_active_riddles()?;

        let seed = stored.sequence_seed.unwrap_or_else(|| self.rng.u64(..));
        let sequence = RiddleSequence::build(
            &riddles,
            stored.difficulty,
            self.options.canonical_zones(),
            seed,
        );
        if sequence.is_empty() {
            return Err(Error::NoRiddles);
        }

        self.discovered = progress
            .into_iter()
            .map(|record| Discovery {
                riddle_id: record.riddle_id,
                points: record.points_earned,
                discovered_at: record.completed_at,
                riddle: riddles
                    .iter()
                    .find(|riddle| riddle.id == record.riddle_id)
                    .cloned(),
            })
            .collect();
        self.current_points = self
            .discovered
            .iter()
            .fold(0, |total: u32, discovery| total.saturating_add(discovery.points));

        self.family = Some(family);
        self.difficulty = stored.difficulty;
        self.session_id = stored.session_id;
        self.current_index = stored.current_index.min(sequence.len() - 1);
        self.sequence = sequence;
        self.survey.cancel();

        log::info!(
            "Resumed family {} at riddle {} with {} points",
            stored.family_id,
            self.current_index,
            self.current_points
        );

        self.persist_locally();
        if self.discovered_in_sequence() >= self.sequence.len() {
            self.state = State::LimitReached;
        } else {
            self.present_riddle(gateway);
        }
        Ok(ResumeOutcome::Restored)
    }

    /// Wipes the adventure so the device can be handed to the next family
    ///
    /// Removing the family from the backend is best effort; the device
    /// always returns to the welcome screen.
    pub fn reset_demo<G: PersistenceGateway>(&mut self, gateway: &G) {
        if let Some(family_id) = self.family_id() {
            match gateway.delete_family(family_id) {
                Ok(()) => log::info!("Deleted family {family_id}"),
                Err(e) => log::warn!("Could not delete family {family_id}: {e}"),
            }
        }
        self.repository.clear();

        self.state = State::NotStarted;
        self.family = None;
        self.difficulty = DifficultyFilter::All;
        self.session_id = None;
        self.sequence = RiddleSequence::default();
        self.current_index = 0;
        self.hint_shown = false;
        self.discovered.clear();
        self.current_points = 0;
        self.riddle_started_at = None;
        self.survey.cancel();
    }

    /// Handles an alarm scheduled by this controller
    ///
    /// Returns whether the alarm changed what is on screen.
    pub fn receive_alarm(&mut self, message: AlarmMessage) -> bool {
        match message {
            AlarmMessage::ShowSurvey { generation } => {
                if self.survey.pending
                    && self.survey.generation == generation
                    && self.state == State::LimitReached
                {
                    self.survey.pending = false;
                    self.survey.visible = true;
                    true
                } else {
                    false
                }
            }
        }
    }

    /// Hides the survey, or keeps it from appearing if it is still scheduled
    pub fn dismiss_survey(&mut self) {
        self.survey.cancel();
    }
}
