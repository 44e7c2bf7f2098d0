//! Post-adventure visitor survey
//!
//! Families that reach the final screen are offered a short survey. The
//! surrounding web application exposes [`post_survey`] as
//! `POST /api/survey`; it validates the body, stores the response through
//! the persistence gateway and maps the outcome onto an HTTP status.

use chrono::{DateTime, Utc};
use garde::Validate;
use serde::{Deserialize, Serialize};
use serde_json::json;
use serde_with::skip_serializing_none;

use crate::{constants::survey as limits, gateway::PersistenceGateway, id::Id};

/// Fields that must be present and non-null in every submission
const REQUIRED_FIELDS: [&str; 5] = [
    "session_id",
    "nps_score",
    "enjoyment_level",
    "learning_value",
    "difficulty_rating",
];

/// Parts of the adventure a family can say they enjoyed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FavoriteAspect {
    /// Solving the animal riddles
    Riddles,
    /// Learning facts
    Learning,
    /// Scanning QR codes
    Scanning,
    /// Building the digital zoo collection
    Collection,
    /// Points and badges
    Points,
    /// Walking around the zoo
    Exploration,
}

/// Age bracket of the youngest explorer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AgeGroup {
    /// Up to four years old
    #[serde(rename = "0-4")]
    Toddler,
    /// Five to eight
    #[serde(rename = "5-8")]
    Young,
    /// Nine to twelve
    #[serde(rename = "9-12")]
    Older,
    /// Thirteen and up
    #[serde(rename = "13+")]
    Teen,
}

/// Body of `POST /api/survey`
#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct SurveySubmission {
    /// Analytics session the answers belong to
    #[garde(skip)]
    pub session_id: Id,
    /// How likely the family is to recommend the game
    #[garde(range(min = limits::MIN_NPS, max = limits::MAX_NPS))]
    pub nps_score: i64,
    /// How much fun it was
    #[garde(range(min = limits::MIN_RATING, max = limits::MAX_RATING))]
    pub enjoyment_level: i64,
    /// How much the family learned
    #[garde(range(min = limits::MIN_RATING, max = limits::MAX_RATING))]
    pub learning_value: i64,
    /// How hard the riddles felt
    #[garde(range(min = limits::MIN_RATING, max = limits::MAX_RATING))]
    pub difficulty_rating: i64,
    /// What the family liked most
    #[serde(default)]
    #[garde(length(max = limits::MAX_FAVORITE_ASPECTS))]
    pub favorite_aspects: Vec<FavoriteAspect>,
    /// Free-text suggestions
    #[serde(default)]
    #[garde(length(max = limits::MAX_IMPROVEMENTS_LENGTH))]
    pub improvements: Option<String>,
    /// Whether they would recommend it to friends
    #[serde(default)]
    #[garde(skip)]
    pub would_recommend: Option<bool>,
    /// Age of the youngest explorer
    #[serde(default)]
    #[garde(skip)]
    pub age_group: Option<AgeGroup>,
    /// When the survey was filled in
    #[serde(default)]
    #[garde(skip)]
    pub completed_at: Option<DateTime<Utc>>,
}

/// A stored survey response
#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SurveyResponse {
    /// Row identifier
    pub id: Id,
    /// Analytics session the answers belong to
    pub session_id: Id,
    /// 0-10 recommendation score
    pub nps_score: i64,
    /// 1-5 enjoyment
    pub enjoyment_level: i64,
    /// 1-5 learning value
    pub learning_value: i64,
    /// 1-5 perceived difficulty
    pub difficulty_rating: i64,
    /// Favorite parts
    pub favorite_aspects: Vec<FavoriteAspect>,
    /// Free-text suggestions
    pub improvements: Option<String>,
    /// Would recommend
    pub would_recommend: Option<bool>,
    /// Age bracket
    pub age_group: Option<AgeGroup>,
    /// When the survey was filled in
    pub completed_at: DateTime<Utc>,
}

impl From<SurveySubmission> for SurveyResponse {
    fn from(submission: SurveySubmission) -> Self {
        Self {
            id: Id::new(),
            session_id: submission.session_id,
            nps_score: submission.nps_score,
            enjoyment_level: submission.enjoyment_level,
            learning_value: submission.learning_value,
            difficulty_rating: submission.difficulty_rating,
            favorite_aspects: submission.favorite_aspects,
            improvements: submission
                .improvements
                .map(|text| text.trim().to_owned())
                .filter(|text| !text.is_empty()),
            would_recommend: submission.would_recommend,
            age_group: submission.age_group,
            completed_at: submission.completed_at.unwrap_or_else(Utc::now),
        }
    }
}

/// Status code and JSON body produced by an endpoint
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    /// HTTP status code
    pub status: u16,
    /// JSON body
    pub body: serde_json::Value,
}

impl ApiResponse {
    fn new(status: u16, body: serde_json::Value) -> Self {
        Self { status, body }
    }

    fn bad_request(message: &str) -> Self {
        Self::new(400, json!({ "error": message }))
    }

    fn internal_error(message: &str) -> Self {
        Self::new(500, json!({ "error": message }))
    }

    /// Whether the status is in the 2xx range
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Message shown for the first out-of-range field, checked in form order
fn range_message(report: &garde::Report) -> &'static str {
    const MESSAGES: [(&str, &str); 4] = [
        ("nps_score", "NPS score must be between 0 and 10"),
        ("enjoyment_level", "Enjoyment level must be between 1 and 5"),
        ("learning_value", "Learning value must be between 1 and 5"),
        ("difficulty_rating", "Difficulty rating must be between 1 and 5"),
    ];

    let failed = report
        .iter()
        .map(|(path, _)| path.to_string())
        .collect::<Vec<_>>();

    MESSAGES
        .iter()
        .find(|(field, _)| failed.iter().any(|path| path.starts_with(field)))
        .map_or("Invalid survey response", |(_, message)| message)
}

/// Handles `POST /api/survey`
///
/// Returns 400 when a required field is missing or a score is out of range,
/// 500 when the body cannot be read or the response cannot be stored, and
/// 200 once the response is saved.
pub fn post_survey<G: PersistenceGateway>(gateway: &G, body: &str) -> ApiResponse {
    let value: serde_json::Value = match serde_json::from_str(body) {
        Ok(value) => value,
        Err(e) => {
            log::error!("Unreadable survey body: {e}");
            return ApiResponse::internal_error("Internal server error");
        }
    };

    let missing = REQUIRED_FIELDS
        .iter()
        .filter(|field| value.get(**field).is_none_or(serde_json::Value::is_null))
        .collect::<Vec<_>>();
    if !missing.is_empty() {
        return ApiResponse::new(
            400,
            json!({ "error": "Missing required fields", "missing": missing }),
        );
    }

    let submission: SurveySubmission = match serde_json::from_value(value) {
        Ok(submission) => submission,
        Err(e) => {
            log::debug!("Rejected survey body: {e}");
            return ApiResponse::bad_request("Invalid survey response");
        }
    };

    if let Err(report) = submission.validate() {
        return ApiResponse::bad_request(range_message(&report));
    }

    let session_id = submission.session_id;
    match gateway.insert_survey(submission.into()) {
        Ok(()) => {
            log::info!("Stored survey response for session {session_id}");
            ApiResponse::new(
                200,
                json!({
                    "success": true,
                    "message": "Survey response submitted successfully",
                }),
            )
        }
        Err(e) => {
            log::error!("Failed to store survey response for session {session_id}: {e}");
            ApiResponse::internal_error("Failed to submit survey response")
        }
    }
}
