//! Riddle content and difficulty levels
//!
//! Riddles are staff-authored, immutable from the player's point of view,
//! and each one is tied to a single exhibit through the payload encoded in
//! that exhibit's QR code.

use std::{fmt::Display, str::FromStr};

use garde::Validate;
use serde::{Deserialize, Serialize};
use serde_with::{DefaultOnNull, DeserializeFromStr, SerializeDisplay, serde_as, skip_serializing_none};
use thiserror::Error;

use crate::{constants::riddle as limits, id::RiddleId};

/// How hard a riddle is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    /// Suitable for the youngest visitors
    Easy,
    /// Needs a little zoo knowledge
    Medium,
    /// For experts
    Hard,
}

/// The difficulty a family picks on the welcome screen
///
/// `All` plays every active riddle regardless of its difficulty.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, DeserializeFromStr, SerializeDisplay)]
pub enum DifficultyFilter {
    /// No filter
    #[default]
    All,
    /// Only riddles of the given difficulty
    Only(Difficulty),
}

/// Returned when a difficulty string is not one of `all`, `easy`, `medium`, `hard`
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown difficulty {0:?}")]
pub struct ParseDifficultyError(String);

impl DifficultyFilter {
    /// Whether a riddle of the given difficulty is playable under this filter
    pub fn matches(self, difficulty: Difficulty) -> bool {
        match self {
            Self::All => true,
            Self::Only(wanted) => wanted == difficulty,
        }
    }
}

impl Display for DifficultyFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::All => "all",
            Self::Only(Difficulty::Easy) => "easy",
            Self::Only(Difficulty::Medium) => "medium",
            Self::Only(Difficulty::Hard) => "hard",
        })
    }
}

impl FromStr for DifficultyFilter {
    type Err = ParseDifficultyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "all" => Ok(Self::All),
            "easy" => Ok(Self::Only(Difficulty::Easy)),
            "medium" => Ok(Self::Only(Difficulty::Medium)),
            "hard" => Ok(Self::Only(Difficulty::Hard)),
            other => Err(ParseDifficultyError(other.to_owned())),
        }
    }
}

impl From<Difficulty> for DifficultyFilter {
    fn from(difficulty: Difficulty) -> Self {
        Self::Only(difficulty)
    }
}

/// A playable riddle as stored in the riddle table
#[serde_as]
#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct Riddle {
    /// Stable identifier
    #[garde(skip)]
    pub id: RiddleId,
    /// The animal the riddle is about
    #[garde(length(min = 1, max = limits::MAX_ANIMAL_LENGTH))]
    pub animal: String,
    /// The riddle itself
    #[serde(rename = "riddle")]
    #[garde(length(min = 1, max = limits::MAX_TEXT_LENGTH))]
    pub riddle_text: String,
    /// Hint revealed on request
    #[garde(length(max = limits::MAX_HINT_LENGTH))]
    pub hint: String,
    /// Fun fact shown after the animal is found
    #[garde(length(max = limits::MAX_FACT_LENGTH))]
    pub fact: String,
    /// Difficulty level
    #[garde(skip)]
    pub difficulty: Difficulty,
    /// Points awarded for solving
    #[garde(range(min = limits::MIN_POINTS, max = limits::MAX_POINTS))]
    pub points: u32,
    /// Payload the exhibit QR code decodes to
    #[garde(length(min = 1, max = limits::MAX_QR_CODE_LENGTH))]
    pub qr_code: String,
    /// Venue area used to order riddles into a walkable path
    #[serde(default)]
    #[garde(length(min = 1, max = limits::MAX_ZONE_LENGTH))]
    pub zone: Option<String>,
    /// Display glyph, empty when the row has none
    #[serde(default)]
    #[serde_as(as = "DefaultOnNull")]
    #[garde(length(max = limits::MAX_ICON_LENGTH))]
    pub icon: String,
    /// Only active riddles are playable
    #[serde(default = "default_active")]
    #[garde(skip)]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

/// Staff-editable riddle content, without the store-assigned identifier
#[serde_as]
#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct RiddleDraft {
    /// The animal the riddle is about
    #[garde(length(min = 1, max = limits::MAX_ANIMAL_LENGTH))]
    pub animal: String,
    /// The riddle itself
    #[serde(rename = "riddle")]
    #[garde(length(min = 1, max = limits::MAX_TEXT_LENGTH))]
    pub riddle_text: String,
    /// Hint revealed on request
    #[garde(length(min = 1, max = limits::MAX_HINT_LENGTH))]
    pub hint: String,
    /// Fun fact shown after the animal is found
    #[garde(length(min = 1, max = limits::MAX_FACT_LENGTH))]
    pub fact: String,
    /// Difficulty level
    #[garde(skip)]
    pub difficulty: Difficulty,
    /// Points awarded for solving
    #[serde(default = "default_points")]
    #[garde(range(min = limits::MIN_POINTS, max = limits::MAX_POINTS))]
    pub points: u32,
    /// Payload the exhibit QR code decodes to
    #[garde(length(min = 1, max = limits::MAX_QR_CODE_LENGTH))]
    pub qr_code: String,
    /// Venue area
    #[serde(default)]
    #[garde(length(min = 1, max = limits::MAX_ZONE_LENGTH))]
    pub zone: Option<String>,
    /// Display glyph, empty when the row has none
    #[serde(default)]
    #[serde_as(as = "DefaultOnNull")]
    #[garde(length(max = limits::MAX_ICON_LENGTH))]
    pub icon: String,
    /// Whether the riddle is playable
    #[serde(default = "default_active")]
    #[garde(skip)]
    pub active: bool,
}

fn default_points() -> u32 {
    limits::DEFAULT_POINTS
}

impl RiddleDraft {
    /// Trims surrounding whitespace from every text field
    ///
    /// A zone that is blank after trimming is treated as absent.
    pub fn normalized(mut self) -> Self {
        self.animal = self.animal.trim().to_owned();
        self.riddle_text = self.riddle_text.trim().to_owned();
        self.hint = self.hint.trim().to_owned();
        self.fact = self.fact.trim().to_owned();
        self.qr_code = self.qr_code.trim().to_owned();
        self.icon = self.icon.trim().to_owned();
        self.zone = self
            .zone
            .map(|zone| zone.trim().to_owned())
            .filter(|zone| !zone.is_empty());
        self
    }

    /// Builds the stored riddle once the store has assigned an identifier
    pub fn into_riddle(self, id: RiddleId) -> Riddle {
        let RiddleDraft {
            animal,
            riddle_text,
            hint,
            fact,
            difficulty,
            points,
            qr_code,
            zone,
            icon,
            active,
        } = self;
        Riddle {
            id,
            animal,
            riddle_text,
            hint,
            fact,
            difficulty,
            points,
            qr_code,
            zone,
            icon,
            active,
        }
    }
}

impl Riddle {
    /// Whether a decoded scan payload is this riddle's exhibit
    ///
    /// Comparison is exact: no trimming and no case folding.
    pub fn is_answered_by(&self, payload: &str) -> bool {
        self.qr_code == payload
    }
}
