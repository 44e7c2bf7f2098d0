//! Configuration constants for the Zoo Safari game
//!
//! This module contains the limits and fixed values used throughout the
//! crate to validate content, bound player input and drive the timing of
//! the post-adventure survey.

/// Family (team) configuration constants
pub mod family {
    /// Maximum length of a family name in bytes, after trimming
    pub const MAX_NAME_LENGTH: usize = 30;
}

/// Riddle content constants
pub mod riddle {
    /// Maximum length of the animal name
    pub const MAX_ANIMAL_LENGTH: usize = 100;
    /// Maximum length of the riddle text
    pub const MAX_TEXT_LENGTH: usize = 1000;
    /// Maximum length of the hint
    pub const MAX_HINT_LENGTH: usize = 500;
    /// Maximum length of the fun fact shown after a solve
    pub const MAX_FACT_LENGTH: usize = 1000;
    /// Maximum length of the expected QR payload
    pub const MAX_QR_CODE_LENGTH: usize = 200;
    /// Maximum length of a zone label
    pub const MAX_ZONE_LENGTH: usize = 100;
    /// Maximum length of the display glyph
    pub const MAX_ICON_LENGTH: usize = 16;
    /// Smallest number of points a riddle may award
    pub const MIN_POINTS: u32 = 1;
    /// Largest number of points a riddle may award
    pub const MAX_POINTS: u32 = 1000;
    /// Points given to a new riddle when staff leave the field untouched
    pub const DEFAULT_POINTS: u32 = 50;
}

/// Zone ordering constants
pub mod zones {
    /// Walking order used when no explicit configuration is supplied
    pub const DEFAULT_ORDER: [&str; 7] = [
        "Africa",
        "Asia",
        "Australia",
        "Americas",
        "Aquarium",
        "Reptile House",
        "Farm",
    ];
}

/// Survey constants
pub mod survey {
    /// Lowest accepted "how likely are you to recommend" answer
    pub const MIN_NPS: i64 = 0;
    /// Highest accepted "how likely are you to recommend" answer
    pub const MAX_NPS: i64 = 10;
    /// Lowest accepted answer on the 1-5 rating questions
    pub const MIN_RATING: i64 = 1;
    /// Highest accepted answer on the 1-5 rating questions
    pub const MAX_RATING: i64 = 5;
    /// NPS answers at or above this value count as promoters
    pub const PROMOTER_THRESHOLD: i64 = 9;
    /// NPS answers at or below this value count as detractors
    pub const DETRACTOR_THRESHOLD: i64 = 6;
    /// Seconds between reaching the final screen and showing the survey
    pub const DEFAULT_DELAY_SECONDS: u64 = 30;
    /// Upper bound on the configurable survey delay in seconds
    pub const MAX_DELAY_SECONDS: u64 = 600;
    /// Maximum length of the free-text improvements answer
    pub const MAX_IMPROVEMENTS_LENGTH: usize = 2000;
    /// Maximum number of favorite aspects a single response may carry
    pub const MAX_FAVORITE_ASPECTS: usize = 16;
}

/// Analytics dashboard constants
pub mod analytics {
    /// Number of animals shown on the top animals chart by default
    pub const DEFAULT_TOP_ANIMALS: usize = 10;
    /// Largest top animals chart that may be configured
    pub const MAX_TOP_ANIMALS: usize = 50;
    /// Icon shown for animals whose riddle carries no glyph
    pub const FALLBACK_ICON: &str = "🐾";
}
