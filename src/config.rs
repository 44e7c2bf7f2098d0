//! Runtime options
//!
//! Venue-specific settings a deployment may override: the zone walking
//! order, how long the final screen stays up before the survey appears,
//! and the size of the top animals chart. Options are read from JSON and
//! validated before use; anything left out takes its default.

use std::collections::HashSet;

use garde::Validate;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use web_time::Duration;

use crate::constants;

/// Errors raised while loading options
#[derive(Error, Debug)]
pub enum Error {
    /// The document is not valid JSON for [`Options`]
    #[error("unreadable options: {0}")]
    Parse(#[from] serde_json::Error),
    /// A value is outside its allowed range
    #[error("invalid options: {0}")]
    Invalid(#[from] garde::Report),
}

/// Validates that every zone label is non-empty and listed once
fn validate_zones(zones: &[String], _ctx: &()) -> garde::Result {
    let mut seen = HashSet::new();
    for zone in zones {
        if zone.trim().is_empty() {
            return Err(garde::Error::new("zone names cannot be blank"));
        }
        if !seen.insert(zone.as_str()) {
            return Err(garde::Error::new(format!("zone {zone:?} is listed twice")));
        }
    }
    Ok(())
}

/// Validates that the survey delay is within bounds
fn validate_survey_delay(delay: &Duration, _ctx: &()) -> garde::Result {
    if delay.as_secs() <= constants::survey::MAX_DELAY_SECONDS {
        Ok(())
    } else {
        Err(garde::Error::new(format!(
            "survey delay is above {} seconds",
            constants::survey::MAX_DELAY_SECONDS
        )))
    }
}

fn default_zones() -> Vec<String> {
    constants::zones::DEFAULT_ORDER
        .iter()
        .map(|zone| (*zone).to_owned())
        .collect()
}

fn default_survey_delay() -> Duration {
    Duration::from_secs(constants::survey::DEFAULT_DELAY_SECONDS)
}

fn default_top_animals_limit() -> usize {
    constants::analytics::DEFAULT_TOP_ANIMALS
}

/// Deployment options for a venue
#[serde_with::serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct Options {
    /// Zones in walking order
    #[serde(default = "default_zones")]
    #[garde(custom(|v: &Vec<String>, ctx| validate_zones(v, ctx)))]
    canonical_zones: Vec<String>,
    /// Delay between reaching the final screen and offering the survey
    #[serde(default = "default_survey_delay")]
    #[serde_as(as = "serde_with::DurationSeconds<u64>")]
    #[garde(custom(validate_survey_delay))]
    survey_delay: Duration,
    /// Number of animals on the top animals chart
    #[serde(default = "default_top_animals_limit")]
    #[garde(range(min = 1, max = constants::analytics::MAX_TOP_ANIMALS))]
    top_animals_limit: usize,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            canonical_zones: default_zones(),
            survey_delay: default_survey_delay(),
            top_animals_limit: default_top_animals_limit(),
        }
    }
}

impl Options {
    /// Parses and validates options from a JSON document
    ///
    /// # Errors
    ///
    /// Returns [`Error::Parse`] for malformed JSON and [`Error::Invalid`]
    /// when a value is out of range.
    pub fn from_json(json: &str) -> Result<Self, Error> {
        let options: Self = serde_json::from_str(json)?;
        options.validate()?;
        Ok(options)
    }

    /// Replaces the zone walking order
    #[must_use]
    pub fn with_canonical_zones(mut self, zones: Vec<String>) -> Self {
        self.canonical_zones = zones;
        self
    }

    /// Replaces the survey delay
    #[must_use]
    pub fn with_survey_delay(mut self, delay: Duration) -> Self {
        self.survey_delay = delay;
        self
    }

    /// Zones in walking order
    pub fn canonical_zones(&self) -> &[String] {
        &self.canonical_zones
    }

    /// Delay before the survey is offered
    pub fn survey_delay(&self) -> Duration {
        self.survey_delay
    }

    /// Size of the top animals chart
    pub fn top_animals_limit(&self) -> usize {
        self.top_animals_limit
    }
}
