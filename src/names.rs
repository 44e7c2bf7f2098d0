//! Family name validation and suggestions
//!
//! Family names show up on staff dashboards and on the family's own
//! screens, so they are trimmed, bounded and run through a profanity
//! filter before anything is written. Families who cannot decide get a
//! playful "Adjective Animals" suggestion.

use heck::ToTitleCase;
use rustrict::CensorStr;
use serde::Serialize;
use thiserror::Error;

use crate::constants::family::MAX_NAME_LENGTH;

/// Errors that can occur while validating a family name
#[derive(Error, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The name is empty or contains only whitespace
    #[error("name cannot be empty")]
    Empty,
    /// The name contains inappropriate content
    #[error("name is inappropriate")]
    Sinful,
    /// The name exceeds the maximum allowed length
    #[error("name is too long")]
    TooLong,
}

/// Cleans and validates a family name
///
/// # Errors
///
/// * `Error::Empty` - Name is empty after trimming whitespace
/// * `Error::TooLong` - Trimmed name exceeds the maximum length
/// * `Error::Sinful` - Name contains inappropriate content
pub fn validate_family_name(name: &str) -> Result<String, Error> {
    let name = rustrict::trim_whitespace(name);
    if name.is_empty() {
        return Err(Error::Empty);
    }
    if name.len() > MAX_NAME_LENGTH {
        return Err(Error::TooLong);
    }
    if name.is_inappropriate() {
        return Err(Error::Sinful);
    }
    Ok(name.to_owned())
}

/// Suggests a random family name such as "Curious Otters"
pub fn suggest_family_name() -> String {
    loop {
        if let Some(name) = petname::petname(2, " ") {
            let name = pluralizer::pluralize(&name, 2, false).to_title_case();
            if validate_family_name(&name).is_ok() {
                return name;
            }
        }
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn test_valid_name_is_trimmed() {
        assert_eq!(validate_family_name("  The Smiths \n"), Ok("The Smiths".to_owned()));
    }

    #[test]
    fn test_empty_name() {
        assert_eq!(validate_family_name(""), Err(Error::Empty));
        assert_eq!(validate_family_name("   "), Err(Error::Empty));
        assert_eq!(validate_family_name("\t\n"), Err(Error::Empty));
    }

    #[test]
    fn test_length_limit() {
        let max = "a".repeat(MAX_NAME_LENGTH);
        assert_eq!(validate_family_name(&max), Ok(max.clone()));

        let too_long = "a".repeat(MAX_NAME_LENGTH + 1);
        assert_eq!(validate_family_name(&too_long), Err(Error::TooLong));
    }

    #[test]
    fn test_padding_does_not_count_towards_length() {
        let padded = format!("   {}   ", "a".repeat(MAX_NAME_LENGTH));
        assert!(validate_family_name(&padded).is_ok());
    }

    #[test]
    fn test_inappropriate_names() {
        for name in ["damn", "fuck", "shit"] {
            assert_eq!(
                validate_family_name(name),
                Err(Error::Sinful),
                "Expected '{name}' to be flagged as inappropriate"
            );
        }
    }

    #[test]
    fn test_unicode_names() {
        assert_eq!(validate_family_name("Los García"), Ok("Los García".to_owned()));
    }

    #[test]
    fn test_suggestion_is_valid_name() {
        for _ in 0..20 {
            let name = suggest_family_name();
            assert!(validate_family_name(&name).is_ok());
            assert!(name.split_whitespace().count() >= 2, "unexpected suggestion {name}");
        }
    }

    #[test]
    fn test_error_display() {
        assert_eq!(Error::Empty.to_string(), "name cannot be empty");
        assert_eq!(Error::TooLong.to_string(), "name is too long");
        assert_eq!(Error::Sinful.to_string(), "name is inappropriate");
    }
}
