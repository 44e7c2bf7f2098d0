//! Staff riddle administration
//!
//! Drafts are trimmed and validated here before the store sees them, and
//! a QR payload may only belong to one active riddle at a time. A store that
//! enforces the same rule itself reports a conflict, which is mapped to the
//! same error.

use garde::Validate;
use itertools::Itertools;
use thiserror::Error;

use crate::{
    gateway::{GatewayError, RiddleStore},
    id::RiddleId,
    riddle::{Riddle, RiddleDraft},
};

/// Errors raised while editing riddles
#[derive(Error, Debug)]
pub enum Error {
    /// The draft failed validation
    #[error("invalid riddle: {0}")]
    Invalid(#[from] garde::Report),
    /// Another active riddle already uses the QR payload
    #[error("QR code is already used by another active riddle")]
    DuplicateQrCode,
    /// The riddle store failed
    #[error("storage failure: {0}")]
    Storage(GatewayError),
}

impl From<GatewayError> for Error {
    fn from(error: GatewayError) -> Self {
        if error.is_conflict() {
            Self::DuplicateQrCode
        } else {
            Self::Storage(error)
        }
    }
}

fn checked(draft: RiddleDraft) -> Result<RiddleDraft, Error> {
    let draft = draft.normalized();
    draft.validate()?;
    Ok(draft)
}

fn ensure_unique_qr_code<S: RiddleStore>(
    store: &S,
    draft: &RiddleDraft,
    except: Option<RiddleId>,
) -> Result<(), Error> {
    if !draft.active {
        return Ok(());
    }
    let taken = store.list_riddles()?.iter().any(|riddle| {
        riddle.active && riddle.qr_code == draft.qr_code && Some(riddle.id) != except
    });
    if taken {
        Err(Error::DuplicateQrCode)
    } else {
        Ok(())
    }
}

/// Every riddle, active or not, ordered by id
///
/// # Errors
///
/// `Error::Storage` when the store cannot be read.
pub fn list_riddles<S: RiddleStore>(store: &S) -> Result<Vec<Riddle>, Error> {
    Ok(store
        .list_riddles()?
        .into_iter()
        .sorted_by_key(|riddle| riddle.id)
        .collect_vec())
}

/// Adds a riddle
///
/// # Errors
///
/// * `Error::Invalid` - The draft failed validation
/// * `Error::DuplicateQrCode` - The QR payload is taken
/// * `Error::Storage` - The store failed
pub fn create_riddle<S: RiddleStore>(store: &S, draft: RiddleDraft) -> Result<Riddle, Error> {
    let draft = checked(draft)?;
    ensure_unique_qr_code(store, &draft, None)?;
    let riddle = store.insert_riddle(draft)?;
    log::info!("Created riddle {} ({})", riddle.id, riddle.animal);
    Ok(riddle)
}

/// Replaces a riddle's content
///
/// # Errors
///
/// * `Error::Invalid` - The draft failed validation
/// * `Error::DuplicateQrCode` - The QR payload is taken by another riddle
/// * `Error::Storage` - The store failed or the riddle does not exist
pub fn update_riddle<S: RiddleStore>(
    store: &S,
    riddle_id: RiddleId,
    draft: RiddleDraft,
) -> Result<Riddle, Error> {
    let draft = checked(draft)?;
    ensure_unique_qr_code(store, &draft, Some(riddle_id))?;
    let riddle = store.update_riddle(riddle_id, draft)?;
    log::info!("Updated riddle {riddle_id}");
    Ok(riddle)
}

/// Removes a riddle
///
/// Progress rows already earned for it are kept.
///
/// # Errors
///
/// `Error::Storage` when the store fails or the riddle does not exist.
pub fn delete_riddle<S: RiddleStore>(store: &S, riddle_id: RiddleId) -> Result<(), Error> {
    store.delete_riddle(riddle_id)?;
    log::info!("Deleted riddle {riddle_id}");
    Ok(())
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::{memory::MemoryGateway, riddle::Difficulty};

    fn draft(animal: &str, qr_code: &str) -> RiddleDraft {
        RiddleDraft {
            animal: animal.to_owned(),
            riddle_text: format!("Find the {animal}"),
            hint: "Look around".to_owned(),
            fact: format!("{animal}s live here"),
            difficulty: Difficulty::Medium,
            points: 50,
            qr_code: qr_code.to_owned(),
            zone: None,
            icon: String::new(),
            active: true,
        }
    }

    #[test]
    fn test_create_trims_and_assigns_ids() {
        let store = MemoryGateway::new();
        let mut lion = draft("  Lion ", " LION ");
        lion.zone = Some("   ".to_owned());

        let created = create_riddle(&store, lion).unwrap();
        assert_eq!(created.id, RiddleId(1));
        assert_eq!(created.animal, "Lion");
        assert_eq!(created.qr_code, "LION");
        assert_eq!(created.zone, None);

        let second = create_riddle(&store, draft("Zebra", "ZEBRA")).unwrap();
        assert_eq!(second.id, RiddleId(2));
        assert_eq!(list_riddles(&store).unwrap().len(), 2);
    }

    #[test]
    fn test_invalid_drafts_rejected() {
        let store = MemoryGateway::new();

        let mut no_hint = draft("Lion", "LION");
        no_hint.hint = "   ".to_owned();
        assert!(matches!(create_riddle(&store, no_hint), Err(Error::Invalid(_))));

        let mut no_points = draft("Lion", "LION");
        no_points.points = 0;
        assert!(matches!(create_riddle(&store, no_points), Err(Error::Invalid(_))));

        assert!(list_riddles(&store).unwrap().is_empty());
    }

    #[test]
    fn test_qr_codes_unique_among_active_riddles() {
        let store = MemoryGateway::new();
        let lion = create_riddle(&store, draft("Lion", "LION")).unwrap();

        assert!(matches!(
            create_riddle(&store, draft("Lioness", "LION")),
            Err(Error::DuplicateQrCode)
        ));

        let mut retired = draft("Lioness", "LION");
        retired.active = false;
        assert!(create_riddle(&store, retired).is_ok());

        // editing a riddle keeps its own code
        let mut edited = draft("Lion", "LION");
        edited.points = 75;
        assert_eq!(update_riddle(&store, lion.id, edited).unwrap().points, 75);
    }

    #[test]
    fn test_store_conflict_maps_to_duplicate() {
        assert!(matches!(
            Error::from(GatewayError::Conflict("riddles.qr_code".to_owned())),
            Error::DuplicateQrCode
        ));
        assert!(matches!(
            Error::from(GatewayError::NotFound),
            Error::Storage(GatewayError::NotFound)
        ));
    }

    #[test]
    fn test_update_and_delete_missing_riddle() {
        let store = MemoryGateway::new();
        assert!(matches!(
            update_riddle(&store, RiddleId(9), draft("Owl", "OWL")),
            Err(Error::Storage(GatewayError::NotFound))
        ));
        assert!(matches!(
            delete_riddle(&store, RiddleId(9)),
            Err(Error::Storage(GatewayError::NotFound))
        ));
    }

    #[test]
    fn test_delete_riddle() {
        let store = MemoryGateway::new();
        let owl = create_riddle(&store, draft("Owl", "OWL")).unwrap();
        delete_riddle(&store, owl.id).unwrap();
        assert!(list_riddles(&store).unwrap().is_empty());
        assert!(create_riddle(&store, draft("Owl", "OWL")).is_ok());
    }
}
