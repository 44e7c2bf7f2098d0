//! # Zoo Safari
//!
//! Core logic for a family scavenger hunt played at the zoo. Families pick
//! a difficulty, read riddles about animals, and scan the QR code at the
//! matching exhibit to collect points and build a digital zoo. Staff manage
//! riddle content and review engagement figures and survey results.
//!
//! The crate never talks to a database or a browser directly: durable rows
//! go through [`gateway::PersistenceGateway`] and [`gateway::RiddleStore`],
//! and the device-local resume keys go through
//! [`session::SessionRepository`]. [`memory`] provides in-process
//! implementations of both.

#![cfg_attr(all(coverage_nightly, test), feature(coverage_attribute))]
#![deny(missing_docs)]
#![deny(rustdoc::missing_crate_level_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::similar_names)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_possible_wrap)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::struct_field_names)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::missing_errors_doc)]
use derive_where::derive_where;
use itertools::Itertools;
use serde::Serialize;

pub mod adventure;
pub mod analytics;
pub mod catalog;
pub mod config;
pub mod constants;
pub mod gateway;
pub mod id;
pub mod memory;
pub mod names;
pub mod records;
pub mod riddle;
pub mod sequence;
pub mod session;
pub mod survey;

pub use adventure::{Adventure, AlarmMessage};

/// A truncated vector that maintains the exact count while limiting displayed items
///
/// Used for ranked lists on the dashboard: "12 animals found" while only
/// the top ten are charted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[derive_where(Default)]
pub struct TruncatedVec<T> {
    /// The exact total count of items
    exact_count: usize,
    /// The truncated list of items (up to the limit)
    items: Vec<T>,
}

impl<T> TruncatedVec<T> {
    /// Creates a new truncated vector from an iterator
    ///
    /// # Arguments
    ///
    /// * `list` - An iterator over items to include
    /// * `limit` - Maximum number of items to include in the truncated vector
    /// * `exact_count` - The exact total count of items (may be larger than limit)
    pub fn new<I: Iterator<Item = T>>(list: I, limit: usize, exact_count: usize) -> Self {
        let items = list.take(limit).collect_vec();
        Self { exact_count, items }
    }

    /// Returns the exact count of items
    pub fn exact_count(&self) -> usize {
        self.exact_count
    }

    /// Returns the truncated items
    pub fn items(&self) -> &[T] {
        &self.items
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn test_truncated_vec_new() {
        let truncated = TruncatedVec::new(vec![1, 2, 3, 4, 5].into_iter(), 3, 5);

        assert_eq!(truncated.exact_count(), 5);
        assert_eq!(truncated.items(), &[1, 2, 3]);
    }

    #[test]
    fn test_truncated_vec_limit_larger_than_items() {
        let truncated = TruncatedVec::new(vec![1, 2, 3].into_iter(), 5, 3);

        assert_eq!(truncated.exact_count(), 3);
        assert_eq!(truncated.items(), &[1, 2, 3]);
    }

    #[test]
    fn test_truncated_vec_default_is_empty() {
        let truncated = TruncatedVec::<String>::default();

        assert_eq!(truncated.exact_count(), 0);
        assert!(truncated.items().is_empty());
    }

    #[test]
    fn test_truncated_vec_serializes_count_and_items() {
        let truncated = TruncatedVec::new(["Owl"].into_iter(), 10, 7);
        let json = serde_json::to_value(&truncated).unwrap();

        assert_eq!(json, serde_json::json!({ "exact_count": 7, "items": ["Owl"] }));
    }
}
