//! Riddle ordering
//!
//! A family walks the zoo zone by zone, so riddles are grouped by zone and
//! the zones are visited in a fixed walking order. Within a zone the order
//! is shuffled so repeat visits feel fresh. The shuffle is driven by a seed
//! that is stored with the session: the same seed over the same riddles
//! always yields the same sequence, which is how a reload resumes without
//! re-shuffling.

use itertools::Itertools;

use crate::{
    id::RiddleId,
    riddle::{DifficultyFilter, Riddle},
};

/// The ordered riddles of one play-through
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RiddleSequence {
    riddles: Vec<Riddle>,
    seed: u64,
}

impl RiddleSequence {
    /// Orders the playable riddles for a family
    ///
    /// # Arguments
    ///
    /// * `riddles` - Active riddles in store order
    /// * `filter` - Difficulty the family selected
    /// * `canonical_zones` - Zone walking order; unknown zones follow in the
    ///   order they first appear, riddles without a zone are grouped together
    /// * `seed` - Seed for the per-zone shuffle
    pub fn build(
        riddles: &[Riddle],
        filter: DifficultyFilter,
        canonical_zones: &[String],
        seed: u64,
    ) -> Self {
        let mut rng = fastrand::Rng::with_seed(seed);

        let mut zones: Vec<(Option<&str>, Vec<Riddle>)> = Vec::new();
        for riddle in riddles
            .iter()
            .filter(|riddle| riddle.active && filter.matches(riddle.difficulty))
        {
            let zone = riddle.zone.as_deref();
            match zones.iter_mut().find(|(name, _)| *name == zone) {
                Some((_, members)) => members.push(riddle.clone()),
                None => zones.push((zone, vec![riddle.clone()])),
            }
        }

        let riddles = zones
            .into_iter()
            .enumerate()
            .sorted_by_key(|(discovered, (zone, _))| {
                canonical_zones
                    .iter()
                    .position(|canonical| Some(canonical.as_str()) == *zone)
                    .map_or((1, *discovered), |rank| (0, rank))
            })
            .flat_map(|(_, (_, mut members))| {
                rng.shuffle(&mut members);
                members
            })
            .collect_vec();

        Self { riddles, seed }
    }

    /// Seed the sequence was built with
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Number of riddles in the sequence
    pub fn len(&self) -> usize {
        self.riddles.len()
    }

    /// Whether no riddle matched
    pub fn is_empty(&self) -> bool {
        self.riddles.is_empty()
    }

    /// Riddle at a position
    pub fn get(&self, index: usize) -> Option<&Riddle> {
        self.riddles.get(index)
    }

    /// Whether the index is the final riddle
    pub fn is_last(&self, index: usize) -> bool {
        index + 1 >= self.riddles.len()
    }

    /// Whether the riddle is part of this play-through
    pub fn contains(&self, riddle_id: RiddleId) -> bool {
        self.riddles.iter().any(|riddle| riddle.id == riddle_id)
    }

    /// Riddles in play order
    pub fn riddles(&self) -> &[Riddle] {
        &self.riddles
    }
}
