//! Seed extraction.
//!
//! Seeds are the movies a user rated highly enough to anchor the similarity
//! search.

use data_loader::{MovieId, UserHistoryRecord};
use std::collections::HashSet;
use std::collections::hash_set;

/// Minimum rating for a watched movie to become a seed
pub const USER_RATINGS_CRITERION: f32 = 8.0;

/// Movies a user is known to like strongly. No duplicates, no order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SeedSet {
    movies: HashSet<MovieId>,
}

impl SeedSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, movie_id: &MovieId) -> bool {
        self.movies.contains(movie_id)
    }

    pub fn len(&self) -> usize {
        self.movies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.movies.is_empty()
    }

    pub fn iter(&self) -> hash_set::Iter<'_, MovieId> {
        self.movies.iter()
    }
}

impl FromIterator<MovieId> for SeedSet {
    fn from_iter<I: IntoIterator<Item = MovieId>>(iter: I) -> Self {
        Self {
            movies: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a SeedSet {
    type Item = &'a MovieId;
    type IntoIter = hash_set::Iter<'a, MovieId>;

    fn into_iter(self) -> Self::IntoIter {
        self.movies.iter()
    }
}

/// Turns a rating history into a seed set
#[derive(Debug, Clone, Copy)]
pub struct SeedExtractor {
    criterion: f32,
}

impl SeedExtractor {
    pub fn new() -> Self {
        Self {
            criterion: USER_RATINGS_CRITERION,
        }
    }

    /// Configure the minimum seed rating (default: 8.0)
    pub fn with_criterion(mut self, criterion: f32) -> Self {
        self.criterion = criterion;
        self
    }

    /// Ids of every record rated at or above the criterion.
    pub fn extract(&self, history: &[UserHistoryRecord]) -> SeedSet {
        history
            .iter()
            .filter(|record| record.rating >= self.criterion)
            .map(|record| record.movie_id)
            .collect()
    }
}

impl Default for SeedExtractor {
    fn default() -> Self {
        Self::new()
    }
}
