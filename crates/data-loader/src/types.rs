//! Core domain types for the recommendation store.
//!
//! This module defines the records exchanged between the store and the
//! recommendation pipeline, plus the in-memory `DataIndex` that backs the
//! reference store.
//! Key Rust concepts demonstrated here:
//! - Type aliases for domain clarity (UserId, MovieId)
//! - `Option<T>` as an explicit absence marker for missing ratings
//! - Enums with a fixed ordering (RatingSource)
//! - HashMap and BTreeMap for efficient lookups

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

// =============================================================================
// Type Aliases
// =============================================================================

/// Unique identifier for a user
pub type UserId = u32;

/// Unique identifier for a movie
pub type MovieId = u32;

// =============================================================================
// User-related Types
// =============================================================================

/// A registered user. Users may exist without any rating history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub username: String,
}

/// One rating a user gave to a movie, on a 0-10 scale.
///
/// The store keeps at most one record per (user, movie) pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UserHistoryRecord {
    pub movie_id: MovieId,
    pub rating: f32,
}

impl UserHistoryRecord {
    pub fn new(movie_id: MovieId, rating: f32) -> Self {
        Self { movie_id, rating }
    }
}

// =============================================================================
// Movie-related Types
// =============================================================================

/// Represents a movie in the catalog
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Movie {
    pub id: MovieId,
    pub title: String,
    /// Release year extracted from the title (e.g., "Toy Story (1995)")
    pub year: Option<u16>,
    pub genres: Vec<Genre>,
}

/// Movie genres, using the MovieLens vocabulary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Genre {
    Action,
    Adventure,
    Animation,
    Children,
    Comedy,
    Crime,
    Documentary,
    Drama,
    Fantasy,
    FilmNoir,
    Horror,
    Musical,
    Mystery,
    Romance,
    SciFi,
    Thriller,
    War,
    Western,
}

// =============================================================================
// Public Ratings
// =============================================================================

/// An independent public rating provider.
///
/// The declaration order is the canonical order of a rating vector, so the
/// derived `Ord` is what sorts a movie's ratings before they reach the
/// scale model.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub enum RatingSource {
    Imdb,
    Douban,
    Trakt,
}

impl RatingSource {
    /// All sources, in vector order
    pub const ALL: [RatingSource; 3] =
        [RatingSource::Imdb, RatingSource::Douban, RatingSource::Trakt];

    /// Position of this source inside a complete rating vector
    pub fn index(self) -> usize {
        match self {
            RatingSource::Imdb => 0,
            RatingSource::Douban => 1,
            RatingSource::Trakt => 2,
        }
    }
}

impl fmt::Display for RatingSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RatingSource::Imdb => "imdb",
            RatingSource::Douban => "douban",
            RatingSource::Trakt => "trakt",
        };
        f.write_str(name)
    }
}

/// A single public rating. `value` is `None` when the provider has no score
/// for the movie; absence is never encoded as zero.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PublicRating {
    pub source: RatingSource,
    pub value: Option<f32>,
}

impl PublicRating {
    pub fn new(source: RatingSource, value: Option<f32>) -> Self {
        Self { source, value }
    }
}

/// Public ratings of one movie across all sources.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PublicRatingVector {
    ratings: Vec<PublicRating>,
}

impl PublicRatingVector {
    /// Build a vector from raw store records; ratings are kept sorted by source.
    pub fn new(mut ratings: Vec<PublicRating>) -> Self {
        ratings.sort_by_key(|r| r.source);
        Self { ratings }
    }

    /// True when the store has no rating for this movie at all
    pub fn is_empty(&self) -> bool {
        self.ratings.is_empty()
    }

    pub fn len(&self) -> usize {
        self.ratings.len()
    }

    pub fn ratings(&self) -> &[PublicRating] {
        &self.ratings
    }

    /// The three numeric values in source order.
    ///
    /// Returns `None` if any source is missing or carries an absent or
    /// non-finite value.
    pub fn complete_values(&self) -> Option<[f32; 3]> {
        let mut values: [Option<f32>; 3] = [None; 3];
        for rating in &self.ratings {
            values[rating.source.index()] = rating.value;
        }
        match values {
            [Some(a), Some(b), Some(c)] if [a, b, c].iter().all(|v| v.is_finite()) => {
                Some([a, b, c])
            }
            _ => None,
        }
    }
}

// =============================================================================
// Recommendations
// =============================================================================

/// A recommended movie with the score the user is expected to give it
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RecommendationEntry {
    pub movie_id: MovieId,
    pub expected_score: f32,
}

impl RecommendationEntry {
    pub fn new(movie_id: MovieId, expected_score: f32) -> Self {
        Self {
            movie_id,
            expected_score,
        }
    }
}

// =============================================================================
// Statistics Types
// =============================================================================

/// Precomputed statistics for a movie, derived from every user's history
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct MovieStats {
    pub avg_rating: f32,
    pub rating_count: u32,
    /// Popularity score derived from rating count and average
    pub popularity_score: f32,
}

// =============================================================================
// DataIndex - The Core In-Memory Database
// =============================================================================

/// All catalog, rating and recommendation data, indexed for the lookups the
/// pipeline performs.
#[derive(Debug, Default)]
pub struct DataIndex {
    pub(crate) users: HashMap<UserId, User>,
    pub(crate) movies: HashMap<MovieId, Movie>,

    /// History of each user, keyed by movie so a re-rating replaces the old one
    pub(crate) user_history: HashMap<UserId, BTreeMap<MovieId, f32>>,
    /// Public ratings per movie, one entry per source
    pub(crate) public_ratings: HashMap<MovieId, BTreeMap<RatingSource, Option<f32>>>,

    /// Movies grouped by release year, each list sorted by id
    pub(crate) year_index: BTreeMap<u16, Vec<MovieId>>,

    pub(crate) movie_stats: HashMap<MovieId, MovieStats>,

    pub(crate) recommendations: HashMap<UserId, Vec<RecommendationEntry>>,
}

impl DataIndex {
    /// Creates a new, empty DataIndex
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_user(&self, id: UserId) -> Option<&User> {
        self.users.get(&id)
    }

    /// All user ids, ascending
    pub fn user_ids(&self) -> Vec<UserId> {
        let mut ids: Vec<UserId> = self.users.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    pub fn get_movie(&self, id: MovieId) -> Option<&Movie> {
        self.movies.get(&id)
    }

    /// Rating history of a user, ordered by movie id.
    ///
    /// Returns an empty list for unknown users.
    pub fn get_user_history(&self, user_id: UserId) -> Vec<UserHistoryRecord> {
        self.user_history
            .get(&user_id)
            .map(|history| {
                history
                    .iter()
                    .map(|(&movie_id, &rating)| UserHistoryRecord::new(movie_id, rating))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Get all movies released in a specific year, ascending by id
    pub fn get_movies_by_year(&self, year: u16) -> &[MovieId] {
        self.year_index
            .get(&year)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    /// Earliest release year in the catalog
    pub fn earliest_year(&self) -> Option<u16> {
        self.year_index.keys().next().copied()
    }

    pub fn get_public_rating(&self, movie_id: MovieId) -> PublicRatingVector {
        let ratings = self
            .public_ratings
            .get(&movie_id)
            .map(|by_source| {
                by_source
                    .iter()
                    .map(|(&source, &value)| PublicRating::new(source, value))
                    .collect()
            })
            .unwrap_or_default();
        PublicRatingVector::new(ratings)
    }

    pub fn get_movie_stats(&self, movie_id: MovieId) -> Option<&MovieStats> {
        self.movie_stats.get(&movie_id)
    }

    pub fn get_recommendations(&self, user_id: UserId) -> &[RecommendationEntry] {
        self.recommendations
            .get(&user_id)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    // Mutators - take `&mut self`; the shared store wraps them in a lock

    pub fn insert_user(&mut self, user: User) {
        self.users.insert(user.id, user);
    }

    /// Insert a movie and index it by year
    pub fn insert_movie(&mut self, movie: Movie) {
        if let Some(year) = movie.year {
            let ids = self.year_index.entry(year).or_default();
            if let Err(pos) = ids.binary_search(&movie.id) {
                ids.insert(pos, movie.id);
            }
        }
        self.movies.insert(movie.id, movie);
    }

    /// Record a user's rating, replacing any earlier rating of the same movie
    pub fn insert_rating(&mut self, user_id: UserId, record: UserHistoryRecord) {
        self.user_history
            .entry(user_id)
            .or_default()
            .insert(record.movie_id, record.rating);
    }

    /// Store one public rating, replacing the previous value from that source
    pub fn insert_public_rating(&mut self, movie_id: MovieId, rating: PublicRating) {
        self.public_ratings
            .entry(movie_id)
            .or_default()
            .insert(rating.source, rating.value);
    }

    pub fn set_recommendations(&mut self, user_id: UserId, entries: Vec<RecommendationEntry>) {
        self.recommendations.insert(user_id, entries);
    }

    /// Get counts for debugging/validation: (users, movies, history records)
    pub fn counts(&self) -> (usize, usize, usize) {
        let total_ratings = self.user_history.values().map(|v| v.len()).sum();
        (self.users.len(), self.movies.len(), total_ratings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_complete_values_in_source_order() {
        let vector = PublicRatingVector::new(vec![
            PublicRating::new(RatingSource::Trakt, Some(6.5)),
            PublicRating::new(RatingSource::Imdb, Some(7.0)),
            PublicRating::new(RatingSource::Douban, Some(8.1)),
        ]);

        assert_eq!(vector.complete_values(), Some([7.0, 8.1, 6.5]));
        assert_eq!(vector.ratings()[0].source, RatingSource::Imdb);
    }

    #[test]
    fn test_absent_value_makes_vector_incomplete() {
        let vector = PublicRatingVector::new(vec![
            PublicRating::new(RatingSource::Imdb, Some(7.0)),
            PublicRating::new(RatingSource::Douban, None),
            PublicRating::new(RatingSource::Trakt, Some(6.5)),
        ]);

        assert_eq!(vector.len(), 3);
        assert!(vector.complete_values().is_none());
    }

    #[test]
    fn test_non_finite_value_makes_vector_incomplete() {
        let vector = PublicRatingVector::new(vec![
            PublicRating::new(RatingSource::Imdb, Some(f32::NAN)),
            PublicRating::new(RatingSource::Douban, Some(7.0)),
            PublicRating::new(RatingSource::Trakt, Some(f32::INFINITY)),
        ]);

        assert!(vector.complete_values().is_none());
    }

    #[test]
    fn test_missing_source_makes_vector_incomplete() {
        let vector = PublicRatingVector::new(vec![
            PublicRating::new(RatingSource::Imdb, Some(7.0)),
            PublicRating::new(RatingSource::Trakt, Some(6.5)),
        ]);

        assert!(vector.complete_values().is_none());
        assert!(PublicRatingVector::default().is_empty());
    }

    #[test]
    fn test_year_index_stays_sorted() {
        let mut index = DataIndex::new();
        for id in [30, 10, 20, 10] {
            index.insert_movie(Movie {
                id,
                title: format!("Movie {} (2001)", id),
                year: Some(2001),
                genres: vec![],
            });
        }

        assert_eq!(index.get_movies_by_year(2001), &[10, 20, 30]);
        assert_eq!(index.earliest_year(), Some(2001));
    }

    #[test]
    fn test_rerating_replaces_history_record() {
        let mut index = DataIndex::new();
        index.insert_rating(1, UserHistoryRecord::new(5, 6.0));
        index.insert_rating(1, UserHistoryRecord::new(5, 9.0));

        let history = index.get_user_history(1);
        assert_eq!(history, vec![UserHistoryRecord::new(5, 9.0)]);
    }
}
