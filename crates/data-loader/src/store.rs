//! The rating store seam.
//!
//! `RatingStore` is everything the recommendation pipeline reads from or
//! writes to persistent storage. `SharedStore` is the in-memory reference
//! implementation: a `DataIndex` behind an `RwLock`, so many users'
//! pipelines can read concurrently while saves and backfills serialise.

use crate::error::{Result, StoreError};
use crate::types::*;
use std::collections::BTreeMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::debug;

/// Number of movies returned to users without a usable rating history
pub const POPULAR_MOVIE_COUNT: usize = 10;

/// Read/write access to users, catalog, public ratings and saved
/// recommendations.
///
/// ## Design Note
/// - `Send + Sync` lets the batch runner drive several users at once;
///   implementations own their locking or transaction discipline.
/// - Missing data comes back as empty collections, never as an error.
pub trait RatingStore: Send + Sync {
    /// All known user ids
    fn get_users(&self) -> Result<Vec<UserId>>;

    /// Every (movie, rating) pair the user has ever rated
    fn get_user_history(&self, user_id: UserId) -> Result<Vec<UserHistoryRecord>>;

    /// Movies released in `year`, in a stable store order
    fn get_movie_ids_by_year(&self, year: u16) -> Result<Vec<MovieId>>;

    /// Public ratings of a movie; empty if the store has none
    fn get_public_rating(&self, movie_id: MovieId) -> Result<PublicRatingVector>;

    /// The `limit` most popular movies with their scores
    fn get_popular_movies(&self, limit: usize) -> Result<Vec<RecommendationEntry>>;

    /// Replace the saved recommendations of a user
    fn save_recommendations(&self, entries: &[RecommendationEntry], user_id: UserId)
    -> Result<()>;

    fn get_movie(&self, movie_id: MovieId) -> Result<Option<Movie>>;
}

/// Thread-safe in-memory store over a `DataIndex`
#[derive(Debug, Default)]
pub struct SharedStore {
    index: RwLock<DataIndex>,
}

impl SharedStore {
    pub fn new(index: DataIndex) -> Self {
        Self {
            index: RwLock::new(index),
        }
    }

    pub fn read(&self) -> Result<RwLockReadGuard<'_, DataIndex>> {
        self.index.read().map_err(|_| StoreError::LockPoisoned)
    }

    pub fn write(&self) -> Result<RwLockWriteGuard<'_, DataIndex>> {
        self.index.write().map_err(|_| StoreError::LockPoisoned)
    }

    /// Store freshly ingested public ratings for one movie.
    ///
    /// Ratings for a movie that is not in the catalog are rejected.
    pub fn insert_public_ratings(&self, movie_id: MovieId, ratings: &[PublicRating]) -> Result<()> {
        let mut index = self.write()?;
        if index.get_movie(movie_id).is_none() {
            return Err(StoreError::MissingReference {
                entity: "Movie".to_string(),
                id: movie_id,
            });
        }
        for rating in ratings {
            index.insert_public_rating(movie_id, *rating);
        }
        debug!("Stored {} public ratings for movie {}", ratings.len(), movie_id);
        Ok(())
    }

    /// Saved recommendations of every user that has any, keyed by user id
    pub fn all_recommendations(&self) -> Result<BTreeMap<UserId, Vec<RecommendationEntry>>> {
        let index = self.read()?;
        Ok(index
            .recommendations
            .iter()
            .map(|(&user_id, entries)| (user_id, entries.clone()))
            .collect())
    }
}

impl RatingStore for SharedStore {
    fn get_users(&self) -> Result<Vec<UserId>> {
        Ok(self.read()?.user_ids())
    }

    fn get_user_history(&self, user_id: UserId) -> Result<Vec<UserHistoryRecord>> {
        Ok(self.read()?.get_user_history(user_id))
    }

    fn get_movie_ids_by_year(&self, year: u16) -> Result<Vec<MovieId>> {
        Ok(self.read()?.get_movies_by_year(year).to_vec())
    }

    fn get_public_rating(&self, movie_id: MovieId) -> Result<PublicRatingVector> {
        Ok(self.read()?.get_public_rating(movie_id))
    }

    fn get_popular_movies(&self, limit: usize) -> Result<Vec<RecommendationEntry>> {
        Ok(self.read()?.popular_movies(limit))
    }

    fn save_recommendations(
        &self,
        entries: &[RecommendationEntry],
        user_id: UserId,
    ) -> Result<()> {
        self.write()?.set_recommendations(user_id, entries.to_vec());
        Ok(())
    }

    fn get_movie(&self, movie_id: MovieId) -> Result<Option<Movie>> {
        Ok(self.read()?.get_movie(movie_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_store() -> SharedStore {
        let mut index = DataIndex::new();
        index.insert_user(User {
            id: 1,
            username: "ana".to_string(),
        });
        index.insert_movie(Movie {
            id: 10,
            title: "Heat (1995)".to_string(),
            year: Some(1995),
            genres: vec![Genre::Action],
        });
        SharedStore::new(index)
    }

    #[test]
    fn test_save_replaces_recommendations() {
        let store = create_test_store();
        store
            .save_recommendations(&[RecommendationEntry::new(10, 8.0)], 1)
            .unwrap();
        store
            .save_recommendations(&[RecommendationEntry::new(10, 9.5)], 1)
            .unwrap();

        let saved = store.all_recommendations().unwrap();
        assert_eq!(saved[&1], vec![RecommendationEntry::new(10, 9.5)]);
    }

    #[test]
    fn test_insert_public_ratings() {
        let store = create_test_store();
        let ratings = [
            PublicRating::new(RatingSource::Imdb, Some(8.3)),
            PublicRating::new(RatingSource::Douban, Some(8.6)),
            PublicRating::new(RatingSource::Trakt, Some(8.0)),
        ];

        assert!(store.get_public_rating(10).unwrap().is_empty());
        store.insert_public_ratings(10, &ratings).unwrap();
        assert_eq!(
            store.get_public_rating(10).unwrap().complete_values(),
            Some([8.3, 8.6, 8.0])
        );
    }

    #[test]
    fn test_insert_public_ratings_unknown_movie() {
        let store = create_test_store();
        let ratings = [PublicRating::new(RatingSource::Imdb, Some(8.3))];

        assert!(store.insert_public_ratings(99, &ratings).is_err());
    }

    #[test]
    fn test_queries_on_missing_data_are_empty() {
        let store = create_test_store();

        assert!(store.get_user_history(1).unwrap().is_empty());
        assert!(store.get_movie_ids_by_year(1800).unwrap().is_empty());
        assert!(store.get_movie(99).unwrap().is_none());
        assert_eq!(store.get_users().unwrap(), vec![1]);
    }
}
