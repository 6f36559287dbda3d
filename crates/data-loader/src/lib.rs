//! # Data Loader Crate
//!
//! This crate owns the data side of the recommender: the domain records, the
//! `RatingStore` and `IngestionController` seams, and an in-memory reference
//! store loaded from `.dat` files.
//!
//! ## Main Components
//!
//! - **types**: Core domain types (UserHistoryRecord, PublicRatingVector,
//!   RecommendationEntry, DataIndex)
//! - **parser**: Parse .dat files into Rust structs
//! - **index**: Build the DataIndex, movie statistics and popularity ranking
//! - **store**: The `RatingStore` trait and the lock-protected `SharedStore`
//! - **ingest**: On-demand backfill of public ratings
//! - **error**: Error types for the store
//!
//! ## Example Usage
//!
//! ```ignore
//! use data_loader::{DataIndex, RatingStore, SharedStore};
//! use std::path::Path;
//!
//! let index = DataIndex::load_from_files(Path::new("data/store"))?;
//! let store = SharedStore::new(index);
//!
//! let history = store.get_user_history(8)?;
//! println!("User 8 rated {} movies", history.len());
//! ```

pub mod error;
pub mod types;
pub mod parser;
pub mod index;
pub mod store;
pub mod ingest;

// Re-export commonly used types for convenience
pub use error::{Result, StoreError};
pub use ingest::{DumpIngestion, IngestionController, NoopIngestion, BACKFILL_FILE};
pub use store::{RatingStore, SharedStore, POPULAR_MOVIE_COUNT};
pub use types::{
    // Type aliases
    UserId,
    MovieId,
    // Core types
    User,
    Movie,
    UserHistoryRecord,
    PublicRating,
    PublicRatingVector,
    RecommendationEntry,
    DataIndex,
    MovieStats,
    // Enums
    Genre,
    RatingSource,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_index_creation() {
        let index = DataIndex::new();
        let (users, movies, ratings) = index.counts();

        assert_eq!(users, 0);
        assert_eq!(movies, 0);
        assert_eq!(ratings, 0);
    }

    #[test]
    fn test_insert_user() {
        let mut index = DataIndex::new();
        index.insert_user(User {
            id: 1,
            username: "ana".to_string(),
        });

        let retrieved = index.get_user(1).unwrap();
        assert_eq!(retrieved.username, "ana");
        assert_eq!(index.user_ids(), vec![1]);
    }

    #[test]
    fn test_insert_movie() {
        let mut index = DataIndex::new();
        index.insert_movie(Movie {
            id: 1,
            title: "Toy Story (1995)".to_string(),
            year: Some(1995),
            genres: vec![Genre::Animation, Genre::Children, Genre::Comedy],
        });

        let retrieved = index.get_movie(1).unwrap();
        assert_eq!(retrieved.year, Some(1995));
        assert_eq!(retrieved.genres.len(), 3);
        assert_eq!(index.get_movies_by_year(1995), &[1]);
    }

    #[test]
    fn test_empty_queries() {
        let index = DataIndex::new();

        assert!(index.get_user(999).is_none());
        assert!(index.get_movie(999).is_none());
        assert!(index.get_user_history(999).is_empty());
        assert!(index.get_public_rating(999).is_empty());
        assert!(index.get_recommendations(999).is_empty());
        assert!(index.get_movies_by_year(1995).is_empty());
    }
}
