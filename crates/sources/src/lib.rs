//! # Sources Crate
//!
//! This crate finds the movies a user could be recommended.
//!
//! ## Components
//!
//! ### Seed Extractor
//! Picks the movies the user rated at or above 8.0. These anchor the search.
//!
//! ### Similarity Engine
//! The `SimilarityEngine` trait scores one candidate against the seeds.
//! `GenreSimilarity` is a catalog-backed implementation using genre overlap.
//!
//! ### Candidate Search
//! Walks release years backwards from the current year, pooling movies whose
//! similarity reaches 0.5, until 50 candidates are found or the year bound is
//! reached.
//!
//! ## Example Usage
//!
//! ```ignore
//! use sources::{CandidateSearch, GenreSimilarity, SeedExtractor};
//! use std::sync::Arc;
//!
//! let seeds = SeedExtractor::new().extract(&store.get_user_history(user_id)?);
//! let engine = Arc::new(GenreSimilarity::new(store.clone()));
//! let pool = CandidateSearch::new(store.clone(), engine).search(&seeds)?;
//! ```

pub mod seeds;
pub mod similarity;
pub mod search;

// Re-export commonly used types
pub use seeds::{SeedExtractor, SeedSet, USER_RATINGS_CRITERION};
pub use similarity::{GenreSimilarity, SimilarityEngine, SIMILARITY_CRITERION};
pub use search::{
    CandidatePool, CandidateSearch, SearchOutcome, DEFAULT_MIN_YEAR, SIMILAR_MOVIE_POOL_SIZE,
};

#[cfg(test)]
mod tests {
    use super::*;
    use data_loader::{
        DataIndex, Genre, Movie, RatingStore, SharedStore, User, UserHistoryRecord,
    };
    use std::sync::Arc;

    fn create_test_store() -> Arc<dyn RatingStore> {
        let mut index = DataIndex::new();
        index.insert_user(User {
            id: 1,
            username: "ana".to_string(),
        });

        let movies = [
            (1, 2010, vec![Genre::Action, Genre::SciFi]),
            (2, 2012, vec![Genre::Drama]),
            (3, 2024, vec![Genre::Action, Genre::SciFi]),
            (4, 2023, vec![Genre::Romance]),
            (5, 2020, vec![Genre::SciFi, Genre::Thriller]),
        ];
        for (id, year, genres) in movies {
            index.insert_movie(Movie {
                id,
                title: format!("Movie {} ({})", id, year),
                year: Some(year),
                genres,
            });
        }

        index.insert_rating(1, UserHistoryRecord::new(1, 9.0));
        index.insert_rating(1, UserHistoryRecord::new(2, 6.0));
        Arc::new(SharedStore::new(index))
    }

    #[test]
    fn test_seed_to_pool_with_genre_similarity() {
        let store = create_test_store();
        let seeds = SeedExtractor::new().extract(&store.get_user_history(1).unwrap());
        let engine = Arc::new(GenreSimilarity::new(store.clone()));

        let pool = CandidateSearch::new(store, engine)
            .with_start_year(2024)
            .with_min_year(2000)
            .search(&seeds)
            .unwrap();

        // Movie 3 matches seed 1 exactly; movie 5 overlaps 1 of 3 genres
        assert_eq!(pool.movie_ids(), &[3]);
        assert_eq!(pool.outcome(), SearchOutcome::Partial(1));
    }
}
