//! DataIndex building and indexing logic.
//!
//! Builds the in-memory index from the `.dat` files, computes per-movie
//! statistics from every user's history and answers the popularity query
//! used for cold-start users.

use crate::error::{Result, StoreError};
use crate::parser;
use crate::types::*;
use rayon::prelude::*;
use std::path::Path;
use tracing::{debug, info};

/// Highest rating a user may give
pub const MAX_USER_RATING: f32 = 10.0;

/// Public ratings share the user rating scale
pub const MAX_PUBLIC_RATING: f32 = 10.0;

impl DataIndex {
    /// Load a data directory containing users.dat, movies.dat, ratings.dat
    /// and public_ratings.dat.
    ///
    /// Steps:
    /// 1. Parse all four files in parallel
    /// 2. Build the primary and year indices
    /// 3. Compute movie statistics
    /// 4. Validate data integrity
    pub fn load_from_files(data_dir: &Path) -> Result<Self> {
        info!("Loading rating store from {:?}", data_dir);

        let users_path = data_dir.join("users.dat");
        let movies_path = data_dir.join("movies.dat");
        let ratings_path = data_dir.join("ratings.dat");
        let public_path = data_dir.join("public_ratings.dat");

        // Nested joins give four-way parallelism
        let ((users, movies), (ratings, public_ratings)) = rayon::join(
            || {
                rayon::join(
                    || parser::parse_users(&users_path),
                    || parser::parse_movies(&movies_path),
                )
            },
            || {
                rayon::join(
                    || parser::parse_ratings(&ratings_path),
                    || parser::parse_public_ratings(&public_path),
                )
            },
        );

        let users = users?;
        let movies = movies?;
        let ratings = ratings?;
        let public_ratings = public_ratings?;

        info!(
            "Loaded {} users, {} movies, {} ratings, {} public ratings",
            users.len(),
            movies.len(),
            ratings.len(),
            public_ratings.len()
        );

        let mut index = DataIndex::new();
        for user in users {
            index.insert_user(user);
        }
        for movie in movies {
            index.insert_movie(movie);
        }
        for (user_id, record) in ratings {
            index.insert_rating(user_id, record);
        }
        for (movie_id, rating) in public_ratings {
            index.insert_public_rating(movie_id, rating);
        }

        index.compute_movie_stats();
        index.validate()?;

        info!("DataIndex successfully built and validated");
        Ok(index)
    }

    /// Compute average rating, rating count and popularity for every movie
    /// that appears in at least one user's history.
    pub fn compute_movie_stats(&mut self) {
        let mut totals: std::collections::HashMap<MovieId, (f32, u32)> =
            std::collections::HashMap::new();
        for history in self.user_history.values() {
            for (&movie_id, &rating) in history {
                let entry = totals.entry(movie_id).or_insert((0.0, 0));
                entry.0 += rating;
                entry.1 += 1;
            }
        }

        self.movie_stats = totals
            .into_par_iter()
            .map(|(movie_id, (total, rating_count))| {
                let avg_rating = total / rating_count as f32;
                (
                    movie_id,
                    MovieStats {
                        avg_rating,
                        rating_count,
                        popularity_score: compute_popularity_score(avg_rating, rating_count),
                    },
                )
            })
            .collect();

        debug!("Computed stats for {} movies", self.movie_stats.len());
    }

    /// The `limit` most popular movies, with their average user rating as
    /// the score. Ties are broken by movie id so the list is deterministic.
    pub fn popular_movies(&self, limit: usize) -> Vec<RecommendationEntry> {
        let mut ranked: Vec<(MovieId, &MovieStats)> =
            self.movie_stats.iter().map(|(&id, stats)| (id, stats)).collect();

        ranked.sort_by(|a, b| {
            b.1.popularity_score
                .partial_cmp(&a.1.popularity_score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });

        ranked
            .into_iter()
            .take(limit)
            .map(|(id, stats)| RecommendationEntry::new(id, stats.avg_rating))
            .collect()
    }

    /// Validate data integrity
    ///
    /// Check that:
    /// - All history records reference known users and movies
    /// - User ratings are within 0.0 - 10.0
    /// - Public ratings reference known movies and are within 0.0 - 10.0
    pub fn validate(&self) -> Result<()> {
        for (&user_id, history) in &self.user_history {
            if !self.users.contains_key(&user_id) {
                return Err(StoreError::MissingReference {
                    entity: "User".to_string(),
                    id: user_id,
                });
            }
            for (&movie_id, &rating) in history {
                if !self.movies.contains_key(&movie_id) {
                    return Err(StoreError::MissingReference {
                        entity: "Movie".to_string(),
                        id: movie_id,
                    });
                }
                if !(0.0..=MAX_USER_RATING).contains(&rating) {
                    return Err(StoreError::InvalidValue {
                        field: "rating".to_string(),
                        value: rating.to_string(),
                    });
                }
            }
        }

        if let Some(movie_id) = self
            .public_ratings
            .keys()
            .find(|id| !self.movies.contains_key(*id))
        {
            return Err(StoreError::ValidationError(format!(
                "public ratings reference unknown movie {}",
                movie_id
            )));
        }

        for ratings in self.public_ratings.values() {
            for (source, value) in ratings {
                if let Some(value) = value {
                    if !(0.0..=MAX_PUBLIC_RATING).contains(value) {
                        return Err(StoreError::InvalidValue {
                            field: format!("{} rating", source),
                            value: value.to_string(),
                        });
                    }
                }
            }
        }

        Ok(())
    }
}

/// avg_rating * ln(rating_count + 1): rewards both high ratings and many ratings
fn compute_popularity_score(avg_rating: f32, rating_count: u32) -> f32 {
    avg_rating * (rating_count as f32 + 1.0).ln()
}
