//! Similarity between a candidate movie and a user's seeds.
//!
//! The pipeline only depends on the `SimilarityEngine` trait.
//! `GenreSimilarity` is the reference engine: the highest Jaccard overlap
//! between the candidate's genres and the genres of any single seed.

use crate::seeds::SeedSet;
use anyhow::{Context, Result};
use data_loader::{Genre, MovieId, RatingStore};
use std::collections::HashSet;
use std::sync::Arc;

/// Minimum similarity for a movie to enter the candidate pool
pub const SIMILARITY_CRITERION: f32 = 0.5;

/// Scores one candidate against a seed set, on a 0.0 - 1.0 scale
pub trait SimilarityEngine: Send + Sync {
    fn similarity(&self, seeds: &SeedSet, candidate: MovieId) -> Result<f32>;
}

/// Genre-overlap similarity backed by the store's catalog
pub struct GenreSimilarity {
    store: Arc<dyn RatingStore>,
}

impl GenreSimilarity {
    pub fn new(store: Arc<dyn RatingStore>) -> Self {
        Self { store }
    }

    fn genres(&self, movie_id: MovieId) -> Result<Option<HashSet<Genre>>> {
        let movie = self
            .store
            .get_movie(movie_id)
            .with_context(|| format!("Failed to look up movie {}", movie_id))?;
        Ok(movie.map(|m| m.genres.into_iter().collect()))
    }
}

impl SimilarityEngine for GenreSimilarity {
    fn similarity(&self, seeds: &SeedSet, candidate: MovieId) -> Result<f32> {
        let candidate_genres = match self.genres(candidate)? {
            Some(genres) => genres,
            None => return Ok(0.0),
        };

        let mut highest: f32 = 0.0;
        for &seed in seeds {
            // Seeds missing from the catalog contribute nothing
            if let Some(seed_genres) = self.genres(seed)? {
                highest = highest.max(jaccard(&candidate_genres, &seed_genres));
            }
        }
        Ok(highest)
    }
}

/// |intersection| / |union|, 0.0 when both sets are empty
fn jaccard(a: &HashSet<Genre>, b: &HashSet<Genre>) -> f32 {
    let union = a.union(b).count() as f32;
    if union == 0.0 {
        return 0.0;
    }
    a.intersection(b).count() as f32 / union
}
