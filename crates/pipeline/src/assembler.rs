//! Recommendation Assembler.
//!
//! Turns a candidate pool into recommendations for one user:
//! 1. Fetch each candidate's public ratings
//! 2. Ask the ingestion controller to backfill them if the store has none
//! 3. Skip candidates whose ratings are still incomplete
//! 4. Predict the user's score with the scale model
//! 5. Keep candidates scoring above the recommendation criterion
//!
//! Users without seeds bypass all of this and get the popular list.

use crate::scale::ScaleModel;
use anyhow::{Context, Result};
use data_loader::{
    IngestionController, MovieId, PublicRatingVector, RatingStore, RecommendationEntry,
    POPULAR_MOVIE_COUNT,
};
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// Predicted scores must be strictly above this to be recommended
pub const RECOMMEND_CRITERION: f32 = 7.0;

/// How many times a candidate without ratings is sent to ingestion
pub const DEFAULT_BACKFILL_ATTEMPTS: usize = 1;

pub struct RecommendationAssembler {
    store: Arc<dyn RatingStore>,
    ingestion: Arc<dyn IngestionController>,
    recommend_criterion: f32,
    backfill_attempts: usize,
}

impl RecommendationAssembler {
    pub fn new(store: Arc<dyn RatingStore>, ingestion: Arc<dyn IngestionController>) -> Self {
        Self {
            store,
            ingestion,
            recommend_criterion: RECOMMEND_CRITERION,
            backfill_attempts: DEFAULT_BACKFILL_ATTEMPTS,
        }
    }

    /// Configure the recommendation threshold (default: 7.0)
    pub fn with_recommend_criterion(mut self, criterion: f32) -> Self {
        self.recommend_criterion = criterion;
        self
    }

    /// Configure the backfill attempts per candidate (default: 1)
    pub fn with_backfill_attempts(mut self, attempts: usize) -> Self {
        self.backfill_attempts = attempts;
        self
    }

    /// Score every candidate and keep those above the criterion, in pool order.
    ///
    /// Store failures abort the assembly; incomplete data only skips the
    /// candidate.
    #[instrument(skip(self, candidates, model), fields(candidates = candidates.len()))]
    pub fn assemble(
        &self,
        candidates: &[MovieId],
        model: &ScaleModel,
    ) -> Result<Vec<RecommendationEntry>> {
        let mut recommendations = Vec::new();

        for &movie_id in candidates {
            let vector = self.fetch_with_backfill(movie_id)?;

            let Some(public_ratings) = vector.complete_values() else {
                debug!("Skipping movie {}: incomplete public ratings", movie_id);
                continue;
            };

            let expected_score = model.predict(&public_ratings);
            if expected_score > self.recommend_criterion {
                recommendations.push(RecommendationEntry::new(movie_id, expected_score));
            }
        }

        debug!(
            "Kept {} of {} candidates",
            recommendations.len(),
            candidates.len()
        );
        Ok(recommendations)
    }

    /// The popular list served to users without seeds, exactly as the store
    /// returns it.
    pub fn cold_start(&self) -> Result<Vec<RecommendationEntry>> {
        self.store
            .get_popular_movies(POPULAR_MOVIE_COUNT)
            .context("Failed to fetch popular movies")
    }

    /// Public ratings of a movie, backfilling them while the store has none.
    ///
    /// Backfill is attempted at most `backfill_attempts` times; an ingestion
    /// error ends the attempts and leaves the vector empty.
    fn fetch_with_backfill(&self, movie_id: MovieId) -> Result<PublicRatingVector> {
        let mut vector = self.fetch(movie_id)?;

        let mut attempts = 0;
        while vector.is_empty() && attempts < self.backfill_attempts {
            attempts += 1;
            debug!("Backfilling public ratings of movie {} (attempt {})", movie_id, attempts);

            if let Err(e) = self.ingestion.backfill_public_rating(movie_id) {
                warn!("Backfill of movie {} failed: {:#}", movie_id, e);
                break;
            }
            vector = self.fetch(movie_id)?;
        }

        Ok(vector)
    }

    fn fetch(&self, movie_id: MovieId) -> Result<PublicRatingVector> {
        self.store
            .get_public_rating(movie_id)
            .with_context(|| format!("Failed to fetch public ratings of movie {}", movie_id))
    }
}
