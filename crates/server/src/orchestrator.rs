//! # Recommendation Orchestrator
//!
//! Runs the whole pipeline for one user:
//! 1. Fetch the user's rating history
//! 2. Extract seeds (cold start if there are none)
//! 3. Search the catalog for similar candidates
//! 4. Train the user's scale model
//! 5. Assemble and rank the recommendations
//! 6. Save them (on update)

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use tracing::{debug, info, instrument};

use data_loader::{
    DataIndex, DumpIngestion, IngestionController, RatingStore, RecommendationEntry, SharedStore,
    UserId,
};
use pipeline::{LeastSquares, LinearFit, RecommendationAssembler, ScaleModel};
use sources::{CandidateSearch, GenreSimilarity, SeedExtractor, SimilarityEngine};

use crate::config::RecommenderConfig;

/// Single-user recommendation pipeline over a rating store
pub struct Recommender {
    store: Arc<dyn RatingStore>,
    extractor: SeedExtractor,
    search: CandidateSearch,
    assembler: RecommendationAssembler,
    fitter: Arc<dyn LinearFit>,
}

impl Recommender {
    /// Wire the pipeline stages from a configuration.
    ///
    /// The scale model is fitted with `LeastSquares` unless replaced with
    /// `with_fitter`.
    pub fn new(
        store: Arc<dyn RatingStore>,
        engine: Arc<dyn SimilarityEngine>,
        ingestion: Arc<dyn IngestionController>,
        config: &RecommenderConfig,
    ) -> Self {
        let extractor = SeedExtractor::new().with_criterion(config.seed_criterion);

        let mut search = CandidateSearch::new(store.clone(), engine)
            .with_pool_size(config.pool_size)
            .with_similarity_criterion(config.similarity_criterion)
            .with_min_year(config.min_year);
        if let Some(year) = config.start_year {
            search = search.with_start_year(year);
        }

        let assembler = RecommendationAssembler::new(store.clone(), ingestion)
            .with_recommend_criterion(config.recommend_criterion)
            .with_backfill_attempts(config.backfill_attempts);

        Self {
            store,
            extractor,
            search,
            assembler,
            fitter: Arc::new(LeastSquares::new()),
        }
    }

    /// Load the reference stack from a data directory: the `.dat` store,
    /// genre similarity and dump-backed ingestion.
    pub fn from_data_dir(
        data_dir: &Path,
        config: &RecommenderConfig,
    ) -> Result<(Arc<SharedStore>, Self)> {
        info!("Loading data from {:?}", data_dir);
        let index =
            DataIndex::load_from_files(data_dir).context("Failed to load data directory")?;
        let (users, movies, ratings) = index.counts();
        info!("Loaded {} users, {} movies, {} ratings", users, movies, ratings);

        let shared = Arc::new(SharedStore::new(index));
        let store: Arc<dyn RatingStore> = shared.clone();
        let ingestion = Arc::new(
            DumpIngestion::from_dir(shared.clone(), data_dir)
                .context("Failed to load backfill dump")?,
        );
        let engine = Arc::new(GenreSimilarity::new(store.clone()));

        Ok((shared, Self::new(store, engine, ingestion, config)))
    }

    /// Replace the regression backend of the scale model
    pub fn with_fitter(mut self, fitter: Arc<dyn LinearFit>) -> Self {
        self.fitter = fitter;
        self
    }

    /// Compute a user's recommendations without saving them.
    ///
    /// Users without seeds get the popular list as the store returns it;
    /// everyone else gets their assembled list, highest expected score first.
    #[instrument(skip(self))]
    pub fn get_single_user_recommendations(
        &self,
        user_id: UserId,
    ) -> Result<Vec<RecommendationEntry>> {
        let start_time = Instant::now();

        let history = self
            .store
            .get_user_history(user_id)
            .with_context(|| format!("Failed to fetch history of user {}", user_id))?;

        let seeds = self.extractor.extract(&history);
        if seeds.is_empty() {
            info!("User {} has no seeds, serving popular movies", user_id);
            return self.assembler.cold_start();
        }
        debug!("Extracted {} seeds from {} ratings", seeds.len(), history.len());

        let pool = self.search.search(&seeds).context("Candidate search failed")?;
        debug!("Candidate pool: {} movies ({:?})", pool.len(), pool.outcome());

        let model = ScaleModel::train(self.store.as_ref(), &history, self.fitter.as_ref())
            .context("Failed to train scale model")?;
        debug!("Scale model trained: {}", model.is_trained());

        let mut recommendations = self
            .assembler
            .assemble(pool.movie_ids(), &model)
            .context("Failed to assemble recommendations")?;
        rank_by_score(&mut recommendations);

        info!(
            "Built {} recommendations for user {} in {:.2?}",
            recommendations.len(),
            user_id,
            start_time.elapsed()
        );
        Ok(recommendations)
    }

    /// Compute and save a user's recommendations; returns how many were saved
    pub fn update_single_user_recommendations(&self, user_id: UserId) -> Result<usize> {
        let recommendations = self.get_single_user_recommendations(user_id)?;
        self.store
            .save_recommendations(&recommendations, user_id)
            .with_context(|| format!("Failed to save recommendations of user {}", user_id))?;
        Ok(recommendations.len())
    }

    pub fn store(&self) -> &Arc<dyn RatingStore> {
        &self.store
    }
}

/// Sort by expected score DESC; ties keep pool order
fn rank_by_score(recommendations: &mut [RecommendationEntry]) {
    recommendations.sort_by(|a, b| {
        b.expected_score
            .partial_cmp(&a.expected_score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use data_loader::{
        Genre, Movie, MovieId, NoopIngestion, PublicRating, RatingSource, User, UserHistoryRecord,
        POPULAR_MOVIE_COUNT,
    };

    // ============================================================================
    // Test Fixtures
    // ============================================================================

    fn add_ratings(index: &mut DataIndex, movie_id: MovieId, values: [f32; 3]) {
        for (source, value) in RatingSource::ALL.into_iter().zip(values) {
            index.insert_public_rating(movie_id, PublicRating::new(source, Some(value)));
        }
    }

    /// Twelve 2020 Action movies rated by a crowd, plus two users:
    /// user 1 loved movie 1 and disliked movie 6, user 2 only rated movie 2
    /// lukewarmly.
    fn build_test_store() -> Arc<SharedStore> {
        let mut index = DataIndex::new();
        for id in 1..=2 {
            index.insert_user(User {
                id,
                username: format!("user{}", id),
            });
        }

        for id in 1..=12 {
            index.insert_movie(Movie {
                id,
                title: format!("Movie {} (2020)", id),
                year: Some(2020),
                genres: vec![Genre::Action],
            });
        }
        add_ratings(&mut index, 1, [8.0, 8.0, 8.0]);
        add_ratings(&mut index, 3, [7.5, 7.0, 7.0]);
        add_ratings(&mut index, 4, [9.0, 8.5, 9.5]);
        add_ratings(&mut index, 5, [8.0, 7.5, 7.5]);
        add_ratings(&mut index, 6, [6.0, 6.0, 6.0]);

        index.insert_rating(1, UserHistoryRecord::new(1, 9.0));
        index.insert_rating(1, UserHistoryRecord::new(6, 5.0));
        index.insert_rating(2, UserHistoryRecord::new(2, 6.0));
        // Crowd ratings make every movie popular to a different degree
        for movie_id in 1..=12u32 {
            for crowd_user in 0..movie_id {
                index.insert_rating(100 + crowd_user, UserHistoryRecord::new(movie_id, 5.0));
            }
        }
        index.compute_movie_stats();

        Arc::new(SharedStore::new(index))
    }

    fn build_recommender(shared: &Arc<SharedStore>) -> Recommender {
        let store: Arc<dyn RatingStore> = shared.clone();
        let config = RecommenderConfig {
            start_year: Some(2020),
            min_year: 2019,
            ..RecommenderConfig::default()
        };
        Recommender::new(
            store.clone(),
            Arc::new(GenreSimilarity::new(store)),
            Arc::new(NoopIngestion),
            &config,
        )
    }

    // ============================================================================
    // Tests
    // ============================================================================

    #[test]
    fn test_recommendations_ranked_by_expected_score() {
        let shared = build_test_store();
        let recommender = build_recommender(&shared);

        let recommendations = recommender.get_single_user_recommendations(1).unwrap();

        // Trained on movies 1 and 6: score = 2/3 * (imdb + douban + trakt) - 7.
        // The pool holds 3, 4, 5 in that order; movie 6 predicts 5.0
        let ids: Vec<MovieId> = recommendations.iter().map(|e| e.movie_id).collect();
        assert_eq!(ids, vec![4, 5, 3]);

        let expected = [11.0, 25.0 / 3.0, 22.0 / 3.0];
        for (entry, score) in recommendations.iter().zip(expected) {
            assert!((entry.expected_score - score).abs() < 1e-3);
        }
    }

    #[test]
    fn test_cold_start_returns_popular_list_unmodified() {
        let shared = build_test_store();
        let recommender = build_recommender(&shared);
        let popular = shared.get_popular_movies(POPULAR_MOVIE_COUNT).unwrap();

        let recommendations = recommender.get_single_user_recommendations(2).unwrap();

        assert_eq!(recommendations.len(), POPULAR_MOVIE_COUNT);
        assert_eq!(recommendations, popular);
    }

    #[test]
    fn test_update_saves_recommendations() {
        let shared = build_test_store();
        let recommender = build_recommender(&shared);

        let saved = recommender.update_single_user_recommendations(1).unwrap();

        assert_eq!(saved, 3);
        let index = shared.read().unwrap();
        assert_eq!(index.get_recommendations(1).len(), 3);
        assert!(index.get_recommendations(2).is_empty());
    }

    #[test]
    fn test_rank_by_score() {
        let mut entries = vec![
            RecommendationEntry::new(1, 7.5),
            RecommendationEntry::new(2, 9.0),
            RecommendationEntry::new(3, 8.0),
        ];
        rank_by_score(&mut entries);

        let ids: Vec<MovieId> = entries.iter().map(|e| e.movie_id).collect();
        assert_eq!(ids, vec![2, 3, 1]);
    }
}
