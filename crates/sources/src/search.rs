//! Candidate Search - year-windowed similarity search
//!
//! Builds the candidate pool for a user by walking the catalog backwards one
//! release year at a time, starting from the current year.
//!
//! ## Algorithm
//! 1. Fetch the movies released in the current search year
//! 2. For each movie, in store order:
//!    - skip seeds and movies already pooled
//!    - score it against the seeds with the similarity engine
//!    - pool it if the score reaches the similarity criterion
//! 3. Stop as soon as the pool is full, even in the middle of a year
//! 4. Otherwise move one year back and repeat
//! 5. Give up below `min_year`, returning a partial pool

use crate::seeds::SeedSet;
use crate::similarity::{SIMILARITY_CRITERION, SimilarityEngine};
use anyhow::{Context, Result};
use chrono::Datelike;
use data_loader::{MovieId, RatingStore};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, instrument};

/// Target number of candidates per user
pub const SIMILAR_MOVIE_POOL_SIZE: usize = 50;

/// Oldest release year the search will look at
pub const DEFAULT_MIN_YEAR: u16 = 1900;

/// Whether the search reached its target size
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchOutcome {
    Full,
    /// The catalog ran out above the year bound; holds the pool size
    Partial(usize),
}

/// Movies similar enough to the seeds to be scored.
///
/// Never contains a seed or a duplicate, never exceeds the target size.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidatePool {
    movie_ids: Vec<MovieId>,
    outcome: SearchOutcome,
}

impl CandidatePool {
    pub fn movie_ids(&self) -> &[MovieId] {
        &self.movie_ids
    }

    pub fn outcome(&self) -> SearchOutcome {
        self.outcome
    }

    pub fn len(&self) -> usize {
        self.movie_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.movie_ids.is_empty()
    }

    pub fn into_movie_ids(self) -> Vec<MovieId> {
        self.movie_ids
    }
}

/// Year-by-year candidate search over a rating store
#[derive(Clone)]
pub struct CandidateSearch {
    store: Arc<dyn RatingStore>,
    engine: Arc<dyn SimilarityEngine>,
    pool_size: usize,
    similarity_criterion: f32,
    start_year: Option<u16>,
    min_year: u16,
}

impl CandidateSearch {
    pub fn new(store: Arc<dyn RatingStore>, engine: Arc<dyn SimilarityEngine>) -> Self {
        Self {
            store,
            engine,
            pool_size: SIMILAR_MOVIE_POOL_SIZE,
            similarity_criterion: SIMILARITY_CRITERION,
            start_year: None,
            min_year: DEFAULT_MIN_YEAR,
        }
    }

    /// Configure the target pool size (default: 50)
    pub fn with_pool_size(mut self, pool_size: usize) -> Self {
        self.pool_size = pool_size;
        self
    }

    /// Configure the minimum similarity (default: 0.5)
    pub fn with_similarity_criterion(mut self, criterion: f32) -> Self {
        self.similarity_criterion = criterion;
        self
    }

    /// Start from a fixed year instead of the current calendar year
    pub fn with_start_year(mut self, year: u16) -> Self {
        self.start_year = Some(year);
        self
    }

    /// Configure the oldest year searched (default: 1900)
    pub fn with_min_year(mut self, year: u16) -> Self {
        self.min_year = year;
        self
    }

    /// Collect up to `pool_size` candidates similar to `seeds`.
    ///
    /// Store and similarity failures are returned to the caller.
    #[instrument(skip(self, seeds), fields(seeds = seeds.len()))]
    pub fn search(&self, seeds: &SeedSet) -> Result<CandidatePool> {
        let mut movie_ids: Vec<MovieId> = Vec::with_capacity(self.pool_size);
        let mut pooled: HashSet<MovieId> = HashSet::new();

        if self.pool_size == 0 {
            return Ok(CandidatePool {
                movie_ids,
                outcome: SearchOutcome::Full,
            });
        }

        let mut year = self.start_year.unwrap_or_else(current_year);
        while year >= self.min_year {
            let year_movies = self
                .store
                .get_movie_ids_by_year(year)
                .with_context(|| format!("Failed to fetch movies released in {}", year))?;
            debug!("Scanning {} movies from {}", year_movies.len(), year);

            for movie_id in year_movies {
                if seeds.contains(&movie_id) || pooled.contains(&movie_id) {
                    continue;
                }

                let similarity = self
                    .engine
                    .similarity(seeds, movie_id)
                    .with_context(|| format!("Failed to score movie {}", movie_id))?;

                if similarity >= self.similarity_criterion {
                    pooled.insert(movie_id);
                    movie_ids.push(movie_id);

                    if movie_ids.len() >= self.pool_size {
                        debug!("Pool filled in {}", year);
                        return Ok(CandidatePool {
                            movie_ids,
                            outcome: SearchOutcome::Full,
                        });
                    }
                }
            }

            match year.checked_sub(1) {
                Some(previous) => year = previous,
                None => break,
            }
        }

        debug!(
            "Catalog exhausted at year {} with {} candidates",
            self.min_year,
            movie_ids.len()
        );
        let count = movie_ids.len();
        Ok(CandidatePool {
            movie_ids,
            outcome: SearchOutcome::Partial(count),
        })
    }
}

fn current_year() -> u16 {
    u16::try_from(chrono::Utc::now().year()).unwrap_or(u16::MAX)
}
