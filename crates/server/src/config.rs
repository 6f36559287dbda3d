//! Recommender configuration.
//!
//! Every field defaults to the pipeline's built-in constant, so a JSON file
//! only needs the values it changes:
//!
//! ```json
//! { "pool_size": 30, "concurrency": 8 }
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default number of users processed at once by the batch runner
pub const DEFAULT_CONCURRENCY: usize = 4;

/// Default delay between two `recsd` batch runs
pub const DEFAULT_INTERVAL_SECS: u64 = 3600;

/// Default limit on one user's pipeline within a batch
pub const DEFAULT_USER_TIMEOUT_SECS: u64 = 300;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecommenderConfig {
    /// Minimum user rating for a history movie to become a seed
    pub seed_criterion: f32,
    /// Minimum similarity for a movie to enter the candidate pool
    pub similarity_criterion: f32,
    pub pool_size: usize,
    /// Oldest release year searched
    pub min_year: u16,
    /// Year the search starts from; the current year when unset
    pub start_year: Option<u16>,
    /// Predicted scores must be strictly above this
    pub recommend_criterion: f32,
    pub backfill_attempts: usize,
    pub concurrency: usize,
    pub interval_secs: u64,
    /// Seconds one user's pipeline may run before the batch gives up on it
    pub user_timeout_secs: u64,
}

impl Default for RecommenderConfig {
    fn default() -> Self {
        Self {
            seed_criterion: sources::USER_RATINGS_CRITERION,
            similarity_criterion: sources::SIMILARITY_CRITERION,
            pool_size: sources::SIMILAR_MOVIE_POOL_SIZE,
            min_year: sources::DEFAULT_MIN_YEAR,
            start_year: None,
            recommend_criterion: pipeline::RECOMMEND_CRITERION,
            backfill_attempts: pipeline::DEFAULT_BACKFILL_ATTEMPTS,
            concurrency: DEFAULT_CONCURRENCY,
            interval_secs: DEFAULT_INTERVAL_SECS,
            user_timeout_secs: DEFAULT_USER_TIMEOUT_SECS,
        }
    }
}

impl RecommenderConfig {
    /// Read a JSON configuration file; missing fields keep their defaults
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {:?}", path))?;
        let config: Self = serde_json::from_str(&contents)
            .with_context(|| format!("Invalid config file {:?}", path))?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults, or the contents of `path` when one is given
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.concurrency == 0 {
            anyhow::bail!("concurrency must be at least 1");
        }
        if self.user_timeout_secs == 0 {
            anyhow::bail!("user_timeout_secs must be at least 1");
        }
        if let Some(start_year) = self.start_year {
            if start_year < self.min_year {
                anyhow::bail!(
                    "start_year {} is older than min_year {}",
                    start_year,
                    self.min_year
                );
            }
        }
        Ok(())
    }
}
