//! Backfill of missing public ratings.
//!
//! The pipeline asks an `IngestionController` to fetch a movie's public
//! ratings when the store has none. `DumpIngestion` serves those requests
//! from an offline ratings dump (`backfill.dat`) that is not loaded into the
//! store up front.

use crate::error::Result;
use crate::parser;
use crate::store::SharedStore;
use crate::types::{MovieId, PublicRating};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// Dump file read by `DumpIngestion::from_dir`
pub const BACKFILL_FILE: &str = "backfill.dat";

/// On-demand ingestion of one movie's public ratings.
///
/// The call blocks until ingestion finishes; its effect is visible through
/// the store afterwards. Finding no data is not an error.
pub trait IngestionController: Send + Sync {
    fn backfill_public_rating(&self, movie_id: MovieId) -> anyhow::Result<()>;
}

/// Ingestion controller that never finds anything
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopIngestion;

impl IngestionController for NoopIngestion {
    fn backfill_public_rating(&self, movie_id: MovieId) -> anyhow::Result<()> {
        debug!("No ingestion source configured for movie {}", movie_id);
        Ok(())
    }
}

/// Serves backfill requests from an in-memory copy of a ratings dump
pub struct DumpIngestion {
    store: Arc<SharedStore>,
    dump: HashMap<MovieId, Vec<PublicRating>>,
}

impl DumpIngestion {
    pub fn new(store: Arc<SharedStore>, records: Vec<(MovieId, PublicRating)>) -> Self {
        let mut dump: HashMap<MovieId, Vec<PublicRating>> = HashMap::new();
        for (movie_id, rating) in records {
            dump.entry(movie_id).or_default().push(rating);
        }
        Self { store, dump }
    }

    /// Load `backfill.dat` from a data directory; a missing file yields an
    /// empty dump.
    pub fn from_dir(store: Arc<SharedStore>, data_dir: &Path) -> Result<Self> {
        let path = data_dir.join(BACKFILL_FILE);
        if !path.exists() {
            info!("No {} in {:?}, backfill disabled", BACKFILL_FILE, data_dir);
            return Ok(Self::new(store, Vec::new()));
        }
        let records = parser::parse_public_ratings(&path)?;
        info!("Loaded {} backfill ratings", records.len());
        Ok(Self::new(store, records))
    }

    /// Number of movies the dump can backfill
    pub fn len(&self) -> usize {
        self.dump.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dump.is_empty()
    }
}

impl IngestionController for DumpIngestion {
    fn backfill_public_rating(&self, movie_id: MovieId) -> anyhow::Result<()> {
        match self.dump.get(&movie_id) {
            Some(ratings) => {
                self.store.insert_public_ratings(movie_id, ratings)?;
                info!("Backfilled {} public ratings for movie {}", ratings.len(), movie_id);
            }
            None => debug!("Backfill dump has no ratings for movie {}", movie_id),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::RatingStore;
    use crate::types::{DataIndex, Movie, RatingSource};

    fn create_test_store() -> Arc<SharedStore> {
        let mut index = DataIndex::new();
        index.insert_movie(Movie {
            id: 5,
            title: "Alien (1979)".to_string(),
            year: Some(1979),
            genres: vec![],
        });
        Arc::new(SharedStore::new(index))
    }

    #[test]
    fn test_backfill_inserts_dump_ratings() {
        let store = create_test_store();
        let ingestion = DumpIngestion::new(
            store.clone(),
            vec![
                (5, PublicRating::new(RatingSource::Imdb, Some(8.5))),
                (5, PublicRating::new(RatingSource::Douban, Some(8.2))),
                (5, PublicRating::new(RatingSource::Trakt, Some(8.0))),
            ],
        );

        ingestion.backfill_public_rating(5).unwrap();

        let vector = store.get_public_rating(5).unwrap();
        assert_eq!(vector.complete_values(), Some([8.5, 8.2, 8.0]));
    }

    #[test]
    fn test_backfill_without_data_is_not_an_error() {
        let store = create_test_store();
        let ingestion = DumpIngestion::new(store.clone(), Vec::new());

        assert!(ingestion.backfill_public_rating(5).is_ok());
        assert!(store.get_public_rating(5).unwrap().is_empty());
    }

    #[test]
    fn test_from_dir_without_dump() {
        let dir = tempfile::tempdir().unwrap();
        let ingestion = DumpIngestion::from_dir(create_test_store(), dir.path()).unwrap();
        assert!(ingestion.is_empty());
    }
}
