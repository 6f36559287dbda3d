//! Example: Build the candidate pool for a user
//!
//! Run with: cargo run --package sources --example search_candidates -- data/store 8
//!
//! This example shows how to:
//! 1. Load a store directory
//! 2. Extract seeds from a user's history
//! 3. Run the year-windowed candidate search
//! 4. Display the pool

use anyhow::Context;
use data_loader::{DataIndex, RatingStore, SharedStore};
use sources::{CandidateSearch, GenreSimilarity, SeedExtractor};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter("info,sources=debug").init();

    let mut args = std::env::args().skip(1);
    let data_dir = PathBuf::from(args.next().unwrap_or_else(|| "data/store".to_string()));
    let user_id: u32 = args
        .next()
        .unwrap_or_else(|| "1".to_string())
        .parse()
        .context("user id must be a number")?;

    let index = DataIndex::load_from_files(&data_dir)?;
    let store: Arc<dyn RatingStore> = Arc::new(SharedStore::new(index));

    let history = store.get_user_history(user_id)?;
    let seeds = SeedExtractor::new().extract(&history);
    println!("User {} rated {} movies, {} seeds", user_id, history.len(), seeds.len());

    let engine = Arc::new(GenreSimilarity::new(store.clone()));
    let start = Instant::now();
    let pool = CandidateSearch::new(store.clone(), engine).search(&seeds)?;
    println!("Search finished in {:?} ({:?})", start.elapsed(), pool.outcome());

    for (rank, movie_id) in pool.movie_ids().iter().enumerate() {
        let title = store
            .get_movie(*movie_id)?
            .map(|m| m.title)
            .unwrap_or_else(|| "<unknown>".to_string());
        println!("{:>3}. [{}] {}", rank + 1, movie_id, title);
    }

    Ok(())
}
