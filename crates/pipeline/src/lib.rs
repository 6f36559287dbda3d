//! Scoring and assembly of a user's recommendations.
//!
//! This crate provides:
//! - `ScaleModel`, a per-user linear mapping from public ratings to the
//!   score the user would give
//! - `RecommendationAssembler`, which backfills, scores and thresholds a
//!   candidate pool
//!
//! ## Architecture
//! The pipeline processes one user in stages:
//! 1. The scale model is trained on the user's rated history
//! 2. Each candidate's public ratings are fetched (and backfilled if absent)
//! 3. Candidates with complete ratings are scored by the model
//! 4. Candidates scoring above 7.0 become recommendations
//!
//! ## Example Usage
//! ```ignore
//! use pipeline::{LeastSquares, RecommendationAssembler, ScaleModel};
//!
//! let model = ScaleModel::train(store.as_ref(), &history, &LeastSquares::new())?;
//! let assembler = RecommendationAssembler::new(store.clone(), ingestion);
//! let recommendations = assembler.assemble(pool.movie_ids(), &model)?;
//! ```

pub mod scale;
pub mod assembler;

// Re-export main types
pub use scale::{LeastSquares, LinearFit, LinearModel, ScaleModel, TrainingExample};
pub use assembler::{DEFAULT_BACKFILL_ATTEMPTS, RECOMMEND_CRITERION, RecommendationAssembler};
