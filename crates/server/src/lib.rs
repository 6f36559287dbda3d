//! Server crate for the recommender.
//!
//! This crate wires the pipeline stages into a single-user `Recommender`,
//! runs it across every user with the `BatchRunner`, and holds the
//! `RecommenderConfig` both binaries share.

pub mod config;
pub mod orchestrator;
pub mod batch;

pub use batch::{BatchReport, BatchRunner, UserFailure};
pub use config::RecommenderConfig;
pub use orchestrator::Recommender;
