//! `recsd`: refreshes every user's recommendations on a fixed interval.
//!
//! Environment:
//! - `RECSD_DATA_DIR`: data directory (default `data/store`)
//! - `RECSD_CONFIG`: optional JSON configuration file
//! - `RUST_LOG`: log filter (default `info`)

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use server::{BatchRunner, Recommender, RecommenderConfig};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let data_dir = PathBuf::from(
        std::env::var("RECSD_DATA_DIR").unwrap_or_else(|_| "data/store".to_string()),
    );
    let config_path = std::env::var_os("RECSD_CONFIG").map(PathBuf::from);
    let config = RecommenderConfig::load(config_path.as_deref())?;
    info!("Starting recsd with {:?}", config);

    let (_store, recommender) = Recommender::from_data_dir(&data_dir, &config)?;
    let runner = BatchRunner::new(Arc::new(recommender))
        .with_concurrency(config.concurrency)
        .with_user_timeout(Duration::from_secs(config.user_timeout_secs));

    let mut ticker = tokio::time::interval(Duration::from_secs(config.interval_secs.max(1)));
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match runner.run().await {
                    Ok(report) if report.is_success() => {
                        info!("Updated {} users", report.succeeded.len());
                    }
                    Ok(report) => {
                        warn!(
                            "{} of {} users failed this run",
                            report.failed.len(),
                            report.total()
                        );
                    }
                    Err(e) => warn!("Batch run failed: {:#}", e),
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Shutting down");
                break;
            }
        }
    }

    Ok(())
}
