//! Batch runner: refresh the saved recommendations of every user.
//!
//! Each user runs in its own blocking task. A user whose pipeline fails,
//! panics or runs past the per-user timeout is logged and reported; the rest
//! of the batch carries on.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use serde::Serialize;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{info, instrument, warn};

use data_loader::UserId;

use crate::config::{DEFAULT_CONCURRENCY, DEFAULT_USER_TIMEOUT_SECS};
use crate::orchestrator::Recommender;

/// A user whose recommendations could not be refreshed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserFailure {
    pub user_id: UserId,
    pub reason: String,
}

/// Outcome of one batch run
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchReport {
    /// Users whose recommendations were saved, in id order
    pub succeeded: Vec<UserId>,
    /// Users that failed, in id order
    pub failed: Vec<UserFailure>,
    /// Recommendations saved across all users
    pub saved_entries: usize,
    pub elapsed: Duration,
}

impl BatchReport {
    pub fn total(&self) -> usize {
        self.succeeded.len() + self.failed.len()
    }

    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    /// Record every listed user that has no outcome yet as failed
    fn fail_unreported(&mut self, users: &[UserId]) {
        let reported: BTreeSet<UserId> = self
            .succeeded
            .iter()
            .copied()
            .chain(self.failed.iter().map(|failure| failure.user_id))
            .collect();

        for &user_id in users.iter().filter(|id| !reported.contains(id)) {
            warn!("No result for user {}", user_id);
            self.failed.push(UserFailure {
                user_id,
                reason: "batch task ended without a result".to_string(),
            });
        }
    }
}

pub struct BatchRunner {
    recommender: Arc<Recommender>,
    concurrency: usize,
    user_timeout: Duration,
}

impl BatchRunner {
    pub fn new(recommender: Arc<Recommender>) -> Self {
        Self {
            recommender,
            concurrency: DEFAULT_CONCURRENCY,
            user_timeout: Duration::from_secs(DEFAULT_USER_TIMEOUT_SECS),
        }
    }

    /// Configure how long one user's pipeline may run (default: 300s).
    ///
    /// A timed-out user is reported as failed and frees its concurrency
    /// slot; its blocking thread is left to finish in the background.
    pub fn with_user_timeout(mut self, timeout: Duration) -> Self {
        self.user_timeout = timeout;
        self
    }

    /// Configure how many users are processed at once (default: 4)
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Update the recommendations of every user in the store.
    ///
    /// Only a failure to list the users fails the run itself.
    #[instrument(skip(self), fields(concurrency = self.concurrency))]
    pub async fn run(&self) -> Result<BatchReport> {
        let start_time = Instant::now();

        let recommender = self.recommender.clone();
        let users = tokio::task::spawn_blocking(move || recommender.store().get_users())
            .await
            .context("User listing task panicked")?
            .context("Failed to list users")?;
        info!("Starting batch for {} users", users.len());

        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut tasks: JoinSet<(UserId, Result<usize>)> = JoinSet::new();
        let user_timeout = self.user_timeout;

        for &user_id in &users {
            let permit = semaphore
                .clone()
                .acquire_owned()
                .await
                .context("Batch semaphore closed")?;
            let recommender = self.recommender.clone();

            tasks.spawn(async move {
                let _permit = permit;
                let handle = tokio::task::spawn_blocking(move || {
                    recommender.update_single_user_recommendations(user_id)
                });

                let result = match tokio::time::timeout(user_timeout, handle).await {
                    Ok(Ok(result)) => result,
                    Ok(Err(e)) if e.is_panic() => Err(anyhow::anyhow!("pipeline panicked")),
                    Ok(Err(e)) => Err(anyhow::anyhow!("pipeline task failed: {}", e)),
                    Err(_) => Err(anyhow::anyhow!(
                        "pipeline timed out after {:.2?}",
                        user_timeout
                    )),
                };
                (user_id, result)
            });
        }

        let mut report = BatchReport::default();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((user_id, Ok(saved))) => {
                    report.succeeded.push(user_id);
                    report.saved_entries += saved;
                }
                Ok((user_id, Err(e))) => {
                    warn!("Failed to update recommendations of user {}: {:#}", user_id, e);
                    report.failed.push(UserFailure {
                        user_id,
                        reason: format!("{:#}", e),
                    });
                }
                Err(e) => warn!("Batch task failed: {}", e),
            }
        }

        report.fail_unreported(&users);

        report.succeeded.sort_unstable();
        report.failed.sort_by_key(|failure| failure.user_id);
        report.elapsed = start_time.elapsed();

        info!(
            "Batch finished in {:.2?}: {} succeeded, {} failed, {} recommendations saved",
            report.elapsed,
            report.succeeded.len(),
            report.failed.len(),
            report.saved_entries
        );
        Ok(report)
    }
}
