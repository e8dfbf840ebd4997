//! Worker loop: polls the store for pending jobs and runs them.

use std::sync::Arc;

use tokio::sync::{watch, Semaphore};
use tokio::time::interval;
use tracing::{error, info};

use crate::orchestrator::{log_run_result, Pipeline};

/// Polls for runnable jobs and runs each on its own task, bounded by a
/// concurrency semaphore.
pub struct Worker {
    pipeline: Arc<Pipeline>,
}

impl Worker {
    pub fn new(pipeline: Arc<Pipeline>) -> Self {
        Self { pipeline }
    }

    /// Run until the shutdown signal flips, then drain in-flight jobs.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let config = self.pipeline.deps().config.clone();
        let semaphore = Arc::new(Semaphore::new(config.max_concurrent_jobs));
        let mut poll = interval(config.poll_interval);

        info!(
            max_jobs = config.max_concurrent_jobs,
            poll_secs = config.poll_interval.as_secs(),
            "Worker started"
        );

        loop {
            tokio::select! {
                _ = poll.tick() => {
                    let mut runnable = match self.pipeline.deps().store.list_pending_jobs().await {
                        Ok(jobs) => jobs,
                        Err(e) => {
                            error!("Failed to list pending jobs: {}", e);
                            continue;
                        }
                    };
                    // Jobs orphaned by a crashed worker resume via lease
                    // takeover in run_job.
                    match self.pipeline.deps().store.list_stale_jobs().await {
                        Ok(stale) => runnable.extend(stale),
                        Err(e) => error!("Failed to list stale jobs: {}", e),
                    }

                    for job_id in runnable {
                        let permit = match semaphore.clone().try_acquire_owned() {
                            Ok(permit) => permit,
                            // At capacity; the next poll picks the job up
                            Err(_) => break,
                        };
                        let pipeline = self.pipeline.clone();
                        tokio::spawn(async move {
                            let result = pipeline.run_job(&job_id).await;
                            log_run_result(&job_id, &result);
                            drop(permit);
                        });
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        info!("Worker draining in-flight jobs");
        let drained = tokio::time::timeout(
            config.shutdown_timeout,
            semaphore.acquire_many(config.max_concurrent_jobs as u32),
        )
        .await;
        match drained {
            Ok(_) => info!("Worker stopped"),
            Err(_) => error!(
                "Shutdown timeout after {:?}, abandoning in-flight jobs",
                config.shutdown_timeout
            ),
        }
    }
}
