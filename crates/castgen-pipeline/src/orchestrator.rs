//! Pipeline orchestrator.
//!
//! Owns the job lifecycle: lease acquisition, stage sequencing, the
//! continuation policy, cancellation checks, event emission and final
//! status. Every stage outcome is persisted before the pipeline advances,
//! so a crashed worker resumes from the last completed stage.

use std::sync::Arc;

use tracing::{info, warn};
use uuid::Uuid;

use castgen_models::{
    JobEvent, JobId, JobStatus, StageErrorKind, StageFailure, StageId, StageStatus, UploadComplete,
    Video, VideoJob,
};
use castgen_store::{Lease, StoreError};

use crate::context::{PipelineDeps, StageContext};
use crate::error::{PipelineError, PipelineResult};
use crate::logging::JobLogger;
use crate::stages;

/// Stateless job runner; all state lives in the job store.
pub struct Pipeline {
    deps: Arc<PipelineDeps>,
    worker_id: String,
}

impl Pipeline {
    pub fn new(deps: PipelineDeps) -> Self {
        Self {
            deps: Arc::new(deps),
            worker_id: format!("worker-{}", Uuid::new_v4()),
        }
    }

    /// Override the generated worker identity (used by tests).
    pub fn with_worker_id(mut self, worker_id: impl Into<String>) -> Self {
        self.worker_id = worker_id.into();
        self
    }

    pub fn deps(&self) -> &PipelineDeps {
        &self.deps
    }

    /// React to an upload-complete event: create the video row if needed
    /// and the job idempotently. Duplicate delivery returns the active job.
    pub async fn handle_upload_complete(
        &self,
        user_id: &str,
        event: &UploadComplete,
    ) -> PipelineResult<VideoJob> {
        match self.deps.store.get_video(&event.video_id).await {
            Ok(_) => {}
            Err(StoreError::VideoNotFound(_)) => {
                self.deps
                    .store
                    .create_video(Video::from_upload(user_id, event))
                    .await?;
            }
            Err(e) => return Err(e.into()),
        }

        let outcome = self.deps.store.create_job(&event.video_id).await?;
        Ok(outcome.job().clone())
    }

    /// Set the cancel flag on a job. Returns `false` when the job had
    /// already reached a terminal status.
    pub async fn cancel_job(&self, job_id: &JobId) -> PipelineResult<bool> {
        Ok(self.deps.store.request_cancel(job_id).await?)
    }

    /// Retry a failed job: failed and never-run stages go back to pending,
    /// completed stages and their outputs stay untouched.
    pub async fn retry_job(&self, job_id: &JobId) -> PipelineResult<()> {
        let mut job = self.deps.store.get_job(job_id).await?;
        if job.status != JobStatus::Failed {
            return Err(PipelineError::NotRunnable(format!(
                "retry requires a failed job, status is {}",
                job.status
            )));
        }
        job.reset_for_retry();
        self.deps.store.update_job(&mut job).await?;
        self.run_job(job_id).await
    }

    /// Run a job to a terminal state.
    ///
    /// A `LeaseHeld` answer from the store aborts before any mutation: the
    /// racing worker loses cleanly with `PipelineError::Conflict`.
    pub async fn run_job(&self, job_id: &JobId) -> PipelineResult<()> {
        let job = self.deps.store.get_job(job_id).await?;
        if job.status.is_terminal() {
            return Err(PipelineError::NotRunnable(format!(
                "job is already {}",
                job.status
            )));
        }

        let lease = match self
            .deps
            .store
            .acquire_lease(job_id, &self.worker_id, self.deps.config.lease_ttl())
            .await
        {
            Ok(lease) => lease,
            Err(StoreError::LeaseHeld { holder }) => {
                return Err(PipelineError::Conflict(format!(
                    "job {} is leased by {}",
                    job_id, holder
                )));
            }
            Err(e) => return Err(e.into()),
        };

        let mut job = job;
        let result = self.run_leased(&mut job, lease).await;

        // Release by identity; renewals inside the run do not change it.
        let release = Lease {
            job_id: job_id.clone(),
            worker_id: self.worker_id.clone(),
            expires_at: chrono::Utc::now(),
        };
        let _ = self.deps.store.release_lease(&release).await;
        let work_dir = self.deps.config.work_dir.join(job_id.as_str());
        let _ = tokio::fs::remove_dir_all(&work_dir).await;
        result
    }

    async fn run_leased(&self, job: &mut VideoJob, mut lease: Lease) -> PipelineResult<()> {
        let logger = JobLogger::new(&job.id);
        let mut video = self.deps.store.get_video(&job.video_id).await?;
        let mut metadata = self.deps.store.get_metadata(&job.id).await?;

        job.start();
        self.deps.store.update_job(job).await?;
        self.deps.bus.publish(JobEvent::job_update(job));
        logger.started();

        let mut last_progress = job.aggregate_progress();

        for stage in StageId::ALL {
            if job.stage_completed(stage) {
                continue;
            }

            lease = self
                .deps
                .store
                .renew_lease(&lease, self.deps.config.lease_ttl())
                .await
                .map_err(|_| {
                    PipelineError::Conflict(format!("lease on job {} was taken over", job.id))
                })?;

            self.absorb_external_writes(job).await?;
            if job.cancel_requested {
                return self.finish_cancelled(job, stage, &logger).await;
            }

            if let Some(missing) = stage
                .spec()
                .requires
                .iter()
                .copied()
                .find(|req| !job.stage_completed(*req))
            {
                let failure = StageFailure::missing_dependency(missing);
                job.fail_stage(stage, failure.clone());
                self.deps.store.update_job(job).await?;
                self.emit_stage(job, stage, Some(&failure));
                logger.stage_skipped(stage, &failure.message);
                if stage.is_fatal() {
                    return self.finish_failed(job, stage, &failure, &logger).await;
                }
                // An errored stage counts toward aggregate progress
                let progress = job.aggregate_progress();
                if progress != last_progress {
                    last_progress = progress;
                    self.deps.bus.publish(JobEvent::job_update(job));
                }
                continue;
            }

            job.transition_stage(stage, StageStatus::InProgress);
            self.deps.store.update_job(job).await?;
            self.deps.bus.publish(JobEvent::stage_update(job, stage));
            logger.stage_started(stage);

            let outcome = {
                let mut ctx = StageContext {
                    job,
                    video: &mut video,
                    metadata: &mut metadata,
                    deps: &self.deps,
                    logger: &logger,
                };
                stages::execute(stage, &mut ctx).await
            };

            // A cancel landing while the stage ran bumps the stored
            // version; absorb it before the next write and honor it here.
            self.absorb_external_writes(job).await?;
            if job.cancel_requested {
                return self.finish_cancelled(job, stage, &logger).await;
            }

            match outcome {
                Ok(()) => {
                    job.transition_stage(stage, StageStatus::Completed);
                    self.deps.store.update_job(job).await?;
                    self.deps.bus.publish(JobEvent::stage_update(job, stage));
                    logger.stage_completed(stage);

                    let progress = job.aggregate_progress();
                    if progress != last_progress {
                        last_progress = progress;
                        self.deps.bus.publish(JobEvent::job_update(job));
                    }
                }
                Err(failure) => {
                    job.fail_stage(stage, failure.clone());
                    self.deps.store.update_job(job).await?;
                    self.emit_stage(job, stage, Some(&failure));
                    logger.stage_failed(stage, &failure);

                    if stage.is_fatal() || !failure.kind.is_recoverable() {
                        return self.finish_failed(job, stage, &failure, &logger).await;
                    }
                    // The run continues; an errored stage still moves
                    // aggregate progress forward
                    let progress = job.aggregate_progress();
                    if progress != last_progress {
                        last_progress = progress;
                        self.deps.bus.publish(JobEvent::job_update(job));
                    }
                }
            }
        }

        job.complete();
        self.deps.store.update_job(job).await?;
        self.deps.bus.publish(JobEvent::job_update(job));
        logger.completed(job.partial_failure.as_deref());
        Ok(())
    }

    /// The cancel flag is the only field another writer touches while the
    /// lease is held, but setting it bumps the stored version. Absorb both
    /// so the next optimistic write goes through.
    async fn absorb_external_writes(&self, job: &mut VideoJob) -> PipelineResult<()> {
        let stored = self.deps.store.get_job(&job.id).await?;
        job.cancel_requested = stored.cancel_requested;
        job.version = stored.version;
        Ok(())
    }

    async fn finish_cancelled(
        &self,
        job: &mut VideoJob,
        stage: StageId,
        logger: &JobLogger,
    ) -> PipelineResult<()> {
        let failure = StageFailure::new(StageErrorKind::Cancelled, "cancelled by user");
        job.fail_stage(stage, failure.clone());
        job.fail(format!("{}: cancelled by user", stage));
        self.deps.store.update_job(job).await?;
        self.emit_stage(job, stage, Some(&failure));
        self.deps.bus.publish(JobEvent::job_update(job));
        logger.cancelled();
        Ok(())
    }

    async fn finish_failed(
        &self,
        job: &mut VideoJob,
        stage: StageId,
        failure: &StageFailure,
        logger: &JobLogger,
    ) -> PipelineResult<()> {
        job.fail(format!("{}: {}", stage, failure.message));
        self.deps.store.update_job(job).await?;
        self.deps.bus.publish(JobEvent::job_update(job));
        logger.failed(&format!("{}: {}", stage, failure.message));
        Ok(())
    }

    fn emit_stage(&self, job: &VideoJob, stage: StageId, failure: Option<&StageFailure>) {
        self.deps.bus.publish(JobEvent::stage_update(job, stage));
        if let Some(failure) = failure {
            self.deps
                .bus
                .publish(JobEvent::error(job.id.clone(), failure, Some(stage)));
        }
    }
}

/// Log helper for run outcomes at the worker loop.
pub fn log_run_result(job_id: &JobId, result: &PipelineResult<()>) {
    match result {
        Ok(()) => {}
        Err(PipelineError::Conflict(msg)) => {
            info!(job_id = %job_id, "Skipped job: {}", msg);
        }
        Err(e) => {
            warn!(job_id = %job_id, "Job run failed: {}", e);
        }
    }
}
