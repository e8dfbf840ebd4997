//! Structured job lifecycle logging.

use tracing::{error, info, warn};

use castgen_models::{JobId, StageFailure, StageId};

/// Logger scoped to one job run.
#[derive(Debug, Clone)]
pub struct JobLogger {
    job_id: String,
}

impl JobLogger {
    pub fn new(job_id: &JobId) -> Self {
        Self {
            job_id: job_id.to_string(),
        }
    }

    pub fn started(&self) {
        info!(job_id = %self.job_id, "Job started");
    }

    pub fn completed(&self, partial_failure: Option<&str>) {
        match partial_failure {
            Some(note) => {
                warn!(job_id = %self.job_id, partial_failure = note, "Job completed with partial failures")
            }
            None => info!(job_id = %self.job_id, "Job completed"),
        }
    }

    pub fn failed(&self, message: &str) {
        error!(job_id = %self.job_id, "Job failed: {}", message);
    }

    pub fn cancelled(&self) {
        info!(job_id = %self.job_id, "Job cancelled");
    }

    pub fn stage_started(&self, stage: StageId) {
        info!(job_id = %self.job_id, stage = %stage, "Stage started");
    }

    pub fn stage_completed(&self, stage: StageId) {
        info!(job_id = %self.job_id, stage = %stage, "Stage completed");
    }

    pub fn stage_failed(&self, stage: StageId, failure: &StageFailure) {
        error!(
            job_id = %self.job_id,
            stage = %stage,
            error_code = %failure.kind,
            "Stage failed: {}", failure.message
        );
    }

    pub fn stage_skipped(&self, stage: StageId, reason: &str) {
        warn!(job_id = %self.job_id, stage = %stage, "Stage skipped: {}", reason);
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }
}
