//! Video job records: one pipeline run bound 1:1 to a video.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

use crate::error::StageFailure;
use crate::stage::StageId;
use crate::video::VideoId;

/// Unique identifier for a job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Generate a new random job ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Overall job status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Job is waiting for a worker
    #[default]
    Pending,
    /// Job is being processed
    Processing,
    /// Every fatal-class stage succeeded
    Completed,
    /// A fatal-class stage failed, the job was cancelled, or retries ran out
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Per-stage status. Entries only move forward; a `Completed` stage is
/// never reset except by an explicit retry operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    #[default]
    Pending,
    InProgress,
    Completed,
    Error,
}

impl StageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StageStatus::Pending => "pending",
            StageStatus::InProgress => "in_progress",
            StageStatus::Completed => "completed",
            StageStatus::Error => "error",
        }
    }

    /// Whether `to` is a legal forward transition from this status.
    /// Dependency short-circuits may fail a stage straight from `Pending`.
    pub fn can_transition(&self, to: StageStatus) -> bool {
        matches!(
            (self, to),
            (StageStatus::Pending, StageStatus::InProgress)
                | (StageStatus::Pending, StageStatus::Error)
                | (StageStatus::InProgress, StageStatus::Completed)
                | (StageStatus::InProgress, StageStatus::Error)
        )
    }
}

impl fmt::Display for StageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Outcome record for one stage.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StageRecord {
    /// Current status
    pub status: StageStatus,
    /// Stage-local progress (0-100)
    pub progress: u8,
    /// Failure detail, set only when status is `Error`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<StageFailure>,
}

/// One pipeline run for a single uploaded video.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoJob {
    /// Unique job ID
    pub id: JobId,

    /// Video this run is bound to
    pub video_id: VideoId,

    /// Overall status
    #[serde(default)]
    pub status: JobStatus,

    /// Ordered map of stage outcome records
    pub processing_stages: BTreeMap<StageId, StageRecord>,

    /// Error message, set only when status is `Failed`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,

    /// Partial-failure note, set when recoverable stages failed but the
    /// job still completed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub partial_failure: Option<String>,

    /// Remote video ID recorded by a successful publish. A retry with this
    /// set must not repeat the upload call.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote_video_id: Option<String>,

    /// User-requested cancellation flag, honored between external calls
    #[serde(default)]
    pub cancel_requested: bool,

    /// Optimistic concurrency version, bumped by the job store on write
    #[serde(default)]
    pub version: u64,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl VideoJob {
    /// Create a new pending job with every stage `Pending`.
    pub fn new(video_id: VideoId) -> Self {
        let now = Utc::now();
        let processing_stages = StageId::ALL
            .iter()
            .map(|id| (*id, StageRecord::default()))
            .collect();

        Self {
            id: JobId::new(),
            video_id,
            status: JobStatus::Pending,
            processing_stages,
            error_message: None,
            partial_failure: None,
            remote_video_id: None,
            cancel_requested: false,
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Get a stage's outcome record. Missing entries (a job deserialized
    /// from an older record) read as `Pending`.
    pub fn stage(&self, id: StageId) -> StageRecord {
        self.processing_stages.get(&id).cloned().unwrap_or_default()
    }

    /// Whether a stage has completed.
    pub fn stage_completed(&self, id: StageId) -> bool {
        self.stage(id).status == StageStatus::Completed
    }

    /// Move a stage forward. Returns `false` (and leaves the record
    /// untouched) when the transition would go backwards.
    pub fn transition_stage(&mut self, id: StageId, to: StageStatus) -> bool {
        let record = match self.processing_stages.get_mut(&id) {
            Some(r) => r,
            None => return false,
        };
        if !record.status.can_transition(to) {
            return false;
        }
        record.status = to;
        if to == StageStatus::Completed {
            record.progress = 100;
            record.error = None;
        }
        self.updated_at = Utc::now();
        true
    }

    /// Record a stage failure.
    pub fn fail_stage(&mut self, id: StageId, failure: StageFailure) -> bool {
        if !self.transition_stage(id, StageStatus::Error) {
            return false;
        }
        if let Some(record) = self.processing_stages.get_mut(&id) {
            record.error = Some(failure);
        }
        true
    }

    /// Mark the job as processing.
    pub fn start(&mut self) {
        self.status = JobStatus::Processing;
        self.error_message = None;
        self.updated_at = Utc::now();
    }

    /// Mark the job completed, noting any recoverable stage failures.
    pub fn complete(&mut self) {
        self.status = JobStatus::Completed;
        let failed: Vec<&str> = self
            .processing_stages
            .iter()
            .filter(|(_, r)| r.status == StageStatus::Error)
            .map(|(id, _)| id.as_str())
            .collect();
        self.partial_failure = if failed.is_empty() {
            None
        } else {
            Some(format!("stages failed: {}", failed.join(", ")))
        };
        self.updated_at = Utc::now();
    }

    /// Mark the job failed with an error message.
    pub fn fail(&mut self, error: impl Into<String>) {
        self.status = JobStatus::Failed;
        self.error_message = Some(error.into());
        self.updated_at = Utc::now();
    }

    /// Reset for an explicit retry: stages in `Error` or never attempted go
    /// back to `Pending`; completed stages and their outputs are preserved.
    /// Only valid on a `Failed` job.
    pub fn reset_for_retry(&mut self) {
        for record in self.processing_stages.values_mut() {
            if record.status != StageStatus::Completed {
                *record = StageRecord::default();
            }
        }
        self.status = JobStatus::Processing;
        self.error_message = None;
        self.partial_failure = None;
        self.cancel_requested = false;
        self.updated_at = Utc::now();
    }

    /// Aggregate display progress (0-100), weighted by the fixed per-stage
    /// weights. Monotonically non-decreasing within a run.
    pub fn aggregate_progress(&self) -> u8 {
        let total = StageId::total_weight() as u64;
        let mut earned: u64 = 0;
        for (id, record) in &self.processing_stages {
            let weight = id.spec().weight as u64;
            earned += match record.status {
                StageStatus::Completed | StageStatus::Error => weight * 100,
                StageStatus::InProgress => weight * record.progress.min(100) as u64,
                StageStatus::Pending => 0,
            };
        }
        (earned / total).min(100) as u8
    }

    /// First stage that has not completed, in execution order.
    pub fn first_incomplete_stage(&self) -> Option<StageId> {
        StageId::ALL
            .iter()
            .copied()
            .find(|id| !self.stage_completed(*id))
    }
}
