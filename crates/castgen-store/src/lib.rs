//! Durable job store.
//!
//! Single source of truth for pipeline state: videos, jobs and metadata.
//! Orchestrator instances are stateless workers; every mutation is
//! reconciled here before the pipeline advances, writes to a job row are
//! guarded by an optimistic version check, and a per-job lease keeps two
//! workers from double-processing the same job.

pub mod error;
pub mod memory;

pub use error::{StoreError, StoreResult};
pub use memory::InMemoryJobStore;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};

use castgen_models::{JobId, Video, VideoId, VideoJob, VideoMetadata};

/// Ownership token for one job run.
#[derive(Debug, Clone)]
pub struct Lease {
    /// Leased job
    pub job_id: JobId,
    /// Holding worker
    pub worker_id: String,
    /// Expiry; an expired lease may be taken over by another worker
    pub expires_at: DateTime<Utc>,
}

impl Lease {
    pub fn is_expired(&self) -> bool {
        self.expires_at <= Utc::now()
    }
}

/// Outcome of idempotent job creation.
#[derive(Debug, Clone)]
pub enum CreateJobOutcome {
    /// A new job (and empty metadata record) was created
    Created(VideoJob),
    /// The video already has a non-terminal job; it is returned unchanged
    AlreadyActive(VideoJob),
}

impl CreateJobOutcome {
    /// The job, whichever way it was obtained.
    pub fn job(&self) -> &VideoJob {
        match self {
            CreateJobOutcome::Created(job) | CreateJobOutcome::AlreadyActive(job) => job,
        }
    }
}

/// Interface to the job store.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Persist a new video record.
    async fn create_video(&self, video: Video) -> StoreResult<()>;

    /// Fetch a video.
    async fn get_video(&self, id: &VideoId) -> StoreResult<Video>;

    /// Overwrite a video record (derived-field writes).
    async fn update_video(&self, video: Video) -> StoreResult<()>;

    /// Create a job for a video, or return the existing active one.
    /// Enforces at most one non-terminal job per video.
    async fn create_job(&self, video_id: &VideoId) -> StoreResult<CreateJobOutcome>;

    /// Fetch a job.
    async fn get_job(&self, id: &JobId) -> StoreResult<VideoJob>;

    /// Write a job row. Fails with `VersionConflict` when the stored
    /// version has moved past the caller's copy; on success the caller's
    /// copy receives the bumped version.
    async fn update_job(&self, job: &mut VideoJob) -> StoreResult<()>;

    /// Fetch a job's metadata record.
    async fn get_metadata(&self, job_id: &JobId) -> StoreResult<VideoMetadata>;

    /// Overwrite a job's metadata record.
    async fn update_metadata(&self, metadata: VideoMetadata) -> StoreResult<()>;

    /// Acquire the run lease for a job. Fails with `LeaseHeld` while an
    /// unexpired lease belongs to another worker; expired leases are
    /// taken over.
    async fn acquire_lease(
        &self,
        job_id: &JobId,
        worker_id: &str,
        ttl: Duration,
    ) -> StoreResult<Lease>;

    /// Extend a held lease.
    async fn renew_lease(&self, lease: &Lease, ttl: Duration) -> StoreResult<Lease>;

    /// Release a held lease.
    async fn release_lease(&self, lease: &Lease) -> StoreResult<()>;

    /// Set the cancel flag on a job. Returns `false` when the job is
    /// already terminal.
    async fn request_cancel(&self, job_id: &JobId) -> StoreResult<bool>;

    /// Jobs waiting for a worker, oldest first.
    async fn list_pending_jobs(&self) -> StoreResult<Vec<JobId>>;

    /// Jobs stuck in `Processing` with a missing or expired lease (their
    /// worker died mid-run), oldest first. Eligible for lease takeover.
    async fn list_stale_jobs(&self) -> StoreResult<Vec<JobId>>;
}
