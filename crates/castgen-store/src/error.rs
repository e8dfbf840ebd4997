//! Job store error types.

use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors from the job store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Video not found: {0}")]
    VideoNotFound(String),

    #[error("Job not found: {0}")]
    JobNotFound(String),

    #[error("Metadata not found for job: {0}")]
    MetadataNotFound(String),

    #[error("Stale write: stored version {stored} does not match {attempted}")]
    VersionConflict { stored: u64, attempted: u64 },

    #[error("Job lease held by worker '{holder}'")]
    LeaseHeld { holder: String },

    #[error("Lease not held by this worker")]
    LeaseLost,
}

impl StoreError {
    /// Whether this error means another worker owns the job.
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            StoreError::VersionConflict { .. } | StoreError::LeaseHeld { .. } | StoreError::LeaseLost
        )
    }
}
