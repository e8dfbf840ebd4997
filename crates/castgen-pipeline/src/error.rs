//! Pipeline error types and stage failure mapping.
//!
//! Stage executors never let adapter error types escape: every failure is
//! classified into a `StageFailure` at the stage boundary, persisted on the
//! stage record, and fed to the continuation policy. `PipelineError` covers
//! only faults outside a stage (store access, ownership, configuration).

use thiserror::Error;

use castgen_genai::AdapterError;
use castgen_media::MediaError;
use castgen_models::{StageErrorKind, StageFailure};
use castgen_publish::PublishError;
use castgen_storage::StorageError;
use castgen_store::StoreError;

/// Result type for orchestrator operations.
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Errors outside stage execution.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Job is owned by another worker: {0}")]
    Conflict(String),

    #[error("Job is not runnable: {0}")]
    NotRunnable(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Classify a transcoder failure. The diagnostic (captured stderr) is
/// preserved in the message.
pub fn media_failure(err: MediaError) -> StageFailure {
    match err {
        MediaError::Timeout(secs) => StageFailure::new(
            StageErrorKind::Timeout,
            format!("media operation timed out after {}s", secs),
        ),
        other => {
            let message = match other.diagnostic() {
                Some(diag) => format!("{} ({})", other, diag.trim()),
                None => other.to_string(),
            };
            StageFailure::new(StageErrorKind::MediaExtraction, message)
        }
    }
}

/// Classify an object store failure.
pub fn storage_failure(err: StorageError) -> StageFailure {
    StageFailure::new(StageErrorKind::Storage, err.to_string())
}

/// Classify a generation adapter failure.
pub fn adapter_failure(err: AdapterError) -> StageFailure {
    let kind = match &err {
        AdapterError::InvalidResponse(_) => StageErrorKind::AdapterInvalidResponse,
        _ => StageErrorKind::AdapterNoResponse,
    };
    StageFailure::new(kind, err.to_string())
}

/// Classify a publishing failure.
pub fn publish_failure(err: PublishError) -> StageFailure {
    StageFailure::new(StageErrorKind::Publish, err.to_string())
}

/// Classify a job store failure seen from inside a stage.
pub fn store_failure(err: StoreError) -> StageFailure {
    let kind = if err.is_conflict() {
        StageErrorKind::ConcurrencyConflict
    } else {
        StageErrorKind::Storage
    };
    StageFailure::new(kind, err.to_string())
}

/// A per-call timeout on an external operation.
pub fn timeout_failure(operation: &str, secs: u64) -> StageFailure {
    StageFailure::new(
        StageErrorKind::Timeout,
        format!("{} timed out after {}s", operation, secs),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_media_timeout_maps_to_timeout_kind() {
        let failure = media_failure(MediaError::Timeout(30));
        assert_eq!(failure.kind, StageErrorKind::Timeout);
    }

    #[test]
    fn test_ffmpeg_stderr_is_preserved() {
        let failure = media_failure(MediaError::ffmpeg_failed(
            "exit 1",
            Some("Invalid data found when processing input".to_string()),
            Some(1),
        ));
        assert_eq!(failure.kind, StageErrorKind::MediaExtraction);
        assert!(failure.message.contains("Invalid data found"));
    }

    #[test]
    fn test_adapter_classification() {
        let failure = adapter_failure(AdapterError::invalid("empty text"));
        assert_eq!(failure.kind, StageErrorKind::AdapterInvalidResponse);

        let failure = adapter_failure(AdapterError::NoResponse);
        assert_eq!(failure.kind, StageErrorKind::AdapterNoResponse);

        let failure = adapter_failure(AdapterError::RateLimited);
        assert_eq!(failure.kind, StageErrorKind::AdapterNoResponse);
    }

    #[test]
    fn test_store_conflict_classification() {
        let failure = store_failure(StoreError::LeaseHeld {
            holder: "worker-2".to_string(),
        });
        assert_eq!(failure.kind, StageErrorKind::ConcurrencyConflict);
        assert!(!failure.kind.is_recoverable());
    }
}
