//! Stage error kinds.
//!
//! Every stage failure is converted to one of these kinds at the stage
//! boundary and persisted in the stage's outcome record. The orchestrator's
//! continuation policy is driven by this data, not by error types escaping
//! the stage executor.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::stage::StageId;

/// Classified stage error kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageErrorKind {
    /// Transcoder failure (unreadable source, unsupported codec, non-zero exit)
    MediaExtraction,
    /// Generation adapter returned nothing
    AdapterNoResponse,
    /// Generation adapter returned an empty or unparseable response
    AdapterInvalidResponse,
    /// A required upstream stage output is absent
    MissingDependency,
    /// Remote publish failure
    Publish,
    /// Object store read/write failure
    Storage,
    /// An external call exceeded its per-call timeout
    Timeout,
    /// Two workers attempted the same job
    ConcurrencyConflict,
    /// User-initiated cancellation
    Cancelled,
}

impl StageErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StageErrorKind::MediaExtraction => "media_extraction_error",
            StageErrorKind::AdapterNoResponse => "adapter_no_response",
            StageErrorKind::AdapterInvalidResponse => "adapter_invalid_response",
            StageErrorKind::MissingDependency => "missing_dependency",
            StageErrorKind::Publish => "publish_error",
            StageErrorKind::Storage => "storage_error",
            StageErrorKind::Timeout => "timeout",
            StageErrorKind::ConcurrencyConflict => "concurrency_conflict",
            StageErrorKind::Cancelled => "cancelled",
        }
    }

    /// Whether this kind is recoverable for the continuation policy when it
    /// occurs on a recoverable-class stage. Conflicts and cancellations are
    /// never recoverable regardless of the stage's class.
    pub fn is_recoverable(&self) -> bool {
        !matches!(
            self,
            StageErrorKind::ConcurrencyConflict | StageErrorKind::Cancelled
        )
    }
}

impl fmt::Display for StageErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A persisted stage failure: kind plus human-readable message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageFailure {
    /// Classified error kind
    pub kind: StageErrorKind,
    /// Diagnostic message (transcoder stderr, adapter body, etc.)
    pub message: String,
}

impl StageFailure {
    pub fn new(kind: StageErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// A missing-dependency failure naming the absent upstream stage.
    pub fn missing_dependency(required: StageId) -> Self {
        Self::new(
            StageErrorKind::MissingDependency,
            format!("required output of stage '{}' is not available", required),
        )
    }
}

impl fmt::Display for StageFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}
