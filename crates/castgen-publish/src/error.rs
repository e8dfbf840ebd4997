//! Publish error types.

use thiserror::Error;

/// Result type for publish operations.
pub type PublishResult<T> = Result<T, PublishError>;

/// Errors from the publishing adapter.
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("Authentication failed: {0}")]
    AuthFailed(String),

    #[error("Upload rejected: {0}")]
    Rejected(String),

    #[error("Caption attach failed: {0}")]
    CaptionFailed(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Remote server error ({status}): {message}")]
    Server { status: u16, message: String },

    #[error("Configuration error: {0}")]
    Config(String),
}

impl PublishError {
    /// Only network failures and remote 5xx responses are worth retrying.
    /// Validation and auth errors are not.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            PublishError::Network(_) | PublishError::Server { .. }
        )
    }
}
