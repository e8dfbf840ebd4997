//! Generation adapter errors.

use thiserror::Error;

/// Result type for adapter calls.
pub type AdapterResult<T> = Result<T, AdapterError>;

/// Errors from the content generation adapter.
#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("Adapter returned no response")]
    NoResponse,

    #[error("Adapter returned an invalid response: {0}")]
    InvalidResponse(String),

    #[error("Adapter rate limited the request")]
    RateLimited,

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl AdapterError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidResponse(msg.into())
    }

    /// Whether retrying the same call may succeed. Rate limits, missing or
    /// malformed responses and transport errors are all worth a bounded
    /// retry; only configuration problems are not.
    pub fn is_transient(&self) -> bool {
        !matches!(self, AdapterError::Config(_))
    }
}
