//! Unified error types for the rollup engine.

use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Unified error type for the rollup engine.
///
/// Batch operations (rollup build, retention sweep) treat any error as fatal
/// to that run; idempotent upserts and predicate-scoped deletes make a
/// retried run converge. Read-path errors propagate to the caller without
/// retries.
#[derive(Debug, Error)]
pub enum Error {
    /// The underlying store could not be reached or rejected an operation.
    #[error("storage unavailable: {0}")]
    Storage(String),

    /// A read query failed after reaching the store.
    #[error("query failed: {0}")]
    Query(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    pub fn query(msg: impl Into<String>) -> Self {
        Self::Query(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Whether a retried run can be expected to succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Storage(_) | Self::Query(_))
    }
}
