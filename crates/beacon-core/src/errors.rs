//! Error types for the foundation crate.

use thiserror::Error;

/// Result alias for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;

/// Errors produced by foundation-level validation.
///
/// Ingestion paths absorb these (log and drop the offending record); they
/// only surface through APIs that return `Result`, such as config loading.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A record failed validation before reaching the queue.
    #[error("invalid record: {0}")]
    InvalidRecord(String),

    /// Configuration value rejected.
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    /// JSON (de)serialization failure.
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
