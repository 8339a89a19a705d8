//! Agent error types.

use thiserror::Error;

/// Result alias for agent operations.
pub type Result<T> = std::result::Result<T, AgentError>;

/// Errors surfaced by the agent's fallible surface (`new`, `flush`,
/// `shutdown`). Ingestion calls never return these — validation and
/// capacity failures are absorbed and logged per the error taxonomy.
#[derive(Debug, Error)]
pub enum AgentError {
    /// Persistence failure.
    #[error(transparent)]
    Store(#[from] beacon_store::StoreError),

    /// Foundation-level failure.
    #[error(transparent)]
    Core(#[from] beacon_core::errors::CoreError),

    /// HTTP client could not be constructed.
    #[error("transport setup failed: {0}")]
    TransportSetup(String),

    /// The final flush did not complete within the shutdown timeout.
    #[error("shutdown flush timed out")]
    ShutdownTimeout,

    /// A named instance was requested before being initialized.
    #[error("agent instance '{0}' is not initialized")]
    NotInitialized(String),
}
