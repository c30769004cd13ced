//! Error types for dispatch operations.

use thiserror::Error;

use crate::core::task::Platform;

/// Errors produced by queues, the worker pool and the orchestrator.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The platform queue is at capacity (only returned by non-blocking enqueue).
    #[error("queue full: {0}")]
    QueueFull(Platform),
    /// The platform queue no longer accepts tasks.
    #[error("queue closed: {0}")]
    QueueClosed(Platform),
    /// The orchestrator has been stopped and cannot accept work or restart.
    #[error("orchestrator stopped")]
    Stopped,
    /// Configuration validation failed.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// A worker or service thread could not be spawned.
    #[error("failed to spawn `{name}`: {source}")]
    Spawn {
        /// Thread name.
        name: String,
        /// Underlying OS error.
        #[source]
        source: std::io::Error,
    },
}

/// Application-facing result using anyhow for higher-level contexts.
pub type AppResult<T> = Result<T, anyhow::Error>;
