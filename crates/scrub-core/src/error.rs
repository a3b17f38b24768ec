//! Error types for scrub.

use thiserror::Error;

/// Main error type for engine operations.
#[derive(Error, Debug)]
pub enum ScrubError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Scheduler is no longer running")]
    SchedulerClosed,

    #[error("Worker pool is shut down")]
    PoolShutdown,

    #[error("Shutdown timed out with {stuck} worker(s) still rendering")]
    ShutdownTimedOut { stuck: usize },

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, ScrubError>;

/// Why a single frame render did not produce a payload.
///
/// Returned by renderers; never unwinds across the worker boundary.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RenderError {
    #[error("render failed: {0}")]
    Failed(String),

    /// The cancellation token was observed at a safe point.
    #[error("render cancelled")]
    Cancelled,
}

impl RenderError {
    /// Convenience constructor for a failure with a reason.
    pub fn failed(reason: impl Into<String>) -> Self {
        Self::Failed(reason.into())
    }
}
