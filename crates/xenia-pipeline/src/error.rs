//! Error types for the logging pipeline

use std::time::Duration;

use thiserror::Error;
use xenia_audit::AuditError;
use xenia_store::StoreError;

/// Errors surfaced by the log service and the retention schedulers.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Caller-supplied input failed validation.
    #[error("invalid request: {0}")]
    Validation(#[from] AuditError),

    /// The storage backend failed.
    #[error("storage failure: {0}")]
    Store(#[from] StoreError),

    /// The service has been closed and no longer accepts entries.
    #[error("activity log service is closed")]
    Closed,

    /// The queue was full and the direct insert fallback did not finish
    /// within its deadline.
    #[error("queue full and direct insert did not finish within {timeout:?}")]
    FallbackTimeout {
        /// How long the fallback insert was given
        timeout: Duration,
    },

    /// A cron expression could not be parsed.
    #[error("invalid cron schedule {expression:?}: {reason}")]
    InvalidSchedule {
        /// The rejected expression
        expression: String,
        /// Parser error text
        reason: String,
    },
}

impl PipelineError {
    /// Returns true if the error only means the requested entry does not
    /// exist.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::Store(StoreError::NotFound { .. }))
    }
}

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, PipelineError>;
