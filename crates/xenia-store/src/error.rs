//! Error types for storage backends

use thiserror::Error;

/// Errors that can occur while reading or writing activity entries.
#[derive(Error, Debug)]
pub enum StoreError {
    /// No entry exists with the requested ID.
    ///
    /// Also returned for lookup IDs that are not well-formed UUIDs, since
    /// such an ID can never correspond to a stored entry.
    #[error("activity entry not found: {id}")]
    NotFound {
        /// The ID that was looked up
        id: String,
    },

    /// The underlying database rejected or failed an operation.
    #[error("database error: {0}")]
    Database(#[source] sqlx::Error),

    /// A stored row could not be decoded back into an entry.
    #[error("corrupt entry {id}: {reason}")]
    Corrupt {
        /// ID of the row that failed to decode
        id: String,
        /// What went wrong while decoding
        reason: String,
    },

    /// The store has been closed and no longer accepts operations.
    #[error("store is closed")]
    Closed,
}

impl StoreError {
    /// Returns true if this error means the entry simply does not exist.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(error: sqlx::Error) -> Self {
        match error {
            sqlx::Error::PoolClosed => Self::Closed,
            other => Self::Database(other),
        }
    }
}

/// Result type alias for store operations
pub type Result<T> = std::result::Result<T, StoreError>;
