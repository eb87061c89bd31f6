//! Validation errors for the activity log domain.

use chrono::{DateTime, Utc};

/// Errors produced while validating caller-supplied audit parameters.
///
/// These are surfaced to the caller immediately; they never originate from
/// storage. Persistence failures live in `xenia-store`.
#[derive(Debug, thiserror::Error)]
pub enum AuditError {
    /// A date range whose start is after its end.
    #[error("invalid date range: {start} is after {end}")]
    InvalidDateRange {
        /// Start of the requested range
        start: DateTime<Utc>,
        /// End of the requested range
        end: DateTime<Utc>,
    },

    /// Retention days outside the accepted window.
    #[error("retention days {days} outside accepted range {min}..={max}")]
    RetentionOutOfRange {
        /// The rejected value
        days: u32,
        /// Smallest accepted value
        min: u32,
        /// Largest accepted value
        max: u32,
    },

    /// An identifier that does not parse as a UUID.
    #[error("invalid id: {value:?}")]
    InvalidId {
        /// The rejected identifier
        value: String,
    },

    /// A bulk operation was given no identifiers to act on.
    #[error("no ids provided")]
    EmptyIdList,

    /// A stored value does not match any known enum variant.
    #[error("unknown {kind}: {value:?}")]
    UnknownVariant {
        /// Which enumeration was being parsed
        kind: &'static str,
        /// The unrecognized value
        value: String,
    },
}

/// Convenience result alias for domain validation.
pub type Result<T> = std::result::Result<T, AuditError>;
