//! Xenia Activity Log Domain
//!
//! This crate defines the domain model for the Xenia activity-logging
//! pipeline: the audit entry itself, its classification enums, payload
//! sanitization, retention categorization, and the typed search filter.
//!
//! # Overview
//!
//! Every administrative request against the Xenia backend produces one
//! [`ActivityEntry`]. Before an entry reaches storage its payloads are
//! passed through the [`sanitize`] module (sensitive keys redacted, long
//! strings truncated) and, when the caller did not supply one, a retention
//! [`Category`] is derived by [`categorize`]. The retention category
//! drives how long the entry is kept before the two-phase delete reclaims
//! it.
//!
//! This crate is purely computational: no I/O, no async. Persistence and
//! buffering live in `xenia-store` and `xenia-pipeline`.
//!
//! # Example
//!
//! ```rust
//! use xenia_audit::{categorize, ActionType, ActivityEntry, Category, EntryStatus};
//!
//! let entry = ActivityEntry::new(ActionType::Booking, "/api/bookings", "POST")
//!     .with_ip_address("203.0.113.7")
//!     .with_status(EntryStatus::Success);
//!
//! assert_eq!(categorize(&entry), Category::Critical);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
// Allow some clippy lints for initial development - will tighten before release
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_const_for_fn)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::return_self_not_must_use)]
#![allow(clippy::module_name_repetitions)]

pub mod action;
pub mod category;
pub mod entry;
pub mod error;
pub mod filter;
pub mod sanitize;


// Re-export main types at crate root
pub use action::{ActionType, Category, EntryStatus};
pub use category::categorize;
pub use entry::{new_entry_id, ActivityEntry, JsonMap};
pub use error::{AuditError, Result};
pub use filter::{SearchFilter, SearchQuery, SortField, SortOrder};
pub use sanitize::{sanitize_map, sanitize_raw};
