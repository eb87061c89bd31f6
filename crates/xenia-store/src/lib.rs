//! Xenia Activity Log Storage
//!
//! Persistence layer for the Xenia activity-logging pipeline. The
//! [`ActivityStore`] trait is the seam between the batching service and a
//! concrete backend; two backends ship with this crate:
//!
//! - [`MemoryStore`]: entries in a `Vec` behind an async lock, for tests
//!   and ephemeral deployments.
//! - [`SqliteStore`]: a `sqlx` SQLite pool with WAL journaling, the
//!   default for single-node deployments.
//!
//! # Overview
//!
//! Writes arrive in batches from the flush worker and must tolerate
//! per-entry failures: a batch insert skips bad entries and reports how
//! many landed. Deletes are two-phase: retention sweeps stamp
//! `deleted_at` (soft delete) and a later purge removes rows whose stamp
//! has aged past the grace period. Reads exclude soft-deleted entries
//! unless the filter opts in.
//!
//! # Example
//!
//! ```no_run
//! use xenia_audit::{ActionType, ActivityEntry};
//! use xenia_store::{ActivityStore, MemoryStore};
//!
//! # async fn example() -> xenia_store::Result<()> {
//! let store = MemoryStore::new();
//! let entry = ActivityEntry::new(ActionType::Login, "/api/v1/auth/login", "POST")
//!     .with_ip_address("203.0.113.7");
//! store.insert_one(entry).await?;
//!
//! let stats = store.stats().await?;
//! assert_eq!(stats.total, 1);
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
// Allow some clippy lints for initial development - will tighten before release
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_const_for_fn)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod memory;
pub mod sqlite;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use xenia_audit::{ActivityEntry, Category, SearchQuery};

// Re-export main types at crate root
pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// Hard ceiling on the page size a single search may return.
pub const MAX_SEARCH_LIMIT: u32 = 1000;

/// One page of search results plus the total match count.
#[derive(Debug, Clone)]
pub struct SearchPage {
    /// Entries on this page, in the requested order
    pub entries: Vec<ActivityEntry>,

    /// Total number of entries matching the filter, ignoring paging
    pub total: u64,
}

/// Aggregate statistics over live (not soft-deleted) entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreStats {
    /// Number of live entries
    pub total: u64,

    /// Creation time of the oldest live entry, `None` when empty
    pub oldest: Option<DateTime<Utc>>,
}

/// Backend-agnostic persistence for activity entries.
///
/// Implementations must be safe to share behind an `Arc` across the flush
/// worker, the retention scheduler and request handlers. All mutating
/// operations return how many entries they affected so callers can log
/// and audit the outcome.
#[async_trait]
pub trait ActivityStore: Send + Sync {
    /// Persists a batch of entries, assigning IDs, creation timestamps and
    /// derived categories where missing.
    ///
    /// A failing entry is skipped, not fatal: the returned count is the
    /// number actually persisted, which may be less than `entries.len()`.
    async fn insert_batch(&self, entries: Vec<ActivityEntry>) -> Result<u64>;

    /// Persists a single entry, with the same stamping as
    /// [`insert_batch`](Self::insert_batch). Used by the overflow fallback
    /// path, where losing the entry is not acceptable.
    async fn insert_one(&self, entry: ActivityEntry) -> Result<()>;

    /// Fetches one entry by its ID string.
    ///
    /// Returns [`StoreError::NotFound`] both for absent IDs and for ID
    /// strings that are not well-formed UUIDs.
    async fn find_by_id(&self, id: &str) -> Result<ActivityEntry>;

    /// Runs a filtered, sorted, paged search.
    ///
    /// `total` in the returned page counts every match of the filter, not
    /// just the page, so callers can compute page counts.
    async fn search(&self, query: &SearchQuery) -> Result<SearchPage>;

    /// Soft-deletes live entries created strictly before `cutoff`,
    /// restricted to one category when `category` is `Some`.
    ///
    /// Works through matches in chunks of `batch_size` to bound the cost
    /// of any single statement. Returns the number of entries stamped.
    async fn soft_delete_older_than(
        &self,
        category: Option<Category>,
        cutoff: DateTime<Utc>,
        batch_size: u32,
    ) -> Result<u64>;

    /// Soft-deletes the given entries. Already-deleted entries are not
    /// re-stamped and do not count. Returns the number stamped.
    async fn soft_delete_by_ids(&self, ids: &[Uuid]) -> Result<u64>;

    /// Soft-deletes all live entries recorded for one user. Returns the
    /// number stamped.
    async fn soft_delete_by_user(&self, user_id: Uuid) -> Result<u64>;

    /// Permanently removes up to `batch_size` entries whose soft-delete
    /// stamp is strictly before `before`. Returns the number removed.
    ///
    /// Unlike the soft-delete side this runs a single bounded batch per
    /// call; the scheduler decides how often to come back for more.
    async fn purge_soft_deleted_before(&self, before: DateTime<Utc>, batch_size: u32)
        -> Result<u64>;

    /// Reports aggregate statistics over live entries.
    async fn stats(&self) -> Result<StoreStats>;

    /// Releases backend resources. Closing twice is harmless.
    async fn close(&self) -> Result<()>;
}
