//! Xenia Activity Log Pipeline
//!
//! The asynchronous heart of the Xenia activity log: a batching
//! [`ActivityLogService`] in front of any
//! [`ActivityStore`](xenia_store::ActivityStore), plus the
//! [`CleanupScheduler`] that enforces per-category retention.
//!
//! # Overview
//!
//! Request handlers call [`ActivityLogService::log`], which sanitizes
//! payloads, derives the retention category and queues the entry; a
//! background worker flushes the queue in batches, on size or on a
//! timer. When the queue is full the entry falls back to a direct,
//! deadline-bounded insert. [`ActivityLogService::close`] drains
//! everything already accepted before shutting the store.
//!
//! Retention is two-phase. The scheduler soft-deletes entries older than
//! their category's window (critical, security, general), then
//! permanently purges entries whose soft-delete has outlived the grace
//! period. Every administrative delete and every sweep is itself
//! recorded as an audit entry.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use xenia_audit::{ActionType, ActivityEntry};
//! use xenia_pipeline::{ActivityLogService, PipelineConfig};
//! use xenia_store::{ActivityStore, MemoryStore};
//!
//! # async fn example() -> xenia_pipeline::Result<()> {
//! let store = Arc::new(MemoryStore::new()) as Arc<dyn ActivityStore>;
//! let service = ActivityLogService::new(store, PipelineConfig::default());
//!
//! service
//!     .log(
//!         ActivityEntry::new(ActionType::Login, "/api/v1/auth/login", "POST")
//!             .with_ip_address("203.0.113.7"),
//!     )
//!     .await?;
//!
//! service.close().await?;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
// Allow some clippy lints for initial development - will tighten before release
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_const_for_fn)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod error;
pub mod scheduler;
pub mod service;
pub mod telemetry;

// Re-export main types at crate root
pub use config::{PipelineConfig, RetentionConfig};
pub use error::{PipelineError, Result};
pub use scheduler::{CleanupScheduler, CronCleanup, SchedulerState, SweepSummary};
pub use service::{ActivityLogService, DeleteOutcome, LogStats, MAX_CLEANUP_DAYS, MIN_CLEANUP_DAYS};
pub use telemetry::init_tracing;
