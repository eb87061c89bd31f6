//! The batching activity log service.
//!
//! [`ActivityLogService`] is the single entry point for recording and
//! administering activity entries. Writers call [`log`], which sanitizes
//! the entry, derives its retention category and hands it to a bounded
//! queue; a background flush worker drains the queue into the store in
//! batches. When the queue is full the entry falls back to a direct,
//! deadline-bounded insert so nothing is silently dropped.
//!
//! [`log`]: ActivityLogService::log

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use uuid::Uuid;

use xenia_audit::{
    categorize, sanitize_map, ActionType, ActivityEntry, AuditError, Category, SearchFilter,
    SearchQuery,
};
use xenia_store::{ActivityStore, SearchPage};

use crate::config::{PipelineConfig, DEFAULT_GRACE_DAYS};
use crate::error::{PipelineError, Result};

/// Smallest retention the one-shot cleanup accepts, in days.
pub const MIN_CLEANUP_DAYS: u32 = 7;

/// Largest retention the one-shot cleanup accepts, in days.
pub const MAX_CLEANUP_DAYS: u32 = 365;

/// Page size used when an admin delete has to walk search results.
const DELETE_PAGE_SIZE: u32 = 500;

/// Result of an administrative delete.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeleteOutcome {
    /// Number of entries soft-deleted
    pub deleted: u64,
}

/// Aggregate statistics of the live log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogStats {
    /// Number of live entries
    pub total: u64,

    /// Creation time of the oldest live entry
    pub oldest: Option<DateTime<Utc>>,

    /// Average entries per day since the oldest entry
    pub logs_per_day: u64,
}

/// Asynchronous, batched front door to an [`ActivityStore`].
///
/// Cheap to share behind an `Arc`: every method takes `&self`. The
/// service owns its flush worker; [`close`](Self::close) stops intake,
/// drains the queue, joins the worker and closes the store.
pub struct ActivityLogService {
    store: Arc<dyn ActivityStore>,
    sender: mpsc::Sender<ActivityEntry>,
    shutdown: watch::Sender<bool>,
    worker: Mutex<Option<JoinHandle<()>>>,
    closed: AtomicBool,
    config: PipelineConfig,
}

impl ActivityLogService {
    /// Creates the service and spawns its flush worker onto the current
    /// Tokio runtime.
    #[must_use]
    pub fn new(store: Arc<dyn ActivityStore>, config: PipelineConfig) -> Self {
        let (sender, receiver) = mpsc::channel(config.queue_capacity);
        let (shutdown, shutdown_rx) = watch::channel(false);
        let worker = tokio::spawn(run_flush_worker(
            Arc::clone(&store),
            receiver,
            shutdown_rx,
            config.batch_size,
            config.flush_interval,
        ));

        tracing::info!(
            batch_size = config.batch_size,
            queue_capacity = config.queue_capacity,
            flush_interval = ?config.flush_interval,
            "activity log service started"
        );

        Self {
            store,
            sender,
            shutdown,
            worker: Mutex::new(Some(worker)),
            closed: AtomicBool::new(false),
            config,
        }
    }

    /// Records one entry.
    ///
    /// Payloads are sanitized and the retention category derived before
    /// the entry is queued, so an entry never waits in memory with
    /// sensitive values. `created_at` is stamped here, not at flush time.
    pub async fn log(&self, entry: ActivityEntry) -> Result<()> {
        self.ensure_open()?;
        let entry = prepare(entry);
        match self.sender.try_send(entry) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(entry)) => self.insert_direct(entry).await,
            Err(TrySendError::Closed(_)) => Err(PipelineError::Closed),
        }
    }

    /// Fetches one entry by ID.
    pub async fn get_by_id(&self, id: &str) -> Result<ActivityEntry> {
        self.ensure_open()?;
        Ok(self.store.find_by_id(id).await?)
    }

    /// Runs a validated, filtered, paged search.
    pub async fn search(&self, query: &SearchQuery) -> Result<SearchPage> {
        self.ensure_open()?;
        query.validate()?;
        Ok(self.store.search(query).await?)
    }

    /// Reports live-entry statistics, including the average entries per
    /// day since the oldest entry.
    pub async fn stats(&self) -> Result<LogStats> {
        self.ensure_open()?;
        let stats = self.store.stats().await?;
        let logs_per_day = stats.oldest.map_or(stats.total, |oldest| {
            let days = (Utc::now() - oldest).num_days().max(1);
            stats.total / u64::try_from(days).unwrap_or(1)
        });
        Ok(LogStats {
            total: stats.total,
            oldest: stats.oldest,
            logs_per_day,
        })
    }

    /// Soft-deletes every live entry created inside the inclusive range,
    /// then records the action, and the admin who requested it, as an
    /// audit entry of its own.
    pub async fn delete_by_date_range(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        requested_by: Option<Uuid>,
    ) -> Result<DeleteOutcome> {
        self.ensure_open()?;
        if from > to {
            return Err(AuditError::InvalidDateRange {
                start: from,
                end: to,
            }
            .into());
        }

        let filter = SearchFilter::new()
            .with_created_after(from)
            .with_created_before(to);
        let mut deleted = 0u64;
        loop {
            let query = SearchQuery::new(filter.clone()).with_page(DELETE_PAGE_SIZE, 0);
            let page = self.store.search(&query).await?;
            if page.entries.is_empty() {
                break;
            }
            let ids: Vec<Uuid> = page.entries.iter().filter_map(|entry| entry.id).collect();
            let stamped = self.store.soft_delete_by_ids(&ids).await?;
            deleted += stamped;
            if stamped == 0 {
                break;
            }
        }

        self.record_deletion(requested_by, deleted, &format!("created between {from} and {to}"))
            .await;
        Ok(DeleteOutcome { deleted })
    }

    /// Soft-deletes the entries named by `ids`, then records the action,
    /// and the admin who requested it, as an audit entry of its own.
    ///
    /// The whole list is validated before anything is deleted: one
    /// malformed ID rejects the request.
    pub async fn delete_by_ids(
        &self,
        ids: &[String],
        requested_by: Option<Uuid>,
    ) -> Result<DeleteOutcome> {
        self.ensure_open()?;
        if ids.is_empty() {
            return Err(AuditError::EmptyIdList.into());
        }
        let mut parsed = Vec::with_capacity(ids.len());
        for id in ids {
            let uuid = Uuid::parse_str(id).map_err(|_| AuditError::InvalidId {
                value: id.clone(),
            })?;
            parsed.push(uuid);
        }

        let deleted = self.store.soft_delete_by_ids(&parsed).await?;
        self.record_deletion(requested_by, deleted, &format!("{} explicit ids", parsed.len()))
            .await;
        Ok(DeleteOutcome { deleted })
    }

    /// Soft-deletes every live entry recorded for one user, then records
    /// the action, and the admin who requested it, as an audit entry of
    /// its own.
    pub async fn delete_by_user(
        &self,
        user_id: Uuid,
        requested_by: Option<Uuid>,
    ) -> Result<DeleteOutcome> {
        self.ensure_open()?;
        let deleted = self.store.soft_delete_by_user(user_id).await?;
        self.record_deletion(requested_by, deleted, &format!("user {user_id}"))
            .await;
        Ok(DeleteOutcome { deleted })
    }

    /// One-shot cleanup: soft-deletes everything older than
    /// `retention_days`, regardless of category, then purges tombstones
    /// past the default grace period so a deployment driven only by this
    /// call still reclaims space.
    pub async fn auto_cleanup(&self, retention_days: u32) -> Result<DeleteOutcome> {
        self.ensure_open()?;
        if !(MIN_CLEANUP_DAYS..=MAX_CLEANUP_DAYS).contains(&retention_days) {
            return Err(AuditError::RetentionOutOfRange {
                days: retention_days,
                min: MIN_CLEANUP_DAYS,
                max: MAX_CLEANUP_DAYS,
            }
            .into());
        }

        let now = Utc::now();
        let cutoff = now - chrono::Duration::days(i64::from(retention_days));
        let deleted = self
            .store
            .soft_delete_older_than(None, cutoff, DELETE_PAGE_SIZE)
            .await?;

        let grace_cutoff = now - chrono::Duration::days(i64::from(DEFAULT_GRACE_DAYS));
        let purged = self
            .store
            .purge_soft_deleted_before(grace_cutoff, DELETE_PAGE_SIZE)
            .await?;
        if purged > 0 {
            tracing::info!(purged, "auto cleanup purged expired tombstones");
        }

        self.record_deletion(None, deleted, &format!("older than {retention_days} days"))
            .await;
        Ok(DeleteOutcome { deleted })
    }

    /// Soft-deletes live entries created before `cutoff`, restricted to
    /// one category when given. Used by the retention scheduler.
    pub async fn soft_delete_older_than(
        &self,
        category: Option<Category>,
        cutoff: DateTime<Utc>,
        batch_size: u32,
    ) -> Result<u64> {
        self.ensure_open()?;
        Ok(self
            .store
            .soft_delete_older_than(category, cutoff, batch_size)
            .await?)
    }

    /// Permanently removes up to `batch_size` entries soft-deleted before
    /// `before`. Used by the retention scheduler's purge phase.
    pub async fn purge_soft_deleted_before(
        &self,
        before: DateTime<Utc>,
        batch_size: u32,
    ) -> Result<u64> {
        self.ensure_open()?;
        Ok(self
            .store
            .purge_soft_deleted_before(before, batch_size)
            .await?)
    }

    /// Stops intake, drains the queue, joins the flush worker and closes
    /// the store. Entries already accepted by [`log`](Self::log) are
    /// flushed before this returns. Closing twice is harmless.
    pub async fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        let _ = self.shutdown.send(true);
        if let Some(worker) = self.worker.lock().await.take() {
            if let Err(error) = worker.await {
                tracing::error!(error = %error, "flush worker did not shut down cleanly");
            }
        }
        self.store.close().await?;
        tracing::info!("activity log service closed");
        Ok(())
    }

    /// True once [`close`](Self::close) has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            Err(PipelineError::Closed)
        } else {
            Ok(())
        }
    }

    async fn insert_direct(&self, entry: ActivityEntry) -> Result<()> {
        tracing::warn!(
            capacity = self.config.queue_capacity,
            "activity queue full, falling back to a direct insert"
        );
        let timeout = self.config.fallback_timeout;
        match tokio::time::timeout(timeout, self.store.insert_one(entry)).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(PipelineError::FallbackTimeout { timeout }),
        }
    }

    /// Records an administrative delete as an audit entry of its own,
    /// carrying the requesting admin when one is known. Failure to record
    /// is logged, never propagated: the delete already happened.
    async fn record_deletion(&self, requested_by: Option<Uuid>, deleted: u64, criteria: &str) {
        let mut entry = ActivityEntry::new(ActionType::Admin, "activity_log", "SYSTEM")
            .with_category(Category::Security)
            .with_ip_address("system")
            .with_message(format!("deleted {deleted} logs with criteria: {criteria}"));
        if let Some(admin) = requested_by {
            entry = entry.with_user_id(admin);
        }
        if let Err(error) = self.log(entry).await {
            tracing::warn!(error = %error, "failed to audit an activity log deletion");
        }
    }
}

/// Sanitizes payloads and fills the derived fields an entry must carry
/// before it is queued.
fn prepare(mut entry: ActivityEntry) -> ActivityEntry {
    entry.request_payload = entry.request_payload.take().map(sanitize_map);
    entry.response_payload = entry.response_payload.take().map(sanitize_map);
    entry.before = entry.before.take().map(sanitize_map);
    entry.after = entry.after.take().map(sanitize_map);
    if entry.category.is_none() {
        entry.category = Some(categorize(&entry));
    }
    if entry.created_at.is_none() {
        entry.created_at = Some(Utc::now());
    }
    entry
}

async fn run_flush_worker(
    store: Arc<dyn ActivityStore>,
    mut receiver: mpsc::Receiver<ActivityEntry>,
    mut shutdown: watch::Receiver<bool>,
    batch_size: usize,
    flush_interval: Duration,
) {
    let mut batch: Vec<ActivityEntry> = Vec::with_capacity(batch_size);
    let mut ticker = tokio::time::interval(flush_interval.max(Duration::from_millis(1)));
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = shutdown.changed() => {
                // Drain whatever is still queued before exiting.
                while let Ok(entry) = receiver.try_recv() {
                    batch.push(entry);
                    if batch.len() >= batch_size {
                        flush_batch(store.as_ref(), &mut batch).await;
                    }
                }
                flush_batch(store.as_ref(), &mut batch).await;
                break;
            }
            received = receiver.recv() => {
                match received {
                    Some(entry) => {
                        batch.push(entry);
                        if batch.len() >= batch_size {
                            flush_batch(store.as_ref(), &mut batch).await;
                        }
                    }
                    None => {
                        flush_batch(store.as_ref(), &mut batch).await;
                        break;
                    }
                }
            }
            _ = ticker.tick() => {
                flush_batch(store.as_ref(), &mut batch).await;
            }
        }
    }

    tracing::debug!("flush worker stopped");
}

async fn flush_batch(store: &dyn ActivityStore, batch: &mut Vec<ActivityEntry>) {
    if batch.is_empty() {
        return;
    }
    let entries = std::mem::take(batch);
    let count = entries.len() as u64;
    match store.insert_batch(entries).await {
        Ok(written) if written < count => {
            tracing::warn!(count, written, "batch partially persisted");
        }
        Ok(written) => {
            tracing::debug!(written, "flushed activity batch");
        }
        Err(error) => {
            tracing::error!(error = %error, count, "failed to flush activity batch");
        }
    }
}
