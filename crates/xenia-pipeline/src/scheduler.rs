//! Scheduled retention sweeps.
//!
//! [`CleanupScheduler`] walks the retention categories on a fixed
//! interval, soft-deleting entries that have outlived their category's
//! window and permanently purging entries whose soft-delete grace period
//! has passed. Each sweep is recorded as an audit entry of its own.
//! [`CronCleanup`] drives the same sweep from a cron expression instead
//! of an interval.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde_json::{json, Value};
use tokio::sync::{watch, RwLock};
use tokio::time::MissedTickBehavior;

use xenia_audit::{ActionType, ActivityEntry, AuditError, Category, JsonMap};

use crate::config::RetentionConfig;
use crate::error::{PipelineError, Result};
use crate::service::{ActivityLogService, MAX_CLEANUP_DAYS, MIN_CLEANUP_DAYS};

/// Lifecycle of a [`CleanupScheduler`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    /// Waiting for the next sweep
    Idle,
    /// A sweep is in progress
    Running,
    /// Shut down; no further sweeps will run
    Stopped,
}

impl SchedulerState {
    /// True once the scheduler can never sweep again.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Stopped)
    }

    /// Returns the lowercase name of the state.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Stopped => "stopped",
        }
    }
}

impl fmt::Display for SchedulerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one retention sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepSummary {
    /// Soft-delete counts per category, in sweep order
    pub deleted: Vec<(Category, u64)>,

    /// Categories whose sweep failed this pass
    pub failed: Vec<Category>,

    /// Entries permanently removed by the purge phase
    pub purged: u64,
}

/// Two-phase retention worker over an [`ActivityLogService`].
///
/// Phase one soft-deletes per category, so operators keep a recovery
/// window. Phase two purges entries whose soft-delete is older than the
/// grace period. A failure in one category never stops the others.
pub struct CleanupScheduler {
    service: Arc<ActivityLogService>,
    retention: RetentionConfig,
    state: Arc<RwLock<SchedulerState>>,
    shutdown_tx: watch::Sender<bool>,
}

impl CleanupScheduler {
    /// Creates an idle scheduler. Nothing runs until [`run`](Self::run)
    /// or [`run_once`](Self::run_once) is called.
    #[must_use]
    pub fn new(service: Arc<ActivityLogService>, retention: RetentionConfig) -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            service,
            retention,
            state: Arc::new(RwLock::new(SchedulerState::Idle)),
            shutdown_tx,
        }
    }

    /// Current lifecycle state.
    pub async fn state(&self) -> SchedulerState {
        *self.state.read().await
    }

    /// Sweeps on the configured interval until [`shutdown`](Self::shutdown)
    /// is called. The first sweep runs immediately.
    pub async fn run(&self) {
        let period = self.retention.sweep_interval.max(Duration::from_millis(1));
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut shutdown = self.shutdown_tx.subscribe();

        tracing::info!(
            sweep_interval = ?self.retention.sweep_interval,
            "cleanup scheduler started"
        );
        loop {
            tokio::select! {
                _ = shutdown.changed() => break,
                _ = ticker.tick() => {
                    let summary = self.run_once().await;
                    if self.state().await.is_terminal() {
                        break;
                    }
                    tracing::debug!(
                        swept = summary.deleted.len(),
                        failed = summary.failed.len(),
                        purged = summary.purged,
                        "sweep pass complete"
                    );
                }
            }
        }

        self.mark_stopped().await;
        tracing::info!("cleanup scheduler stopped");
    }

    /// Runs a single sweep now and reports what it did. Returns an empty
    /// summary when the scheduler has been shut down.
    pub async fn run_once(&self) -> SweepSummary {
        {
            let mut state = self.state.write().await;
            if state.is_terminal() {
                return SweepSummary::default();
            }
            *state = SchedulerState::Running;
        }

        let now = Utc::now();
        let mut summary = SweepSummary::default();

        for category in Category::all() {
            let days = self.retention.days_for(category);
            if days == 0 {
                tracing::debug!(category = %category, "retention disabled, skipping");
                continue;
            }
            let cutoff = now - chrono::Duration::days(i64::from(days));
            match self
                .service
                .soft_delete_older_than(Some(category), cutoff, self.retention.delete_batch_size)
                .await
            {
                Ok(deleted) => {
                    tracing::info!(
                        category = %category,
                        deleted,
                        retention_days = days,
                        "retention sweep finished"
                    );
                    summary.deleted.push((category, deleted));
                }
                Err(error) => {
                    tracing::error!(
                        category = %category,
                        error = %error,
                        "retention sweep failed, continuing with the next category"
                    );
                    summary.failed.push(category);
                }
            }
        }

        let grace_cutoff = now - chrono::Duration::days(i64::from(self.retention.grace_days));
        match self
            .service
            .purge_soft_deleted_before(grace_cutoff, self.retention.delete_batch_size)
            .await
        {
            Ok(purged) => {
                summary.purged = purged;
                if purged > 0 {
                    tracing::info!(purged, grace_days = self.retention.grace_days, "purge finished");
                }
            }
            Err(error) => {
                tracing::error!(error = %error, "purge of soft-deleted entries failed");
            }
        }

        self.audit(&summary).await;

        let mut state = self.state.write().await;
        if !state.is_terminal() {
            *state = SchedulerState::Idle;
        }
        summary
    }

    /// Stops the scheduler. A sweep already in flight finishes; no new
    /// sweep starts afterwards.
    pub async fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
        self.mark_stopped().await;
        tracing::info!("cleanup scheduler shutdown requested");
    }

    async fn mark_stopped(&self) {
        *self.state.write().await = SchedulerState::Stopped;
    }

    /// Records the sweep as an audit entry. Failure to record is logged,
    /// never propagated.
    async fn audit(&self, summary: &SweepSummary) {
        let mut counts = JsonMap::new();
        for (category, deleted) in &summary.deleted {
            counts.insert(category.as_str().to_owned(), json!(deleted));
        }
        let entry = ActivityEntry::new(ActionType::Admin, "cleanup_job", "SYSTEM")
            .with_category(Category::Security)
            .with_ip_address("system")
            .with_message("scheduled retention cleanup executed")
            .with_metadata_entry("deleted_counts", Value::Object(counts))
            .with_metadata_entry("purged", json!(summary.purged));
        if let Err(error) = self.service.log(entry).await {
            tracing::warn!(error = %error, "failed to audit the retention sweep");
        }
    }
}

/// Cron-driven alternative to the interval scheduler.
///
/// Instead of per-category sweeps it fires
/// [`ActivityLogService::auto_cleanup`] at each cron occurrence: one
/// retention window across all categories, plus the tombstone purge that
/// call performs.
pub struct CronCleanup {
    service: Arc<ActivityLogService>,
    schedule: cron::Schedule,
    expression: String,
    retention_days: u32,
    shutdown_tx: watch::Sender<bool>,
}

impl CronCleanup {
    /// Parses the cron expression (six fields, seconds first) and
    /// validates the retention window.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidSchedule`] when the expression
    /// does not parse, and [`PipelineError::Validation`] when
    /// `retention_days` is outside the accepted range.
    pub fn new(
        service: Arc<ActivityLogService>,
        expression: &str,
        retention_days: u32,
    ) -> Result<Self> {
        let schedule =
            cron::Schedule::from_str(expression).map_err(|error| PipelineError::InvalidSchedule {
                expression: expression.to_owned(),
                reason: error.to_string(),
            })?;
        if !(MIN_CLEANUP_DAYS..=MAX_CLEANUP_DAYS).contains(&retention_days) {
            return Err(AuditError::RetentionOutOfRange {
                days: retention_days,
                min: MIN_CLEANUP_DAYS,
                max: MAX_CLEANUP_DAYS,
            }
            .into());
        }
        let (shutdown_tx, _) = watch::channel(false);
        Ok(Self {
            service,
            schedule,
            expression: expression.to_owned(),
            retention_days,
            shutdown_tx,
        })
    }

    /// Runs a cleanup at each cron fire time until
    /// [`shutdown`](Self::shutdown) is called or the service closes.
    pub async fn run(&self) {
        let mut shutdown = self.shutdown_tx.subscribe();
        tracing::info!(
            schedule = %self.expression,
            retention_days = self.retention_days,
            "cron cleanup started"
        );
        loop {
            let Some(next) = self.schedule.upcoming(Utc).next() else {
                tracing::warn!(schedule = %self.expression, "no upcoming fire time, stopping");
                break;
            };
            let wait = (next - Utc::now()).to_std().unwrap_or(Duration::ZERO);
            tokio::select! {
                _ = shutdown.changed() => break,
                _ = tokio::time::sleep(wait) => {
                    match self.service.auto_cleanup(self.retention_days).await {
                        Ok(outcome) => {
                            tracing::info!(deleted = outcome.deleted, "cron cleanup pass finished");
                        }
                        Err(PipelineError::Closed) => {
                            tracing::info!("service closed, stopping cron cleanup");
                            break;
                        }
                        Err(error) => {
                            tracing::error!(error = %error, "cron cleanup pass failed");
                        }
                    }
                }
            }
        }
        tracing::info!("cron cleanup stopped");
    }

    /// Stops the cron loop after the current pass, if one is in flight.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }
}
