//! Configuration for the batching service and the retention scheduler.
//!
//! Both config types follow the same layering: compiled-in defaults,
//! overridden by a builder, overridden by `XENIA_LOG_*` environment
//! variables when loaded through [`PipelineConfig::from_env`] or
//! [`RetentionConfig::from_env`]. Unparseable values are logged and
//! ignored rather than failing startup.

use std::str::FromStr;
use std::time::Duration;

use xenia_audit::Category;

/// Default number of entries per flush batch.
pub const DEFAULT_BATCH_SIZE: usize = 1000;

/// Default interval between timed flushes.
pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_secs(5);

/// Default deadline for the queue-full direct insert fallback.
pub const DEFAULT_FALLBACK_TIMEOUT: Duration = Duration::from_secs(2);

/// Default retention for critical entries, in days.
pub const DEFAULT_CRITICAL_DAYS: u32 = 90;

/// Default retention for security entries, in days.
pub const DEFAULT_SECURITY_DAYS: u32 = 60;

/// Default retention for general entries, in days.
pub const DEFAULT_GENERAL_DAYS: u32 = 30;

/// Default grace period between soft delete and purge, in days.
pub const DEFAULT_GRACE_DAYS: u32 = 7;

/// Default interval between retention sweeps.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

/// Default batch size for soft deletes and purges.
pub const DEFAULT_DELETE_BATCH_SIZE: u32 = 1000;

/// Tuning for the batching log service.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Entries per flush batch; reaching it triggers an immediate flush.
    pub batch_size: usize,

    /// How often the worker flushes a partial batch.
    pub flush_interval: Duration,

    /// Bounded queue capacity between callers and the flush worker.
    pub queue_capacity: usize,

    /// Deadline for the direct insert fallback when the queue is full.
    pub fallback_timeout: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            flush_interval: DEFAULT_FLUSH_INTERVAL,
            queue_capacity: DEFAULT_BATCH_SIZE * 10,
            fallback_timeout: DEFAULT_FALLBACK_TIMEOUT,
        }
    }
}

impl PipelineConfig {
    /// Creates a configuration builder.
    #[must_use]
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder::default()
    }

    /// Loads configuration from `XENIA_LOG_*` environment variables,
    /// falling back to defaults for anything unset or unparseable.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`from_env`](Self::from_env) but reads through `lookup`, so
    /// tests can provide variables without touching the process
    /// environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut builder = Self::builder();
        if let Some(size) = parse_value(&lookup, "XENIA_LOG_BATCH_SIZE") {
            builder = builder.batch_size(size);
        }
        if let Some(interval) = parse_duration(&lookup, "XENIA_LOG_FLUSH_INTERVAL") {
            builder = builder.flush_interval(interval);
        }
        if let Some(capacity) = parse_value(&lookup, "XENIA_LOG_QUEUE_CAPACITY") {
            builder = builder.queue_capacity(capacity);
        }
        if let Some(timeout) = parse_duration(&lookup, "XENIA_LOG_FALLBACK_TIMEOUT") {
            builder = builder.fallback_timeout(timeout);
        }
        builder.build()
    }
}

/// Builder for [`PipelineConfig`].
#[derive(Debug, Default)]
pub struct PipelineConfigBuilder {
    batch_size: Option<usize>,
    flush_interval: Option<Duration>,
    queue_capacity: Option<usize>,
    fallback_timeout: Option<Duration>,
}

impl PipelineConfigBuilder {
    /// Sets the flush batch size.
    #[must_use]
    pub const fn batch_size(mut self, size: usize) -> Self {
        self.batch_size = Some(size);
        self
    }

    /// Sets the timed flush interval.
    #[must_use]
    pub const fn flush_interval(mut self, interval: Duration) -> Self {
        self.flush_interval = Some(interval);
        self
    }

    /// Sets the queue capacity. Unset, it derives as ten times the batch
    /// size.
    #[must_use]
    pub const fn queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = Some(capacity);
        self
    }

    /// Sets the direct insert fallback deadline.
    #[must_use]
    pub const fn fallback_timeout(mut self, timeout: Duration) -> Self {
        self.fallback_timeout = Some(timeout);
        self
    }

    /// Builds the configuration, clamping sizes to at least one.
    #[must_use]
    pub fn build(self) -> PipelineConfig {
        let batch_size = self.batch_size.unwrap_or(DEFAULT_BATCH_SIZE).max(1);
        PipelineConfig {
            batch_size,
            flush_interval: self.flush_interval.unwrap_or(DEFAULT_FLUSH_INTERVAL),
            queue_capacity: self
                .queue_capacity
                .unwrap_or_else(|| batch_size.saturating_mul(10))
                .max(1),
            fallback_timeout: self.fallback_timeout.unwrap_or(DEFAULT_FALLBACK_TIMEOUT),
        }
    }
}

/// Retention policy driving the two-phase delete.
///
/// A per-category day count of zero means entries in that category are
/// never swept.
#[derive(Debug, Clone)]
pub struct RetentionConfig {
    /// Days critical entries are kept before soft delete.
    pub critical_days: u32,

    /// Days security entries are kept before soft delete.
    pub security_days: u32,

    /// Days general entries are kept before soft delete.
    pub general_days: u32,

    /// Days a soft-deleted entry survives before the purge removes it.
    pub grace_days: u32,

    /// Interval between sweeps when running on the plain interval loop.
    pub sweep_interval: Duration,

    /// Batch size for soft-delete and purge statements.
    pub delete_batch_size: u32,

    /// Optional cron expression (seconds field included) that replaces
    /// the interval loop when set.
    pub cron: Option<String>,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            critical_days: DEFAULT_CRITICAL_DAYS,
            security_days: DEFAULT_SECURITY_DAYS,
            general_days: DEFAULT_GENERAL_DAYS,
            grace_days: DEFAULT_GRACE_DAYS,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
            delete_batch_size: DEFAULT_DELETE_BATCH_SIZE,
            cron: None,
        }
    }
}

impl RetentionConfig {
    /// Creates a configuration builder.
    #[must_use]
    pub fn builder() -> RetentionConfigBuilder {
        RetentionConfigBuilder::default()
    }

    /// Loads configuration from `XENIA_LOG_*` environment variables,
    /// falling back to defaults for anything unset or unparseable.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`from_env`](Self::from_env) but reads through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut builder = Self::builder();
        if let Some(days) = parse_value(&lookup, "XENIA_LOG_RETENTION_CRITICAL_DAYS") {
            builder = builder.critical_days(days);
        }
        if let Some(days) = parse_value(&lookup, "XENIA_LOG_RETENTION_SECURITY_DAYS") {
            builder = builder.security_days(days);
        }
        if let Some(days) = parse_value(&lookup, "XENIA_LOG_RETENTION_GENERAL_DAYS") {
            builder = builder.general_days(days);
        }
        if let Some(days) = parse_value(&lookup, "XENIA_LOG_GRACE_DAYS") {
            builder = builder.grace_days(days);
        }
        if let Some(interval) = parse_duration(&lookup, "XENIA_LOG_SWEEP_INTERVAL") {
            builder = builder.sweep_interval(interval);
        }
        if let Some(size) = parse_value(&lookup, "XENIA_LOG_DELETE_BATCH_SIZE") {
            builder = builder.delete_batch_size(size);
        }
        if let Some(expression) = lookup("XENIA_LOG_CLEANUP_CRON") {
            builder = builder.cron(expression);
        }
        builder.build()
    }

    /// Retention days for one category.
    #[must_use]
    pub const fn days_for(&self, category: Category) -> u32 {
        match category {
            Category::Critical => self.critical_days,
            Category::Security => self.security_days,
            Category::General => self.general_days,
        }
    }
}

/// Builder for [`RetentionConfig`].
#[derive(Debug, Default)]
pub struct RetentionConfigBuilder {
    critical_days: Option<u32>,
    security_days: Option<u32>,
    general_days: Option<u32>,
    grace_days: Option<u32>,
    sweep_interval: Option<Duration>,
    delete_batch_size: Option<u32>,
    cron: Option<String>,
}

impl RetentionConfigBuilder {
    /// Sets the critical retention days. Zero keeps entries forever.
    #[must_use]
    pub const fn critical_days(mut self, days: u32) -> Self {
        self.critical_days = Some(days);
        self
    }

    /// Sets the security retention days. Zero keeps entries forever.
    #[must_use]
    pub const fn security_days(mut self, days: u32) -> Self {
        self.security_days = Some(days);
        self
    }

    /// Sets the general retention days. Zero keeps entries forever.
    #[must_use]
    pub const fn general_days(mut self, days: u32) -> Self {
        self.general_days = Some(days);
        self
    }

    /// Sets the purge grace period in days.
    #[must_use]
    pub const fn grace_days(mut self, days: u32) -> Self {
        self.grace_days = Some(days);
        self
    }

    /// Sets the interval between sweeps.
    #[must_use]
    pub const fn sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = Some(interval);
        self
    }

    /// Sets the delete batch size.
    #[must_use]
    pub const fn delete_batch_size(mut self, size: u32) -> Self {
        self.delete_batch_size = Some(size);
        self
    }

    /// Sets a cron expression for sweep timing.
    #[must_use]
    pub fn cron(mut self, expression: impl Into<String>) -> Self {
        self.cron = Some(expression.into());
        self
    }

    /// Builds the configuration.
    #[must_use]
    pub fn build(self) -> RetentionConfig {
        RetentionConfig {
            critical_days: self.critical_days.unwrap_or(DEFAULT_CRITICAL_DAYS),
            security_days: self.security_days.unwrap_or(DEFAULT_SECURITY_DAYS),
            general_days: self.general_days.unwrap_or(DEFAULT_GENERAL_DAYS),
            grace_days: self.grace_days.unwrap_or(DEFAULT_GRACE_DAYS),
            sweep_interval: self.sweep_interval.unwrap_or(DEFAULT_SWEEP_INTERVAL),
            delete_batch_size: self
                .delete_batch_size
                .unwrap_or(DEFAULT_DELETE_BATCH_SIZE)
                .max(1),
            cron: self.cron,
        }
    }
}

fn parse_value<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &'static str) -> Option<T> {
    let raw = lookup(key)?;
    match raw.parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!(key, value = %raw, "ignoring unparseable configuration value");
            None
        }
    }
}

fn parse_duration(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
) -> Option<Duration> {
    let raw = lookup(key)?;
    match humantime::parse_duration(&raw) {
        Ok(value) => Some(value),
        Err(error) => {
            tracing::warn!(key, value = %raw, error = %error, "ignoring unparseable duration");
            None
        }
    }
}
