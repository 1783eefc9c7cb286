//! Batch orchestration configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Background batch engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Whether scheduled batches are enabled.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Maximum number of tenant groups drained concurrently within one batch.
    #[serde(default = "default_max_concurrent_tenants")]
    pub max_concurrent_tenants: usize,
    /// How long a finished batch's live snapshot stays in memory.
    #[serde(default = "default_snapshot_retention")]
    pub snapshot_retention_seconds: u64,
    /// Finished batch records older than this are pruned by the cleanup task.
    #[serde(default = "default_batch_retention_days")]
    pub batch_retention_days: i64,
    /// Cron expression for the batch cleanup task.
    #[serde(default = "default_cleanup_schedule")]
    pub cleanup_schedule: String,
    /// Keyword rank re-check workload.
    #[serde(default = "WorkloadConfig::rank_check")]
    pub rank_check: WorkloadConfig,
    /// Scheduled post publication workload.
    #[serde(default = "WorkloadConfig::post_publish")]
    pub post_publish: WorkloadConfig,
}

impl WorkerConfig {
    /// Snapshot retention as a [`Duration`].
    pub fn snapshot_retention(&self) -> Duration {
        Duration::from_secs(self.snapshot_retention_seconds)
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_concurrent_tenants: default_max_concurrent_tenants(),
            snapshot_retention_seconds: default_snapshot_retention(),
            batch_retention_days: default_batch_retention_days(),
            cleanup_schedule: default_cleanup_schedule(),
            rank_check: WorkloadConfig::rank_check(),
            post_publish: WorkloadConfig::post_publish(),
        }
    }
}

/// Settings for one batch workload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkloadConfig {
    /// Whether the workload is scheduled.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Cron expression (with seconds) for scheduled runs.
    pub schedule: String,
    /// Minimum spacing between calls for the same tenant, in milliseconds.
    pub min_delay_ms: u64,
    /// Upper bound of random jitter added to the spacing, in milliseconds.
    #[serde(default)]
    pub rate_limit_jitter_ms: u64,
    /// Timeout of a single external call, in seconds.
    #[serde(default = "default_call_timeout")]
    pub call_timeout_seconds: u64,
    /// Expected latency of one call, used for the start-time duration estimate.
    #[serde(default = "default_estimated_call")]
    pub estimated_call_seconds: u64,
    /// Per-call retry policy.
    #[serde(default)]
    pub retry: RetryConfig,
}

impl WorkloadConfig {
    /// Defaults for the rank re-check workload: daily at 06:00, 2s spacing.
    pub fn rank_check() -> Self {
        Self {
            enabled: true,
            schedule: "0 0 6 * * *".to_string(),
            min_delay_ms: 2_000,
            rate_limit_jitter_ms: 500,
            call_timeout_seconds: default_call_timeout(),
            estimated_call_seconds: default_estimated_call(),
            retry: RetryConfig::default(),
        }
    }

    /// Defaults for the post publication workload: every 5 minutes, 1s spacing.
    pub fn post_publish() -> Self {
        Self {
            enabled: true,
            schedule: "0 */5 * * * *".to_string(),
            min_delay_ms: 1_000,
            rate_limit_jitter_ms: 250,
            call_timeout_seconds: default_call_timeout(),
            estimated_call_seconds: 2,
            retry: RetryConfig::default(),
        }
    }

    /// Minimum per-tenant spacing.
    pub fn min_delay(&self) -> Duration {
        Duration::from_millis(self.min_delay_ms)
    }

    /// Maximum per-tenant jitter.
    pub fn rate_limit_jitter(&self) -> Duration {
        Duration::from_millis(self.rate_limit_jitter_ms)
    }

    /// Timeout of one external call.
    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_seconds)
    }

    /// Expected duration of one item including its rate-limit spacing.
    pub fn estimated_item_duration(&self) -> Duration {
        self.min_delay() + Duration::from_secs(self.estimated_call_seconds)
    }
}

/// Retry and backoff settings for transient external failures.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total invocations allowed per call, including the first.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Delay before the first retry, in milliseconds.
    #[serde(default = "default_initial_backoff")]
    pub initial_backoff_ms: u64,
    /// Exponential growth factor between retries.
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,
    /// Cap on the computed backoff, in milliseconds.
    #[serde(default = "default_max_backoff")]
    pub max_backoff_ms: u64,
    /// Upper bound of random jitter added to each backoff, in milliseconds.
    #[serde(default = "default_jitter")]
    pub jitter_ms: u64,
    /// Extra delay after a rate-limited (HTTP 429) response, in milliseconds.
    #[serde(default = "default_rate_limit_cooldown")]
    pub rate_limit_cooldown_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff(),
            multiplier: default_multiplier(),
            max_backoff_ms: default_max_backoff(),
            jitter_ms: default_jitter(),
            rate_limit_cooldown_ms: default_rate_limit_cooldown(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_max_concurrent_tenants() -> usize {
    8
}

fn default_snapshot_retention() -> u64 {
    600
}

fn default_batch_retention_days() -> i64 {
    30
}

fn default_cleanup_schedule() -> String {
    "0 30 3 * * *".to_string()
}

fn default_call_timeout() -> u64 {
    45
}

fn default_estimated_call() -> u64 {
    3
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_backoff() -> u64 {
    1_000
}

fn default_multiplier() -> f64 {
    2.0
}

fn default_max_backoff() -> u64 {
    30_000
}

fn default_jitter() -> u64 {
    250
}

fn default_rate_limit_cooldown() -> u64 {
    5_000
}
