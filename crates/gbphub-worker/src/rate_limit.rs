//! Per-tenant call spacing.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use rand::Rng;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::trace;

use gbphub_core::config::WorkloadConfig;

/// Enforces a minimum delay between external calls for the same key.
///
/// Each key has its own lock, so tenants never wait on each other. Entries
/// are never evicted; [`RateLimiter::tracked_keys`] exposes the set.
#[derive(Debug)]
pub struct RateLimiter {
    min_delay: Duration,
    jitter: Duration,
    last_call: DashMap<String, Arc<Mutex<Option<Instant>>>>,
}

impl RateLimiter {
    /// Create a limiter with a fixed spacing and up to `jitter` extra delay.
    pub fn new(min_delay: Duration, jitter: Duration) -> Self {
        Self {
            min_delay,
            jitter,
            last_call: DashMap::new(),
        }
    }

    /// Create a limiter from a workload's settings.
    pub fn from_config(config: &WorkloadConfig) -> Self {
        Self::new(config.min_delay(), config.rate_limit_jitter())
    }

    /// Wait until `key` may call again, then record the call.
    ///
    /// The first call for a key returns immediately. Concurrent callers for
    /// the same key are serialized.
    pub async fn wait(&self, key: &str) {
        let slot = self
            .last_call
            .entry(key.to_string())
            .or_default()
            .clone();

        let mut last = slot.lock().await;
        if let Some(previous) = *last {
            let ready_at = previous + self.min_delay + self.sample_jitter();
            let now = Instant::now();
            if ready_at > now {
                trace!(
                    key,
                    wait_ms = (ready_at - now).as_millis() as u64,
                    "Rate limiting"
                );
                tokio::time::sleep_until(ready_at).await;
            }
        }
        *last = Some(Instant::now());
    }

    /// Keys that have made at least one call.
    pub fn tracked_keys(&self) -> Vec<String> {
        self.last_call.iter().map(|e| e.key().clone()).collect()
    }

    /// Configured minimum spacing.
    pub fn min_delay(&self) -> Duration {
        self.min_delay
    }

    fn sample_jitter(&self) -> Duration {
        let max = self.jitter.as_millis() as u64;
        if max == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rand::thread_rng().gen_range(0..=max))
    }
}
