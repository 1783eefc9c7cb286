//! Error classification and bounded exponential backoff.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use rand::Rng;
use thiserror::Error;
use tracing::{debug, warn};

use gbphub_client::RemoteError;
use gbphub_core::config::RetryConfig;

/// How a failed call should be treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Retry after backoff.
    Transient,
    /// Retry after backoff plus the rate-limit cooldown.
    RateLimited {
        /// Server-sent minimum delay.
        retry_after: Option<Duration>,
    },
    /// Do not retry.
    Permanent,
}

impl ErrorClass {
    /// Default classification of external API errors.
    pub fn of(err: &RemoteError) -> Self {
        if err.is_rate_limited() {
            Self::RateLimited {
                retry_after: err.retry_after(),
            }
        } else if err.is_transient() {
            Self::Transient
        } else {
            Self::Permanent
        }
    }

    /// Whether the call may be retried.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::Permanent)
    }
}

/// Terminal outcome of a retried operation.
#[derive(Debug, Error)]
pub enum RetryError<E> {
    /// The error was classified as permanent.
    #[error("{context}: {source}")]
    Permanent {
        /// What was being attempted.
        context: String,
        /// Invocations made, including the failing one.
        attempts: u32,
        /// The permanent error.
        source: E,
    },
    /// Every allowed invocation failed transiently.
    #[error("{context}: gave up after {attempts} attempts: {source}")]
    Exhausted {
        /// What was being attempted.
        context: String,
        /// Invocations made.
        attempts: u32,
        /// The last error.
        source: E,
    },
}

impl<E> RetryError<E> {
    /// The last underlying error.
    pub fn last_error(&self) -> &E {
        match self {
            Self::Permanent { source, .. } | Self::Exhausted { source, .. } => source,
        }
    }

    /// Invocations made before giving up.
    pub fn attempts(&self) -> u32 {
        match self {
            Self::Permanent { attempts, .. } | Self::Exhausted { attempts, .. } => *attempts,
        }
    }

    /// Whether retries were exhausted rather than cut short.
    pub fn is_exhausted(&self) -> bool {
        matches!(self, Self::Exhausted { .. })
    }
}

/// Retry settings for one workload.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    initial_backoff: Duration,
    multiplier: f64,
    max_backoff: Duration,
    jitter: Duration,
    rate_limit_cooldown: Duration,
}

impl RetryPolicy {
    /// Build a policy from configuration.
    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            initial_backoff: Duration::from_millis(config.initial_backoff_ms),
            multiplier: config.multiplier.max(1.0),
            max_backoff: Duration::from_millis(config.max_backoff_ms),
            jitter: Duration::from_millis(config.jitter_ms),
            rate_limit_cooldown: Duration::from_millis(config.rate_limit_cooldown_ms),
        }
    }

    /// Total invocations allowed per call.
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Backoff before retry number `attempt` (1-based), without jitter.
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let millis = self.initial_backoff.as_millis() as f64 * self.multiplier.powi(exponent);
        let capped = millis.min(self.max_backoff.as_millis() as f64);
        Duration::from_millis(capped as u64)
    }

    /// Full delay after a failed `attempt` with the given class.
    pub fn delay_for(&self, attempt: u32, class: ErrorClass) -> Duration {
        let mut delay = self.backoff_for(attempt) + self.sample_jitter();
        if let ErrorClass::RateLimited { retry_after } = class {
            delay += self.rate_limit_cooldown;
            if let Some(hint) = retry_after {
                delay = delay.max(hint);
            }
        }
        delay
    }

    /// Invoke `op` until it succeeds, fails permanently, or runs out of attempts.
    ///
    /// `op` receives the 1-based attempt number.
    pub async fn execute<T, E, C, F, Fut>(
        &self,
        context: &str,
        classify: C,
        mut op: F,
    ) -> Result<T, RetryError<E>>
    where
        E: fmt::Display,
        C: Fn(&E) -> ErrorClass,
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut attempt = 1;
        loop {
            let err = match op(attempt).await {
                Ok(value) => {
                    if attempt > 1 {
                        debug!(context, attempt, "Succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(err) => err,
            };

            let class = classify(&err);
            if !class.is_retryable() {
                return Err(RetryError::Permanent {
                    context: context.to_string(),
                    attempts: attempt,
                    source: err,
                });
            }
            if attempt >= self.max_attempts {
                warn!(context, attempts = attempt, error = %err, "Retries exhausted");
                return Err(RetryError::Exhausted {
                    context: context.to_string(),
                    attempts: attempt,
                    source: err,
                });
            }

            let delay = self.delay_for(attempt, class);
            warn!(
                context,
                attempt,
                backoff_ms = delay.as_millis() as u64,
                rate_limited = matches!(class, ErrorClass::RateLimited { .. }),
                error = %err,
                "Transient failure, retrying"
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }

    fn sample_jitter(&self) -> Duration {
        let max = self.jitter.as_millis() as u64;
        if max == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rand::thread_rng().gen_range(0..=max))
    }
}
