//! Bounded retry for transactions that lose to a concurrent writer.

use std::future::Future;
use std::time::Duration;

use crate::error::{EngineError, Result};

/// How often, and how patiently, a conflicting transaction is re-run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first. Always at least one.
    pub max_attempts: u32,
    /// Delay before the second attempt.
    pub base_delay: Duration,
    /// Upper bound for any single delay.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_millis(5),
            max_delay: Duration::from_millis(200),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            max_delay,
        }
    }

    /// A single attempt, never retried.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Default::default()
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// Delay after the given failed attempt (1-indexed), doubling each time.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }
        let factor = 1u32.checked_shl(attempt - 1).unwrap_or(u32::MAX);
        self.base_delay
            .checked_mul(factor)
            .map_or(self.max_delay, |delay| delay.min(self.max_delay))
    }

    /// Runs `attempt` until it succeeds, fails with anything other than a
    /// concurrency conflict, or runs out of attempts.
    ///
    /// Each call to `attempt` must build a fresh transaction; nothing from a
    /// failed attempt is carried into the next one.
    pub async fn run<T, F, Fut>(&self, operation: &'static str, mut attempt: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut tries = 0;

        loop {
            tries += 1;
            match attempt().await {
                Err(e) if e.is_concurrency_conflict() => {
                    if tries >= max_attempts {
                        metrics::counter!(
                            "transaction_conflicts_exhausted_total",
                            "operation" => operation
                        )
                        .increment(1);
                        tracing::warn!(
                            operation,
                            attempts = tries,
                            "giving up after repeated transaction conflicts"
                        );
                        return Err(EngineError::TransientFailure { attempts: tries });
                    }

                    metrics::counter!("transaction_retries_total", "operation" => operation)
                        .increment(1);
                    let delay = self.delay_for_attempt(tries);
                    tracing::warn!(
                        operation,
                        attempt = tries,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "transaction conflict, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                other => return other,
            }
        }
    }
}
