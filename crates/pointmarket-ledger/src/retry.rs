//! Retry-with-backoff policy for optimistic-concurrency conflicts.
//!
//! Only [`MarketError::Conflict`] is retried — validation and resource
//! errors propagate immediately. Exhausting the attempt budget surfaces
//! [`MarketError::RetryExhausted`], which callers treat as retryable at a
//! coarser granularity (the scheduler re-queues the whole run).

use std::time::Duration;

use rand::Rng;

use pointmarket_types::{MarketError, Result, constants};

/// Bounded exponential backoff with uniform jitter.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
}

impl RetryPolicy {
    /// # Panics
    /// Panics if `max_attempts` is zero.
    #[must_use]
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        assert!(max_attempts > 0, "RetryPolicy needs at least one attempt");
        Self {
            max_attempts,
            base_delay,
        }
    }

    /// Run `op` until it succeeds, fails with a non-conflict error, or the
    /// attempt budget runs out. `entity` names the contended record for the
    /// exhaustion error and logs.
    pub fn run<T, F>(&self, entity: &str, mut op: F) -> Result<T>
    where
        F: FnMut() -> Result<T>,
    {
        let mut attempt = 0u32;
        loop {
            match op() {
                Err(MarketError::Conflict { .. }) => {
                    attempt += 1;
                    if attempt >= self.max_attempts {
                        tracing::warn!(entity, attempts = attempt, "conditional update exhausted");
                        return Err(MarketError::RetryExhausted {
                            entity: entity.to_string(),
                            attempts: attempt,
                        });
                    }
                    std::thread::sleep(self.backoff(attempt));
                }
                other => return other,
            }
        }
    }

    /// Exponential delay for the given attempt (1-based) plus up to 50%
    /// uniform jitter, so colliding writers decorrelate.
    fn backoff(&self, attempt: u32) -> Duration {
        let exp = self.base_delay.saturating_mul(1 << (attempt - 1).min(8));
        let half_ms = u64::try_from(exp.as_millis() / 2).unwrap_or(u64::MAX);
        let jitter = rand::thread_rng().gen_range(0..=half_ms);
        exp + Duration::from_millis(jitter)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(
            constants::DEFAULT_RETRY_ATTEMPTS,
            Duration::from_millis(constants::DEFAULT_RETRY_BASE_MS),
        )
    }
}
