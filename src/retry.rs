//! Bounded retry with linear backoff
//!
//! Only failures tagged transient (see [`Error::is_transient`]) are retried;
//! anything else surfaces immediately.

use std::future::Future;
use std::time::Duration;

#[cfg(test)]
use crate::Error;
use crate::Result;

/// Retry policy for transient speech failures.
///
/// The delay grows linearly: attempt `n` waits `n * backoff_step` before
/// running again, so the first retry is immediate.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of attempts (including the first)
    pub max_tries: u32,
    /// Backoff step multiplied by the attempt number
    pub backoff_step: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_tries: 10,
            backoff_step: Duration::from_millis(100),
        }
    }
}

impl RetryPolicy {
    /// Build a policy from configured bounds.
    #[must_use]
    pub const fn new(max_tries: u32, backoff_step: Duration) -> Self {
        Self {
            max_tries,
            backoff_step,
        }
    }

    /// Delay before re-running after `attempt` failures.
    #[must_use]
    pub const fn delay_for_attempt(&self, attempt: u32) -> Duration {
        // Duration * u32 is not const; widen by hand
        Duration::from_millis(self.backoff_step.as_millis() as u64 * attempt as u64)
    }
}

/// Run `operation` until it succeeds, fails terminally, or exhausts the
/// retry budget.
///
/// # Errors
///
/// Returns the first non-transient error, or the last transient error once
/// `max_tries` attempts have been spent.
pub async fn run<T, F, Fut>(policy: &RetryPolicy, mut operation: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_transient() && attempt + 1 < policy.max_tries => {
                tracing::warn!(attempt, error = %e, "transient failure, retrying");
                tokio::time::sleep(policy.delay_for_attempt(attempt)).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
