//! Bounded exponential-backoff retry
//!
//! Transient fetch failures (network errors, non-2xx statuses) are retried
//! a fixed number of times, waiting `2^attempt` seconds between attempts.
//! The last error is returned once the budget is exhausted; it is never
//! swallowed.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

/// Retry budget and backoff configuration
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total number of attempts, including the first one
    pub max_attempts: u32,
    /// Delay before the first retry; doubles for each subsequent retry
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// Backoff delay after a failed attempt (zero-indexed)
    ///
    /// Formula: `base_delay * 2^attempt`, so the defaults wait 1s after
    /// the first failure and 2s after the second.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        self.base_delay
            .saturating_mul(1u32.checked_shl(attempt).unwrap_or(u32::MAX))
    }
}

/// Run an async operation, retrying every failure with backoff
///
/// Returns the first `Ok` result, or the last error once all attempts in
/// the policy are used up.
pub async fn with_backoff<F, Fut, T, E>(policy: &RetryPolicy, operation: F) -> Result<T, E>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut attempt = 0u32;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(e) => {
                if attempt + 1 >= policy.max_attempts.max(1) {
                    return Err(e);
                }
                let delay = policy.delay_for_attempt(attempt);
                warn!(
                    attempt = attempt + 1,
                    max_attempts = policy.max_attempts,
                    delay_secs = delay.as_secs_f64(),
                    error = %e,
                    "Request failed, retrying after backoff"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            },
        }
    }
}
