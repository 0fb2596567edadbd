//! Retry with exponential backoff
//!
//! Page fetches go through [`with_retry`]: transient failures are retried
//! with a doubling delay until the attempt budget is spent, anything the
//! error itself marks as non-retryable fails immediately.

use std::future::Future;
use std::time::Duration;

/// Errors decide for themselves whether another attempt can help.
pub trait IsRetryable {
    fn is_retryable(&self) -> bool;
}

/// Attempt budget and backoff shape for one operation
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempts, including the first one. Always at least 1.
    pub max_tries: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_tries: u32) -> Self {
        Self {
            max_tries: max_tries.max(1),
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(8),
        }
    }

    fn delay_for(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(31);
        let delay = self.initial_delay.saturating_mul(1u32 << exp);
        delay.min(self.max_delay)
    }
}

/// Run `operation` until it succeeds, fails permanently, or the budget
/// is exhausted. `label` names the operation in the retry warnings.
pub async fn with_retry<T, E, F, Fut>(
    policy: &RetryPolicy,
    label: &str,
    mut operation: F,
) -> Result<T, E>
where
    E: IsRetryable + std::fmt::Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut attempt = 1;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_retryable() && attempt < policy.max_tries => {
                let delay = policy.delay_for(attempt);
                tracing::warn!(
                    "{label} failed (attempt {attempt}/{}), retrying in {:?}: {e}",
                    policy.max_tries,
                    delay
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
