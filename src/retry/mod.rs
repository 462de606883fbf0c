use std::future::Future;
use std::time::Duration;

use crate::Result;

/// Backoff parameters for retrying fallible external calls
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Maximum number of retries after the first attempt
    pub max_retries: u32,

    /// Delay before the first retry
    pub base_delay: Duration,

    /// Upper bound for the exponential backoff
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 5,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (1-based): base · 2^(attempt-1), capped at max
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

/// Predicate that retries every error kind
pub fn retry_all(_err: &anyhow::Error) -> bool {
    true
}

/// Run `op` until it succeeds or the policy is exhausted.
///
/// The wrapper is applied at individual external call sites (platform fetch,
/// LLM call), never around a whole pipeline stage. A non-retryable error
/// propagates immediately; after `max_retries` retries the last error is
/// propagated unchanged.
pub async fn retry_with_policy<T, F, Fut, P>(
    policy: RetryPolicy,
    is_retryable: P,
    mut op: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
    P: Fn(&anyhow::Error) -> bool,
{
    let mut attempt = 0u32;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                attempt += 1;
                if attempt > policy.max_retries || !is_retryable(&err) {
                    return Err(err);
                }

                let delay = policy.delay_for(attempt);
                tracing::warn!(
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    "operation failed, retrying: {err:#}"
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}
