//! Retry Controller — bounded retries with exponential backoff.
//!
//! Rate-limit failures back off from `base_delay`; every other failure backs
//! off from the shorter `transient_base_delay`. The caller gets the last error
//! once `max_retries + 1` attempts have failed and is expected to fall back to
//! rule-based scoring instead of failing the pipeline.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use super::LlmError;

/// Backoff base for failures that are not rate limits.
pub const TRANSIENT_BASE_DELAY: Duration = Duration::from_millis(2000);

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_retries: u32,
    /// Backoff base after a rate-limit failure: `base_delay * 2^attempt`.
    pub base_delay: Duration,
    /// Backoff base after any other failure: `transient_base_delay * 2^attempt`.
    pub transient_base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay: Duration::from_millis(5000),
            transient_base_delay: TRANSIENT_BASE_DELAY,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
            ..Self::default()
        }
    }

    /// Delay to wait after the failed attempt `attempt` (0-based).
    pub fn delay_for(&self, attempt: u32, error: &LlmError) -> Duration {
        let base = if error.is_rate_limited() {
            self.base_delay
        } else {
            self.transient_base_delay
        };
        base.saturating_mul(2u32.saturating_pow(attempt))
    }

    /// Worst-case time spent sleeping between attempts.
    pub fn total_backoff(&self, rate_limited: bool) -> Duration {
        let base = if rate_limited {
            self.base_delay
        } else {
            self.transient_base_delay
        };
        (0..self.max_retries)
            .map(|attempt| base.saturating_mul(2u32.saturating_pow(attempt)))
            .fold(Duration::ZERO, Duration::saturating_add)
    }
}

/// Runs `operation` until it succeeds or `policy.max_retries + 1` attempts have failed.
pub async fn with_retry<T, F, Fut>(policy: &RetryPolicy, mut operation: F) -> Result<T, LlmError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, LlmError>>,
{
    let mut attempt = 0;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(error) if attempt >= policy.max_retries => return Err(error),
            Err(error) => {
                let delay = policy.delay_for(attempt, &error);
                warn!(
                    "LLM call attempt {}/{} failed ({}), retrying after {}ms...",
                    attempt + 1,
                    policy.max_retries + 1,
                    error,
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}
