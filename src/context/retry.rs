//! Bounded retry with linear backoff
//!
//! After the n-th failed attempt the caller's task sleeps `base * n` before
//! trying again. No sleep follows the last attempt. The sleep suspends only
//! the failing call; other retrievals keep running.

use std::future::Future;
use std::time::Duration;
use tracing::{error, warn};

use crate::store::StoreError;

/// Retry budget for one retrieval
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_attempts: u32,
    pub backoff_base: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff_base: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff_base,
        }
    }

    /// Wait before attempt `failed + 1`, given `failed` failures so far
    pub fn backoff(&self, failed: u32) -> Duration {
        self.backoff_base.saturating_mul(failed)
    }

    /// Sum of all waits when every attempt fails
    pub fn worst_case_wait(&self) -> Duration {
        (1..self.max_attempts).map(|n| self.backoff(n)).sum()
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(
            crate::config::defaults::MAX_RETRIEVAL_ATTEMPTS,
            Duration::from_millis(crate::config::defaults::RETRY_BACKOFF_BASE_MS),
        )
    }
}

/// Why the retried operation gave up
#[derive(Debug, thiserror::Error)]
#[error("gave up after {attempts} attempt(s): {last}")]
pub struct RetryExhausted {
    pub attempts: u32,
    #[source]
    pub last: StoreError,
}

/// Run `op` until it succeeds, fails with a permanent error, or the attempt
/// budget runs out. `op` receives the 1-based attempt number.
pub async fn retry_transient<T, F, Fut>(
    policy: &RetryPolicy,
    phase: &'static str,
    mut op: F,
) -> Result<T, RetryExhausted>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, StoreError>>,
{
    let mut attempt = 1;
    loop {
        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_transient() && attempt < policy.max_attempts => {
                let wait = policy.backoff(attempt);
                warn!(
                    phase,
                    attempt,
                    max_attempts = policy.max_attempts,
                    wait_ms = wait.as_millis() as u64,
                    error = %e,
                    "Store operation failed, retrying"
                );
                tokio::time::sleep(wait).await;
                attempt += 1;
            }
            Err(e) => {
                error!(
                    phase,
                    attempts = attempt,
                    transient = e.is_transient(),
                    error = %e,
                    "Store operation failed, giving up"
                );
                return Err(RetryExhausted {
                    attempts: attempt,
                    last: e,
                });
            }
        }
    }
}
