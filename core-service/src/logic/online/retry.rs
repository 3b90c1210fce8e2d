//! Bounded linear backoff for hosted-model calls
//!
//! Attempt `n` (1-based) that fails with a retryable error waits
//! `n * backoff_step` before the next one. The last failure is returned as is.

use std::future::Future;
use std::time::Duration;

use crate::constants;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff_step: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: constants::DEFAULT_RETRY_ATTEMPTS,
            backoff_step: Duration::from_secs(constants::DEFAULT_RETRY_STEP_SECS),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff_step: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff_step,
        }
    }

    /// Wait after the given failed attempt (1-based)
    pub fn wait_for(&self, attempt: u32) -> Duration {
        self.backoff_step * attempt
    }

    pub async fn run<T, E, F, Fut, R>(&self, mut operation: F, is_retryable: R) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        R: Fn(&E) -> bool,
        E: std::fmt::Display,
    {
        let mut attempt = 1;
        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(err) if attempt < self.max_attempts && is_retryable(&err) => {
                    let wait = self.wait_for(attempt);
                    log::warn!(
                        "Attempt {}/{} failed ({}), retrying in {:?}",
                        attempt,
                        self.max_attempts,
                        err,
                        wait
                    );
                    tokio::time::sleep(wait).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}
