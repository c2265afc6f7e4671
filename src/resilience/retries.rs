//! Caller-side retry logic.
//!
//! The query client never retries on its own; callers that want it wrap a
//! call in [`retry`]. Only errors reporting `is_retryable()` are repeated,
//! so a node rejection or a wrong password fails on the first attempt.

use std::future::Future;
use std::time::Duration;

use crate::blockchain::types::BlockchainResult;
use crate::resilience::backoff::Backoff;

/// Retry budget and delay bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryConfig {
    /// Total attempts, including the first. Zero behaves like one.
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Backoff for RetryConfig {
    fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }

    fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 200,
            max_delay_ms: 5_000,
        }
    }
}

/// Run `op` until it succeeds, fails with a final error, or the budget runs out.
pub async fn retry<F, Fut, T>(config: &RetryConfig, mut op: F) -> BlockchainResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = BlockchainResult<T>>,
{
    let max_attempts = config.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_retryable() && attempt < max_attempts => {
                let delay = config.delay_for(attempt);
                tracing::warn!(
                    attempt,
                    max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Retrying after retryable error"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
