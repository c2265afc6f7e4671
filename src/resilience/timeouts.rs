//! Timeout enforcement.
//!
//! Every network call in the crate runs under a deadline. An elapsed
//! deadline becomes `BlockchainError::Timeout` naming the operation and its
//! target, and the inner future is dropped.

use std::future::Future;
use std::time::Duration;

use crate::blockchain::types::{BlockchainError, BlockchainResult};

/// Run `fut` with a deadline of `limit`.
pub async fn with_deadline<F, T>(
    operation: &'static str,
    target: impl Into<String>,
    limit: Duration,
    fut: F,
) -> BlockchainResult<T>
where
    F: Future<Output = BlockchainResult<T>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(BlockchainError::Timeout {
            operation,
            target: target.into(),
            elapsed: limit,
        }),
    }
}
