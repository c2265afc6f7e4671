//! Live `newHeads` subscription with reconnect hooks.
//!
//! # Data Flow
//! ```text
//! transport.subscribe_new_heads()
//!     → background task (Connecting → Streaming ⇄ Reconnecting, any → Closed)
//!     → headers channel (bounded, arrival order)
//!     → errors channel (at most one terminal error)
//! ```
//!
//! # Design Decisions
//! - Headers are delivered as announced: no dedup, no reordering, so a
//!   reorg shows up as a repeated or lower block number
//! - Only headers travel here; consumers fetch bodies with `block_by_hash`
//! - Reconnecting is a policy the caller plugs in; the default gives up
//! - Dropping the subscription aborts the task and releases the channel

use futures_util::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::blockchain::model::Header;
use crate::blockchain::types::BlockchainError;
use crate::blockchain::wire;
use crate::observability::metrics;
use crate::resilience::backoff::Backoff;
use crate::transport::RpcTransport;

const OPERATION: &str = "eth_subscribe";
const TARGET: &str = "newHeads";

/// Lifecycle of a [`HeaderSubscription`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionState {
    /// Opening the first channel. Retries of a failed first attempt stay here.
    Connecting,
    Streaming,
    /// Re-opening after a channel that was streaming broke.
    Reconnecting,
    Closed,
}

/// One delivery from the subscription.
#[derive(Debug)]
pub enum SubscriptionEvent {
    Header(Header),
    /// Terminal; nothing follows.
    Error(BlockchainError),
}

/// Decides whether and when to re-open a broken subscription.
pub trait ReconnectPolicy: Send + Sync {
    /// Delay before reconnect attempt `attempt` (1-based), or `None` to close.
    fn next_delay(&self, attempt: u32, error: &BlockchainError) -> Option<Duration>;
}

/// Close on the first failure.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoReconnect;

impl ReconnectPolicy for NoReconnect {
    fn next_delay(&self, _attempt: u32, _error: &BlockchainError) -> Option<Duration> {
        None
    }
}

/// Reconnect after retryable failures with jittered exponential delays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExponentialBackoff {
    /// Consecutive attempts before giving up. Reset by a delivered header.
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay_ms: 500,
            max_delay_ms: 30_000,
        }
    }
}

impl ReconnectPolicy for ExponentialBackoff {
    fn next_delay(&self, attempt: u32, error: &BlockchainError) -> Option<Duration> {
        if !error.is_retryable() || attempt > self.max_attempts {
            return None;
        }
        Some(self.delay_for(attempt))
    }
}

impl Backoff for ExponentialBackoff {
    fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }

    fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }
}

/// Subscription tuning.
#[derive(Clone)]
pub struct SubscriptionOptions {
    /// Headers held while the consumer is busy. The task waits when full.
    pub buffer: usize,
    pub reconnect: Arc<dyn ReconnectPolicy>,
}

impl SubscriptionOptions {
    pub fn with_reconnect(mut self, policy: impl ReconnectPolicy + 'static) -> Self {
        self.reconnect = Arc::new(policy);
        self
    }
}

impl Default for SubscriptionOptions {
    fn default() -> Self {
        Self {
            buffer: 64,
            reconnect: Arc::new(NoReconnect),
        }
    }
}

impl std::fmt::Debug for SubscriptionOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriptionOptions")
            .field("buffer", &self.buffer)
            .finish_non_exhaustive()
    }
}

/// Handle to a running header subscription.
pub struct HeaderSubscription {
    headers: mpsc::Receiver<Header>,
    errors: mpsc::Receiver<BlockchainError>,
    state: Arc<watch::Sender<SubscriptionState>>,
    task: JoinHandle<()>,
}

impl HeaderSubscription {
    /// Start streaming headers from `transport`. Must be called inside a Tokio runtime.
    pub fn spawn(transport: Arc<dyn RpcTransport>, options: SubscriptionOptions) -> Self {
        let (headers_tx, headers) = mpsc::channel(options.buffer.max(1));
        let (errors_tx, errors) = mpsc::channel(1);
        let (state, _) = watch::channel(SubscriptionState::Connecting);
        let state = Arc::new(state);

        let task = tokio::spawn(run(
            transport,
            options.reconnect,
            headers_tx,
            errors_tx,
            Arc::clone(&state),
        ));

        Self {
            headers,
            errors,
            state,
            task,
        }
    }

    /// Next header or terminal error; `None` once the subscription is over.
    ///
    /// Headers received before a failure are always handed out before the
    /// error.
    pub async fn next(&mut self) -> Option<SubscriptionEvent> {
        tokio::select! {
            biased;
            Some(header) = self.headers.recv() => Some(SubscriptionEvent::Header(header)),
            Some(err) = self.errors.recv() => Some(SubscriptionEvent::Error(err)),
            else => None,
        }
    }

    /// The header sequence on its own.
    pub fn headers(&mut self) -> &mut mpsc::Receiver<Header> {
        &mut self.headers
    }

    /// The terminal-error sequence on its own. Yields at most one item.
    pub fn errors(&mut self) -> &mut mpsc::Receiver<BlockchainError> {
        &mut self.errors
    }

    pub fn state(&self) -> SubscriptionState {
        *self.state.borrow()
    }

    /// Watch state transitions.
    pub fn state_changes(&self) -> watch::Receiver<SubscriptionState> {
        self.state.subscribe()
    }

    /// Tear down the subscription. No further deliveries happen.
    pub fn unsubscribe(self) {}
}

impl Drop for HeaderSubscription {
    fn drop(&mut self) {
        self.task.abort();
        self.state.send_replace(SubscriptionState::Closed);
        tracing::debug!("Header subscription cancelled");
    }
}

impl std::fmt::Debug for HeaderSubscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HeaderSubscription")
            .field("state", &self.state())
            .finish()
    }
}

enum StreamEnd {
    ConsumerGone,
    Failed(BlockchainError),
}

async fn run(
    transport: Arc<dyn RpcTransport>,
    policy: Arc<dyn ReconnectPolicy>,
    headers: mpsc::Sender<Header>,
    errors: mpsc::Sender<BlockchainError>,
    state: Arc<watch::Sender<SubscriptionState>>,
) {
    let mut attempt: u32 = 0;
    let mut streamed = false;
    loop {
        let end = match transport.subscribe_new_heads().await {
            Ok(stream) => {
                streamed = true;
                state.send_replace(SubscriptionState::Streaming);
                tracing::info!(reconnect_attempt = attempt, "Header subscription streaming");
                forward(stream, &headers, &mut attempt).await
            }
            Err(e) => StreamEnd::Failed(BlockchainError::from_transport(OPERATION, TARGET, e)),
        };

        let err = match end {
            StreamEnd::ConsumerGone => {
                state.send_replace(SubscriptionState::Closed);
                return;
            }
            StreamEnd::Failed(err) => err,
        };

        attempt += 1;
        match policy.next_delay(attempt, &err) {
            Some(delay) => {
                state.send_replace(if streamed {
                    SubscriptionState::Reconnecting
                } else {
                    SubscriptionState::Connecting
                });
                metrics::record_subscription_reconnect();
                tracing::warn!(
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "Header subscription broken, reconnecting"
                );
                tokio::time::sleep(delay).await;
            }
            None => {
                tracing::info!(error = %err, "Header subscription closed");
                state.send_replace(SubscriptionState::Closed);
                let _ = errors.send(err).await;
                return;
            }
        }
    }
}

async fn forward(
    mut stream: crate::transport::HeaderStream,
    headers: &mpsc::Sender<Header>,
    attempt: &mut u32,
) -> StreamEnd {
    while let Some(item) = stream.next().await {
        let value = match item {
            Ok(value) => value,
            Err(e) => return StreamEnd::Failed(BlockchainError::from_transport(OPERATION, TARGET, e)),
        };
        let header = match wire::header(OPERATION, TARGET, &value) {
            Ok(header) => header,
            Err(e) => return StreamEnd::Failed(e),
        };
        tracing::debug!(block_number = header.number, block_hash = %header.hash, "New header");
        if headers.send(header).await.is_err() {
            return StreamEnd::ConsumerGone;
        }
        metrics::record_subscription_header();
        *attempt = 0;
    }
    StreamEnd::Failed(BlockchainError::Transport {
        operation: OPERATION,
        target: TARGET.to_string(),
        message: "subscription stream ended".to_string(),
    })
}
