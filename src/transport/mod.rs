//! RPC transport seam.
//!
//! # Responsibilities
//! - Carry JSON-RPC request/response pairs to a node
//! - Open the `newHeads` push channel
//!
//! # Design Decisions
//! - Framing, authentication and connection management live behind this
//!   trait; the query client only sees JSON values
//! - Object-safe so the client can hold `Arc<dyn RpcTransport>`
//! - Node error objects stay distinguishable from connectivity failures

pub mod provider;
pub mod mock;

use futures_util::future::BoxFuture;
use futures_util::stream::BoxStream;
use serde_json::Value;
use thiserror::Error;

pub use provider::AlloyTransport;
pub use mock::MockTransport;

/// Failure reported by a transport.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    /// The connection failed or the subscription channel closed.
    #[error("connection failure: {0}")]
    Connection(String),

    /// The node answered with a JSON-RPC error object.
    #[error("node error {code}: {message}")]
    Rpc { code: i64, message: String },
}

/// Result type for transport calls.
pub type TransportResult<T> = Result<T, TransportError>;

/// Stream of raw `newHeads` notifications.
pub type HeaderStream = BoxStream<'static, TransportResult<Value>>;

/// Request/response and subscription channel to a remote node.
pub trait RpcTransport: Send + Sync {
    /// Issue one JSON-RPC call. `params` is the positional parameter array.
    fn request(&self, method: &'static str, params: Value) -> BoxFuture<'_, TransportResult<Value>>;

    /// Open a `newHeads` subscription.
    ///
    /// The returned stream yields header objects in arrival order. It ends
    /// with an `Err` when the channel breaks.
    fn subscribe_new_heads(&self) -> BoxFuture<'_, TransportResult<HeaderStream>>;
}
