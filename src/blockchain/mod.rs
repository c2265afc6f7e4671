//! Chain access subsystem.
//!
//! # Data Flow
//! ```text
//! transport (JSON-RPC values)
//!     → wire.rs (parse into model types)
//!     → client.rs (one round trip per call, deadline enforced)
//!     → subscription.rs (newHeads → headers / terminal error)
//!     → transaction.rs (nonce, gas price → build → sign → broadcast → receipt)
//! ```
//!
//! # Security Constraints
//! - Keys only enter through `crypto::KeyPair`, never through config or logs
//! - All RPC calls have configurable timeouts
//! - Broadcast failures are reported, not resubmitted

pub mod client;
pub mod model;
pub mod subscription;
pub mod transaction;
pub mod types;
mod wire;

pub use client::ChainClient;
pub use model::{Block, Header, Inclusion, LogEntry, Receipt, ReceiptStatus, SignedTransaction, Transaction};
pub use subscription::{
    ExponentialBackoff, HeaderSubscription, NoReconnect, ReconnectPolicy, SubscriptionEvent,
    SubscriptionOptions, SubscriptionState,
};
pub use transaction::{await_receipt, broadcast, build_transaction, sign_transaction, TransferSettings, TxBuilder};
pub use types::{BlockchainError, BlockchainResult, ChainId};
