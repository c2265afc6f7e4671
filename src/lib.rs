//! Blockchain client and wallet core.
//!
//! Four pieces, leaves first:
//! - `crypto`: secp256k1 keys, signing and recovery, address derivation,
//!   scrypt-encrypted key files
//! - `keystore`: a directory of encrypted key files with an in-memory index
//! - `blockchain`: query client, header subscription and transaction pipeline
//!   over an [`transport::RpcTransport`]
//! - `config` / `observability` / `resilience`: the ambient stack

pub mod blockchain;
pub mod config;
pub mod crypto;
pub mod keystore;
pub mod observability;
pub mod resilience;
pub mod transport;

pub use blockchain::{BlockchainError, BlockchainResult, ChainClient, HeaderSubscription, TxBuilder};
pub use config::WalletConfig;
pub use crypto::KeyPair;
pub use keystore::{Account, KeystoreManager};
