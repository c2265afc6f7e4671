//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize, CHAIN_WALLET_API_KEY override)
//!     → validation.rs (semantic checks)
//!     → WalletConfig (validated, immutable)
//!     → handed to the keystore, client, subscription and pipeline
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks
//! - The core types never read config themselves; they receive plain values

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::WalletConfig;
pub use schema::{KeystoreConfig, ObservabilityConfig, RpcConfig, SubscriptionConfig, TransactionsConfig};
