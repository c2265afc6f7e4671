//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the wallet.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::blockchain::subscription::{ExponentialBackoff, NoReconnect, SubscriptionOptions};
use crate::blockchain::transaction::TransferSettings;
use crate::crypto::ScryptParams;

/// Placeholder in `rpc.endpoint` replaced by the API key.
pub const API_KEY_PLACEHOLDER: &str = "{api_key}";

/// Root configuration for the wallet.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct WalletConfig {
    /// Node endpoint and request deadline.
    pub rpc: RpcConfig,

    /// Key directory and KDF cost.
    pub keystore: KeystoreConfig,

    /// Transfer defaults.
    pub transactions: TransactionsConfig,

    /// Header subscription settings.
    pub subscription: SubscriptionConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// RPC endpoint configuration.
#[derive(Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RpcConfig {
    /// `http(s)://` or `ws(s)://` URL, optionally containing `{api_key}`.
    pub endpoint: String,

    /// Provider API key. `CHAIN_WALLET_API_KEY` overrides it.
    pub api_key: Option<String>,

    /// Per-call deadline in seconds.
    pub request_timeout_secs: u64,

    /// Refuse to run against a node reporting another chain id.
    pub expected_chain_id: Option<u64>,
}

impl RpcConfig {
    /// Endpoint with the API key substituted.
    pub fn resolved_endpoint(&self) -> String {
        match &self.api_key {
            Some(key) => self.endpoint.replace(API_KEY_PLACEHOLDER, key),
            None => self.endpoint.clone(),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:8545".to_string(),
            api_key: None,
            request_timeout_secs: 30,
            expected_chain_id: None,
        }
    }
}

impl std::fmt::Debug for RpcConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RpcConfig")
            .field("endpoint", &self.endpoint)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("expected_chain_id", &self.expected_chain_id)
            .finish()
    }
}

/// Keystore configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct KeystoreConfig {
    /// Directory holding one key file per account.
    pub dir: PathBuf,

    /// Scrypt CPU/memory cost. Power of two.
    pub scrypt_n: u32,

    /// Scrypt parallelism.
    pub scrypt_p: u32,
}

impl KeystoreConfig {
    pub fn scrypt_params(&self) -> ScryptParams {
        ScryptParams {
            n: self.scrypt_n,
            p: self.scrypt_p,
        }
    }
}

impl Default for KeystoreConfig {
    fn default() -> Self {
        let standard = ScryptParams::standard();
        Self {
            dir: PathBuf::from("./keystore"),
            scrypt_n: standard.n,
            scrypt_p: standard.p,
        }
    }
}

/// Transfer defaults.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TransactionsConfig {
    /// Gas limit of a plain transfer.
    pub gas_limit: u64,

    /// Maximum gas price in gwei (protection against spikes). 0 = no cap.
    pub max_gas_price_gwei: u64,

    /// Receipt polling interval in milliseconds.
    pub receipt_poll_interval_ms: u64,

    /// Give up waiting for a receipt after this many seconds.
    pub receipt_timeout_secs: u64,
}

impl TransactionsConfig {
    pub fn transfer_settings(&self) -> TransferSettings {
        TransferSettings {
            gas_limit: self.gas_limit,
            max_gas_price_gwei: self.max_gas_price_gwei,
            receipt_poll_interval: Duration::from_millis(self.receipt_poll_interval_ms),
            receipt_timeout: Duration::from_secs(self.receipt_timeout_secs),
        }
    }
}

impl Default for TransactionsConfig {
    fn default() -> Self {
        Self {
            gas_limit: 21_000,
            max_gas_price_gwei: 500,
            receipt_poll_interval_ms: 2_000,
            receipt_timeout_secs: 120,
        }
    }
}

/// Header subscription configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SubscriptionConfig {
    /// Headers buffered for a slow consumer.
    pub buffer: usize,

    pub reconnect: ReconnectConfig,
}

impl SubscriptionConfig {
    pub fn options(&self) -> SubscriptionOptions {
        let options = SubscriptionOptions {
            buffer: self.buffer,
            ..SubscriptionOptions::default()
        };
        if self.reconnect.enabled {
            options.with_reconnect(ExponentialBackoff {
                max_attempts: self.reconnect.max_attempts,
                base_delay_ms: self.reconnect.base_delay_ms,
                max_delay_ms: self.reconnect.max_delay_ms,
            })
        } else {
            options.with_reconnect(NoReconnect)
        }
    }
}

impl Default for SubscriptionConfig {
    fn default() -> Self {
        Self {
            buffer: 64,
            reconnect: ReconnectConfig::default(),
        }
    }
}

/// Reconnect policy for a broken subscription.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ReconnectConfig {
    /// Off by default: a broken subscription closes.
    pub enabled: bool,
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        let backoff = ExponentialBackoff::default();
        Self {
            enabled: false,
            max_attempts: backoff.max_attempts,
            base_delay_ms: backoff.base_delay_ms,
            max_delay_ms: backoff.max_delay_ms,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}
