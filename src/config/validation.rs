//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, scrypt cost, gas limit)
//! - Catch an endpoint that still carries an unresolved `{api_key}`
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: WalletConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use thiserror::Error;

use crate::config::schema::{WalletConfig, API_KEY_PLACEHOLDER};
use crate::crypto::keyfile::{MAX_SCRYPT_LOG_N, MAX_SCRYPT_P};

/// One failed check, naming the offending key.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Check `config`, collecting every problem.
pub fn validate_config(config: &WalletConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let endpoint = config.rpc.resolved_endpoint();
    if endpoint.contains(API_KEY_PLACEHOLDER) {
        errors.push(ValidationError::new(
            "rpc.endpoint",
            "contains {api_key} but no API key is configured",
        ));
    }
    match url::Url::parse(&endpoint) {
        Ok(url) if matches!(url.scheme(), "http" | "https" | "ws" | "wss") => {}
        Ok(url) => errors.push(ValidationError::new(
            "rpc.endpoint",
            format!("unsupported scheme '{}'", url.scheme()),
        )),
        Err(e) => errors.push(ValidationError::new("rpc.endpoint", format!("invalid URL: {}", e))),
    }
    if config.rpc.request_timeout_secs == 0 {
        errors.push(ValidationError::new("rpc.request_timeout_secs", "must be greater than zero"));
    }

    if config.keystore.dir.as_os_str().is_empty() {
        errors.push(ValidationError::new("keystore.dir", "must not be empty"));
    }
    match config.keystore.scrypt_params().log_n() {
        None => errors.push(ValidationError::new(
            "keystore.scrypt_n",
            format!("{} is not a power of two greater than 1", config.keystore.scrypt_n),
        )),
        Some(log_n) if log_n > MAX_SCRYPT_LOG_N => errors.push(ValidationError::new(
            "keystore.scrypt_n",
            format!("must not exceed 2^{}", MAX_SCRYPT_LOG_N),
        )),
        Some(_) => {}
    }
    if config.keystore.scrypt_p == 0 || config.keystore.scrypt_p > MAX_SCRYPT_P {
        errors.push(ValidationError::new(
            "keystore.scrypt_p",
            format!("must be between 1 and {}", MAX_SCRYPT_P),
        ));
    }

    let tx = &config.transactions;
    if tx.gas_limit == 0 {
        errors.push(ValidationError::new("transactions.gas_limit", "must be greater than zero"));
    }
    if tx.receipt_poll_interval_ms == 0 {
        errors.push(ValidationError::new(
            "transactions.receipt_poll_interval_ms",
            "must be greater than zero",
        ));
    }
    if tx.receipt_timeout_secs == 0 {
        errors.push(ValidationError::new(
            "transactions.receipt_timeout_secs",
            "must be greater than zero",
        ));
    }

    let sub = &config.subscription;
    if sub.buffer == 0 {
        errors.push(ValidationError::new("subscription.buffer", "must be greater than zero"));
    }
    if sub.reconnect.enabled && sub.reconnect.base_delay_ms > sub.reconnect.max_delay_ms {
        errors.push(ValidationError::new(
            "subscription.reconnect.base_delay_ms",
            "must not exceed max_delay_ms",
        ));
    }

    if config.observability.metrics_enabled
        && config
            .observability
            .metrics_address
            .parse::<std::net::SocketAddr>()
            .is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            "not a socket address",
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
