//! Configuration loading from disk.

use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::config::schema::WalletConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Environment variable that overrides `rpc.api_key`.
pub const API_KEY_ENV: &str = "CHAIN_WALLET_API_KEY";

/// Why a config file was not accepted.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("config is not valid TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("config rejected: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors.iter().map(ToString::to_string).collect::<Vec<_>>().join("; ")
}

/// Load, apply environment overrides and validate a TOML file.
pub fn load_config(path: &Path) -> Result<WalletConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    parse_config(&content, std::env::var(API_KEY_ENV).ok())
}

/// Parse `content`, let `api_key_override` win over the file, then validate.
pub fn parse_config(content: &str, api_key_override: Option<String>) -> Result<WalletConfig, ConfigError> {
    let mut config: WalletConfig = toml::from_str(content)?;

    if let Some(key) = api_key_override.filter(|k| !k.is_empty()) {
        config.rpc.api_key = Some(key);
    }

    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}
