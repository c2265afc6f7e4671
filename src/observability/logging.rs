//! Structured logging.
//!
//! # Design Decisions
//! - Uses tracing crate for structured logging
//! - `RUST_LOG` wins over the configured level
//! - Only the binary installs a subscriber; the library just emits events

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Build the filter for `level`, preferring `RUST_LOG` when it is set.
pub fn env_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("chain_wallet={level},warn")))
}

/// Install the global subscriber. Calling it twice is harmless.
pub fn init_logging(level: &str) {
    let result = tracing_subscriber::registry()
        .with(env_filter(level))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .try_init();
    if let Err(e) = result {
        tracing::debug!(error = %e, "Logging already initialized");
    }
}
