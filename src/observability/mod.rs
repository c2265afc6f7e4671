//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! keystore, client, subscription, pipeline:
//!     → logging.rs (structured log events)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → stderr via tracing-subscriber
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Structured fields (address, tx_hash, block_number) instead of formatted strings
//! - Private keys and passwords never reach a log event
//! - Metrics are cheap (atomic increments)

pub mod logging;
pub mod metrics;
