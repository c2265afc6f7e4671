//! Metrics collection and exposition.
//!
//! # Metrics
//! - `wallet_rpc_requests_total` (counter): RPC calls by method and outcome
//! - `wallet_rpc_request_duration_seconds` (histogram): RPC latency by method
//! - `wallet_subscription_headers_total` (counter): headers delivered
//! - `wallet_subscription_reconnects_total` (counter): reconnect attempts
//! - `wallet_keystore_accounts` (gauge): indexed accounts
//! - `wallet_keystore_operations_total` (counter): keystore operations by kind
//! - `wallet_transactions_broadcast_total` (counter): broadcasts by outcome
//! - `wallet_backend_health` (gauge): 1=healthy, 0=unhealthy
//!
//! Recording is a no-op until a recorder is installed, so the library can
//! call these unconditionally.

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter and its scrape endpoint.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

/// Record one RPC round trip.
pub fn record_rpc(method: &'static str, outcome: &'static str, started: Instant) {
    ::metrics::counter!("wallet_rpc_requests_total", "method" => method, "outcome" => outcome)
        .increment(1);
    ::metrics::histogram!("wallet_rpc_request_duration_seconds", "method" => method)
        .record(started.elapsed().as_secs_f64());
}

pub fn record_subscription_header() {
    ::metrics::counter!("wallet_subscription_headers_total").increment(1);
}

pub fn record_subscription_reconnect() {
    ::metrics::counter!("wallet_subscription_reconnects_total").increment(1);
}

pub fn record_keystore_accounts(count: usize) {
    ::metrics::gauge!("wallet_keystore_accounts").set(count as f64);
}

pub fn record_keystore_op(op: &'static str) {
    ::metrics::counter!("wallet_keystore_operations_total", "op" => op).increment(1);
}

pub fn record_broadcast(outcome: &'static str) {
    ::metrics::counter!("wallet_transactions_broadcast_total", "outcome" => outcome).increment(1);
}

pub fn record_backend_health(backend: &str, healthy: bool) {
    ::metrics::gauge!("wallet_backend_health", "backend" => backend.to_string())
        .set(if healthy { 1.0 } else { 0.0 });
}
