//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gateway_assets_served_total` (counter): resolved assets by `tier`
//! - `gateway_assets_not_found_total` (counter): asset requests with no hit
//! - `gateway_asset_resolve_seconds` (histogram): resolution latency by `tier`
//! - `gateway_sessions_total` (counter): proxy sessions created
//! - `gateway_sessions_active` (gauge): live proxy sessions
//! - `gateway_relay_bytes_total` (counter): relayed bytes by `direction`
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade and is a no-op until an
//!   exporter is installed, so tests never need one

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter with its own HTTP listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

/// Record a served asset and how long it took to resolve.
pub fn record_asset_served(tier: &'static str, start: Instant) {
    metrics::counter!("gateway_assets_served_total", "tier" => tier).increment(1);
    metrics::histogram!("gateway_asset_resolve_seconds", "tier" => tier)
        .record(start.elapsed().as_secs_f64());
}

/// Record an asset request that no tier could satisfy.
pub fn record_asset_not_found() {
    metrics::counter!("gateway_assets_not_found_total").increment(1);
}

/// Record a newly created session. `active` includes it.
pub fn record_session_opened(active: u64) {
    metrics::counter!("gateway_sessions_total").increment(1);
    metrics::gauge!("gateway_sessions_active").set(active as f64);
}

/// Record a session release. `active` excludes it.
pub fn record_session_ended(active: u64) {
    metrics::gauge!("gateway_sessions_active").set(active as f64);
}

/// Record bytes relayed in one direction (`upstream` or `downstream`).
pub fn record_relay_bytes(direction: &'static str, bytes: usize) {
    metrics::counter!("gateway_relay_bytes_total", "direction" => direction).increment(bytes as u64);
}
