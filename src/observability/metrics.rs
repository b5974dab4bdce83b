//! Metrics collection and exposition.
//!
//! # Metrics
//! - `switchyard_requests_total` (counter): requests by method, status
//! - `switchyard_request_duration_seconds` (histogram): pipeline latency
//! - `switchyard_cache_lookups_total` (counter): cache result (hit, miss, bypass)
//! - `switchyard_routes_registered` (gauge): size of the route table
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade; without an installed
//!   recorder every call is a no-op
//! - The Prometheus exporter is opt-in and serves its own listener

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusBuilder;

pub const REQUESTS_TOTAL: &str = "switchyard_requests_total";
pub const REQUEST_DURATION: &str = "switchyard_request_duration_seconds";
pub const CACHE_LOOKUPS_TOTAL: &str = "switchyard_cache_lookups_total";
pub const ROUTES_REGISTERED: &str = "switchyard_routes_registered";

/// Install the Prometheus recorder and its scrape endpoint on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

/// Record one dispatched request.
pub fn record_request(method: &str, status: u16, started: Instant) {
    let labels = [
        ("method", method.to_string()),
        ("status", status.to_string()),
    ];
    metrics::counter!(REQUESTS_TOTAL, &labels).increment(1);
    metrics::histogram!(REQUEST_DURATION, &labels).record(started.elapsed().as_secs_f64());
}

/// Record a cache lookup outcome: `hit`, `miss` or `bypass`.
pub fn record_cache_lookup(result: &'static str) {
    metrics::counter!(CACHE_LOOKUPS_TOTAL, "result" => result).increment(1);
}

pub fn record_route_count(count: usize) {
    metrics::gauge!(ROUTES_REGISTERED).set(count as f64);
}
