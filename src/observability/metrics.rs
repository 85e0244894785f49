//! Metrics collection and exposition.
//!
//! # Metrics
//! - `hunt_requests_total` (counter): total requests by method, status
//! - `hunt_request_duration_seconds` (histogram): latency distribution
//! - `hunt_rate_limited_total` (counter): admissions denied
//! - `hunt_rate_limit_clients` (gauge): tracked client entries
//! - `hunt_rate_limit_evictions_total` (counter): entries removed by the sweep
//! - `hunt_identity_resolutions_total` (counter): resolution outcomes
//! - `hunt_edit_conflicts_total` (counter): rejected stale writes by resource
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade; without an installed
//!   recorder every call is a no-op, so tests need no setup

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its scrape listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request(method: &str, status: u16, start: Instant) {
    counter!(
        "hunt_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    histogram!("hunt_request_duration_seconds", "method" => method.to_string())
        .record(start.elapsed().as_secs_f64());
}

pub fn record_rate_limited() {
    counter!("hunt_rate_limited_total").increment(1);
}

pub fn record_client_count(count: usize) {
    gauge!("hunt_rate_limit_clients").set(count as f64);
}

pub fn record_evictions(count: usize) {
    counter!("hunt_rate_limit_evictions_total").increment(count as u64);
}

/// `outcome` is one of: anonymous, user, admin, invalid, error.
pub fn record_identity_resolution(outcome: &'static str) {
    counter!("hunt_identity_resolutions_total", "outcome" => outcome).increment(1);
}

pub fn record_edit_conflict(resource: &'static str) {
    counter!("hunt_edit_conflicts_total", "resource" => resource).increment(1);
}
