//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define balancer metrics (sessions, bytes, failures, backend health)
//! - Expose Prometheus-compatible metrics endpoint
//! - Track per-backend and aggregate metrics
//!
//! # Metrics
//! - `lb_sessions_total` (counter): finished sessions by outcome
//! - `lb_connect_failures_total` (counter): backend connect failures
//! - `lb_bytes_total` (counter): relayed bytes by backend, direction
//! - `lb_session_duration_seconds` (histogram): relay duration
//! - `lb_backend_healthy` (gauge): 1=healthy, 0=unhealthy
//! - `lb_backend_active_connections` (gauge): sessions per backend
//!
//! Without an installed recorder every call is a no-op.

use std::net::SocketAddr;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus recorder and its HTTP scrape listener.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

pub fn record_session_end(
    backend: &str,
    outcome: &'static str,
    bytes_up: u64,
    bytes_down: u64,
    duration_ms: u64,
) {
    counter!("lb_sessions_total", "outcome" => outcome).increment(1);
    counter!("lb_bytes_total", "backend" => backend.to_string(), "direction" => "up")
        .increment(bytes_up);
    counter!("lb_bytes_total", "backend" => backend.to_string(), "direction" => "down")
        .increment(bytes_down);
    histogram!("lb_session_duration_seconds", "backend" => backend.to_string())
        .record(duration_ms as f64 / 1000.0);
}

pub fn record_unavailable() {
    counter!("lb_sessions_total", "outcome" => "unavailable").increment(1);
}

pub fn record_connect_failure(backend: &str) {
    counter!("lb_connect_failures_total", "backend" => backend.to_string()).increment(1);
}

pub fn record_backend_health(backend: &str, healthy: bool) {
    gauge!("lb_backend_healthy", "backend" => backend.to_string())
        .set(if healthy { 1.0 } else { 0.0 });
}

pub fn record_active_connections(backend: &str, active: usize) {
    gauge!("lb_backend_active_connections", "backend" => backend.to_string()).set(active as f64);
}
