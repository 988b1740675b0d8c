//! Metrics collection and exposition.
//!
//! # Metrics
//! - `admission_requests_total` (counter): requests by method, status, class
//! - `admission_request_duration_seconds` (histogram): latency by class
//! - `admission_denied_total` (counter): denials by gate
//!
//! Recording is a no-op until [`init_metrics`] installs the Prometheus
//! recorder, which keeps unit tests free of global state.

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and start the scrape endpoint.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint started"),
        Err(e) => tracing::error!(error = %e, "Failed to start metrics endpoint"),
    }
}

/// Record one completed request.
pub fn record_request(method: &str, status: u16, class: &'static str, start: Instant) {
    counter!(
        "admission_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string(),
        "class" => class
    )
    .increment(1);
    histogram!("admission_request_duration_seconds", "class" => class)
        .record(start.elapsed().as_secs_f64());
}

/// Record a denial by the named gate.
pub fn record_denied(gate: &'static str) {
    counter!("admission_denied_total", "gate" => gate).increment(1);
}
