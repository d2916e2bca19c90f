//! Metrics collection and exposition.
//!
//! # Metrics
//! - `stack_requests_total` (counter): requests by method, status, target
//! - `stack_request_duration_seconds` (histogram): latency distribution
//! - `stack_probe_total` (counter): probes by service and result
//! - `stack_service_health` (gauge): 1=healthy, 0=unhealthy
//! - `stack_service_restarts_total` (counter): supervisor restarts
//! - `stack_rate_limited_total` (counter): requests rejected by limiter
//!
//! # Design Decisions
//! - Low-overhead updates; labels for service, method, status
//! - Exposition via the Prometheus exporter on a local port

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter. Must run inside the tokio runtime.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

/// Record a served or proxied request.
pub fn record_request(method: &str, status: u16, target: &str, start_time: Instant) {
    let labels = vec![
        ("method", method.to_string()),
        ("status", status.to_string()),
        ("target", target.to_string()),
    ];
    metrics::counter!("stack_requests_total", &labels).increment(1);
    metrics::histogram!("stack_request_duration_seconds", &labels)
        .record(start_time.elapsed().as_secs_f64());
}

/// Record a probe outcome for a service.
pub fn record_probe(service: &str, healthy: bool) {
    let result = if healthy { "success" } else { "failure" };
    metrics::counter!(
        "stack_probe_total",
        "service" => service.to_string(),
        "result" => result
    )
    .increment(1);
    metrics::gauge!("stack_service_health", "service" => service.to_string())
        .set(if healthy { 1.0 } else { 0.0 });
}

/// Record a supervisor-driven restart.
pub fn record_restart(service: &str) {
    metrics::counter!("stack_service_restarts_total", "service" => service.to_string())
        .increment(1);
}

/// Record a rate-limited request.
pub fn record_rate_limited(target: &str) {
    metrics::counter!("stack_rate_limited_total", "target" => target.to_string()).increment(1);
}
