//! Metrics collection and exposition.
//!
//! # Metrics
//! - `hub_proxy_requests_total` (counter): proxied requests by method, status, target
//! - `hub_proxy_request_duration_seconds` (histogram): latency distribution
//! - `hub_backend_healthy` (gauge): 1=healthy, 0=unhealthy, per remote endpoint
//! - `hub_cache_entries` (gauge): current local cache entry count

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and exposition endpoint.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "metrics endpoint started"),
        Err(e) => tracing::error!(error = %e, "failed to install metrics exporter"),
    }
}

/// Record one proxied request.
pub fn record_proxied_request(method: &str, status: u16, target: &str, start: Instant) {
    counter!(
        "hub_proxy_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string(),
        "target" => target.to_string()
    )
    .increment(1);
    histogram!("hub_proxy_request_duration_seconds", "method" => method.to_string())
        .record(start.elapsed().as_secs_f64());
}

/// Record the probed health of a remote endpoint.
pub fn record_backend_health(endpoint: &str, healthy: bool) {
    gauge!("hub_backend_healthy", "endpoint" => endpoint.to_string())
        .set(if healthy { 1.0 } else { 0.0 });
}

/// Record the current cache entry count.
pub fn record_cache_entries(count: usize) {
    gauge!("hub_cache_entries").set(count as f64);
}
