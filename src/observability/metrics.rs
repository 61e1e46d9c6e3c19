//! Metrics collection and exposition.
//!
//! # Metrics
//! - `api_requests_total` (counter): requests by method, status
//! - `api_request_duration_seconds` (histogram): latency distribution
//! - `api_active_connections` (gauge): current connection count
//! - `api_rate_limited_total` (counter): requests denied admission
//! - `api_rate_limit_clients` (gauge): clients tracked by the limiter
//! - `api_rate_limit_evictions_total` (counter): idle clients swept
//!
//! Recording is a no-op until [`init_metrics`] installs the exporter.

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus exporter with its own HTTP listener.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

pub fn record_request(method: &str, status: u16, start: Instant) {
    metrics::counter!(
        "api_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    metrics::histogram!("api_request_duration_seconds").record(start.elapsed().as_secs_f64());
}

pub fn record_active_connections(count: usize) {
    metrics::gauge!("api_active_connections").set(count as f64);
}

pub fn record_rate_limited() {
    metrics::counter!("api_rate_limited_total").increment(1);
}

pub fn record_rate_limit_clients(count: usize) {
    metrics::gauge!("api_rate_limit_clients").set(count as f64);
}

pub fn record_rate_limit_evictions(count: usize) {
    metrics::counter!("api_rate_limit_evictions_total").increment(count as u64);
}
