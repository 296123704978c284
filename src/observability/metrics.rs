//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gateway_requests_total` (counter): proxied requests by method, status, upstream
//! - `gateway_request_duration_seconds` (histogram): upstream round-trip latency
//! - `gateway_upstream_errors_total` (counter): failed upstream exchanges
//! - `gateway_rate_limited_total` (counter): requests rejected by a limiter
//! - `gateway_limiter_keys` (gauge): keys left in each limiter store after a sweep
//! - `gateway_active_connections` (gauge): currently tracked connections
//!
//! Recording is a no-op until a recorder is installed by [`init_metrics`].

use std::net::SocketAddr;
use std::time::{Duration, Instant};

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus recorder and serve `/metrics` on `addr`.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Prometheus exporter listening");
    Ok(())
}

pub fn record_request(method: &str, status: u16, upstream: &str, start: Instant) {
    let labels = [
        ("method", method.to_string()),
        ("status", status.to_string()),
        ("upstream", upstream.to_string()),
    ];
    counter!("gateway_requests_total", &labels).increment(1);
    histogram!("gateway_request_duration_seconds", &labels).record(start.elapsed().as_secs_f64());
}

pub fn record_upstream_error(upstream: &str) {
    counter!("gateway_upstream_errors_total", "upstream" => upstream.to_string()).increment(1);
}

pub fn record_rate_limited(route: &str) {
    counter!("gateway_rate_limited_total", "route" => route.to_string()).increment(1);
}

pub fn record_cleanup(store: usize, deleted: usize, remaining: usize, elapsed: Duration) {
    let store = store.to_string();
    counter!("gateway_limiter_keys_evicted_total", "store" => store.clone())
        .increment(deleted as u64);
    gauge!("gateway_limiter_keys", "store" => store.clone()).set(remaining as f64);
    histogram!("gateway_limiter_sweep_seconds", "store" => store).record(elapsed.as_secs_f64());
}

pub fn set_active_connections(count: usize) {
    gauge!("gateway_active_connections").set(count as f64);
}
