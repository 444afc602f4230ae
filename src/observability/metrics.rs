//! Metrics collection and exposition.

use std::net::SocketAddr;

use metrics::{counter, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Initialize the Prometheus exporter and its scrape endpoint.
pub fn init_metrics(addr: SocketAddr) {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .expect("failed to install Prometheus recorder");

    tracing::info!("metrics server listening on http://{}", addr);
}

/// Record a session starting.
pub fn record_session_opened() {
    counter!("proxy_sessions_total").increment(1);
    gauge!("proxy_active_sessions").increment(1.0);
}

/// Record a session ending.
pub fn record_session_closed() {
    gauge!("proxy_active_sessions").decrement(1.0);
}

/// Record a backend fault raised by a forwarding task.
pub fn record_fault(kind: &str) {
    counter!("proxy_backend_faults_total", "kind" => kind.to_string()).increment(1);
}

/// Record the outcome of a reconnection cycle.
pub fn record_reconnect(success: bool) {
    let result = if success { "ok" } else { "failed" };
    counter!("proxy_reconnects_total", "result" => result).increment(1);
}

/// Record an upgrade rejected because the session limit was reached.
pub fn record_rejected_at_limit() {
    counter!("proxy_rejected_at_limit_total").increment(1);
}
