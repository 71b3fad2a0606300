//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gateway_requests_total` (counter): protected calls by dependency, outcome
//! - `gateway_downstream_duration_seconds` (histogram): attempt latency
//! - `gateway_breaker_state` (gauge): 0=closed, 1=half-open, 2=open
//! - `gateway_breaker_transitions_total` (counter): transitions by target state
//! - `gateway_shared_store_errors_total` (counter): store failures by operation
//!
//! Without an installed recorder every call here is a no-op.

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::resilience::BreakerState;

/// Install the Prometheus recorder and its HTTP listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

/// `outcome` is one of success, failure, rejected_local, rejected_shared.
pub fn record_call(dependency: &str, outcome: &'static str) {
    counter!(
        "gateway_requests_total",
        "dependency" => dependency.to_string(),
        "outcome" => outcome
    )
    .increment(1);
}

pub fn record_downstream_latency(dependency: &str, started: Instant) {
    histogram!(
        "gateway_downstream_duration_seconds",
        "dependency" => dependency.to_string()
    )
    .record(started.elapsed().as_secs_f64());
}

pub fn record_breaker_state(dependency: &str, state: BreakerState) {
    gauge!("gateway_breaker_state", "dependency" => dependency.to_string())
        .set(state.gauge_value());
}

pub fn record_transition(dependency: &str, to: BreakerState) {
    counter!(
        "gateway_breaker_transitions_total",
        "dependency" => dependency.to_string(),
        "to" => to.as_str()
    )
    .increment(1);
}

pub fn record_store_error(op: &'static str) {
    counter!("gateway_shared_store_errors_total", "op" => op).increment(1);
}
