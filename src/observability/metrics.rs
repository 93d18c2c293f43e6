//! Metrics collection and exposition.
//!
//! # Metrics
//! - `client_requests_total` (counter): completed requests by endpoint, outcome
//! - `client_request_duration_seconds` (histogram): end-to-end latency
//! - `client_retries_total` (counter): retry waits by endpoint
//! - `client_circuit_state` (gauge): 0=closed, 1=half-open, 2=open
//! - `client_fallback_served_total` (counter): stale responses served
//! - `client_votes_total` (counter): vote submissions by outcome
//! - `client_notifications_total` (counter): notification lifecycle events
//! - `client_channel_reconnects_total` (counter): live channel reconnects

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter on `addr`. Requires a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request(endpoint: &str, outcome: &'static str, start: Instant) {
    counter!("client_requests_total", "endpoint" => endpoint.to_string(), "outcome" => outcome)
        .increment(1);
    histogram!("client_request_duration_seconds", "endpoint" => endpoint.to_string())
        .record(start.elapsed().as_secs_f64());
}

pub fn record_retry(endpoint: &str) {
    counter!("client_retries_total", "endpoint" => endpoint.to_string()).increment(1);
}

pub fn record_circuit_state(key: &str, state: f64) {
    gauge!("client_circuit_state", "key" => key.to_string()).set(state);
}

pub fn record_fallback_served(key: &str) {
    counter!("client_fallback_served_total", "key" => key.to_string()).increment(1);
}

pub fn record_vote(outcome: &'static str) {
    counter!("client_votes_total", "outcome" => outcome).increment(1);
}

pub fn record_notification(event: &'static str) {
    counter!("client_notifications_total", "event" => event).increment(1);
}

pub fn record_channel_reconnect() {
    counter!("client_channel_reconnects_total").increment(1);
}
