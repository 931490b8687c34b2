//! Metrics collection and exposition.
//!
//! # Metrics
//! - `kvgate_connection_transitions_total` (counter): state changes by target state
//! - `kvgate_connection_ready` (gauge): 1=ready, 0=anything else
//! - `kvgate_reconnect_attempts_total` (counter): reconnect attempts, by result
//! - `kvgate_rate_limit_checks_total` (counter): checks by prefix and outcome
//!
//! Recording goes through the `metrics` facade and is a no-op until a
//! recorder is installed.

use std::net::SocketAddr;

use metrics::{counter, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::connection::ConnectionState;

/// Install the Prometheus exporter and serve it on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_transition(to: ConnectionState) {
    counter!("kvgate_connection_transitions_total", "to" => to.as_str()).increment(1);
    gauge!("kvgate_connection_ready").set(if to.is_ready() { 1.0 } else { 0.0 });
}

pub fn record_reconnect_attempt(success: bool) {
    let result = if success { "success" } else { "failure" };
    counter!("kvgate_reconnect_attempts_total", "result" => result).increment(1);
}

/// Outcome of one rate limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckOutcome {
    Allowed,
    Limited,
    FailOpen,
}

impl CheckOutcome {
    fn as_str(self) -> &'static str {
        match self {
            CheckOutcome::Allowed => "allowed",
            CheckOutcome::Limited => "limited",
            CheckOutcome::FailOpen => "fail_open",
        }
    }
}

pub fn record_rate_limit_check(prefix: &str, outcome: CheckOutcome) {
    counter!(
        "kvgate_rate_limit_checks_total",
        "prefix" => prefix.to_string(),
        "outcome" => outcome.as_str()
    )
    .increment(1);
}
