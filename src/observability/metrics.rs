//! Metrics collection and exposition.
//!
//! # Metrics
//! - `wsproxy_sessions_total` (counter): websocket sessions accepted
//! - `wsproxy_active_sessions` (gauge): sessions currently open
//! - `wsproxy_messages_total` (counter): messages forwarded, by direction
//! - `wsproxy_session_errors_total` (counter): session-ending errors, by kind
//! - `wsproxy_passthrough_total` (counter): plain HTTP requests passed through
//!
//! # Design Decisions
//! - Recorded through the `metrics` facade; without an installed recorder
//!   every call is a no-op
//! - The binary installs the Prometheus exporter when enabled in config

use std::net::SocketAddr;

use metrics::{counter, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Direction a message travelled through the proxy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Websocket → handler request body.
    Inbound,
    /// Handler response → websocket.
    Outbound,
}

impl Direction {
    fn as_str(&self) -> &'static str {
        match self {
            Direction::Inbound => "inbound",
            Direction::Outbound => "outbound",
        }
    }
}

/// Install the Prometheus exporter listening on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    if let Err(e) = PrometheusBuilder::new().with_http_listener(addr).install() {
        tracing::error!(error = %e, "Failed to install Prometheus exporter");
        return;
    }
    tracing::info!(address = %addr, "Metrics exporter listening");
}

pub fn session_opened() {
    counter!("wsproxy_sessions_total").increment(1);
    gauge!("wsproxy_active_sessions").increment(1.0);
}

pub fn session_closed() {
    gauge!("wsproxy_active_sessions").decrement(1.0);
}

pub fn record_message(direction: Direction) {
    counter!("wsproxy_messages_total", "direction" => direction.as_str()).increment(1);
}

pub fn record_session_error(kind: &'static str) {
    counter!("wsproxy_session_errors_total", "kind" => kind).increment(1);
}

pub fn record_passthrough() {
    counter!("wsproxy_passthrough_total").increment(1);
}
