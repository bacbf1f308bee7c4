//! Configuration schema definitions.
//!
//! `ProxyConfig` is what the library needs: it is built once and handed to
//! `WsProxy::new`. `ServerConfig` wraps it with the settings the demo binary
//! needs to run a listener. All types derive Serde traits for TOML files.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Per-proxy configuration, immutable after construction.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct ProxyConfig {
    /// Require the first websocket message to be a bearer token.
    pub read_token: bool,

    /// Method forwarded to the handler. Empty keeps the original method.
    pub rewrite_method: String,

    /// Bytes buffered in each direction before the writer has to wait.
    pub conduit_capacity: usize,

    /// Largest websocket message accepted from the client.
    pub max_message_size: usize,

    /// Deadline for the auth token message. `None` waits indefinitely.
    pub auth_timeout_secs: Option<u64>,

    /// How long the handler may keep running after the client closes the
    /// websocket cleanly, so it can drain its request body.
    pub close_grace_ms: u64,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            read_token: false,
            rewrite_method: String::new(),
            conduit_capacity: 64 * 1024,
            max_message_size: 64 << 20,
            auth_timeout_secs: None,
            close_grace_ms: 5_000,
        }
    }
}

impl ProxyConfig {
    /// Auth deadline as a `Duration`, if one is configured.
    pub fn auth_timeout(&self) -> Option<Duration> {
        self.auth_timeout_secs.map(Duration::from_secs)
    }

    /// Handler grace period after a clean client close.
    pub fn close_grace(&self) -> Duration {
        Duration::from_millis(self.close_grace_ms)
    }
}

/// Root configuration for the demo server binary.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ServerConfig {
    /// Listener configuration.
    pub listener: ListenerConfig,

    /// Websocket proxy settings.
    pub proxy: ProxyConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Seconds allowed for open sessions to finish after shutdown begins.
    pub shutdown_grace_secs: u64,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            shutdown_grace_secs: 10,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
