//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the `tracing` subscriber for the binary
//! - Pick the filter from `RUST_LOG`, falling back to the configured level
//!
//! The library never installs a subscriber itself; sessions log through
//! per-session spans and inherit whatever the host process installed.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::ObservabilityConfig;

/// Default filter used when neither `RUST_LOG` nor the config set a level.
pub const DEFAULT_FILTER: &str = "ws_stream_proxy=debug,tower_http=debug";

/// Build the filter directive for the configured log level.
pub fn filter_directive(config: &ObservabilityConfig) -> String {
    if config.log_level.is_empty() {
        DEFAULT_FILTER.to_string()
    } else {
        format!("ws_stream_proxy={0},tower_http={0}", config.log_level)
    }
}

/// Install the global subscriber. Safe to call once per process.
pub fn init_logging(config: &ObservabilityConfig) {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| filter_directive(config).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
