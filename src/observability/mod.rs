//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Sessions and the dispatcher produce:
//!     → tracing events inside a per-session span (session id, method, uri)
//!     → metrics.rs (counters, gauges)
//!
//! The binary consumes them through:
//!     → logging.rs (tracing-subscriber with env filter)
//!     → metrics.rs (Prometheus exporter, optional)
//! ```

pub mod logging;
pub mod metrics;
