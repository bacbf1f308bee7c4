//! Websocket bridge for streaming HTTP handlers.
//!
//! Wraps any axum/tower service so that a websocket client can talk to it:
//! each websocket message becomes one `\n`-terminated line of the request
//! body, and each line of the response body becomes one websocket message.
//! Requests that do not ask for a websocket upgrade reach the service
//! untouched.
//!
//! ```no_run
//! use axum::{routing::post, Router};
//! use ws_stream_proxy::{ProxyConfig, WsProxyLayer};
//!
//! # fn build() -> Result<Router, ws_stream_proxy::config::loader::ConfigError> {
//! let layer = WsProxyLayer::new(ProxyConfig {
//!     rewrite_method: "POST".into(),
//!     ..Default::default()
//! })?;
//! let app: Router = Router::new()
//!     .route("/stream", post(|body: axum::body::Body| async move { body }))
//!     .layer(layer);
//! # Ok(app)
//! # }
//! ```

pub mod config;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod session;

pub use config::schema::ProxyConfig;
pub use error::ProxyError;
pub use http::{HttpServer, WsProxy, WsProxyLayer};
pub use lifecycle::Shutdown;
