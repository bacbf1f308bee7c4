//! HTTP side of the websocket bridge.
//!
//! # Data Flow
//! ```text
//! incoming request
//!     → dispatch.rs (Upgrade: websocket?)
//!         no  → wrapped service, untouched
//!         yes → upgrade, hand socket to session::Session
//!     → request.rs (synthetic request, body from inbound conduit)
//!     → wrapped service
//!     → response.rs (response body into outbound conduit)
//! ```

pub mod dispatch;
pub mod request;
pub mod response;
pub mod server;

pub use dispatch::{is_websocket_upgrade, WsProxy, WsProxyLayer};
pub use request::{adapt_request, RequestMeta};
pub use response::ResponseForwarder;
pub use server::HttpServer;
