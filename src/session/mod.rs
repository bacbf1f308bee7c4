//! Websocket session subsystem.
//!
//! # Data Flow
//! ```text
//! websocket message
//!     → read.rs (append '\n', write to request body conduit)
//!     → handler reads request body
//!     → handler writes response (http::response::ResponseForwarder)
//!     → write.rs (one response line → one websocket message)
//!     → websocket message
//! ```
//!
//! # Design Decisions
//! - Exactly one task reads the websocket and exactly one writes it
//! - Conduits are the only data path between tasks; no locks
//! - One cancellation token per session, observed at every blocking point
//! - auth.rs runs before the socket is split, so the token is always read
//!   before any body data is forwarded

pub mod auth;
pub mod proxy;
pub mod read;
pub mod write;

pub use proxy::Session;
