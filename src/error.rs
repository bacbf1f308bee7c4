//! Session error taxonomy.
//!
//! Every error here is local to one websocket session. Nothing is reported to
//! the client besides the connection closing: once payload bytes have been
//! sent there is no side channel left on the websocket to carry an error.

use axum::BoxError;

/// Errors that end a proxied websocket session.
#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    /// The upgrade handshake was rejected by the transport.
    #[error("websocket handshake failed: {0}")]
    Handshake(String),

    /// The auth token message could not be read.
    #[error("failed to read auth token: {0}")]
    AuthRead(String),

    /// Receiving from the websocket failed mid-stream.
    #[error("error while reading from websocket: {0}")]
    TransportRead(#[source] BoxError),

    /// Sending to the websocket failed mid-stream.
    #[error("error while writing to websocket: {0}")]
    TransportWrite(#[source] BoxError),

    /// The wrapped handler's response body yielded an error.
    #[error("handler response body failed: {0}")]
    HandlerBody(#[source] BoxError),

    /// An in-memory conduit failed.
    #[error("conduit error: {0}")]
    Conduit(#[from] std::io::Error),

    /// The session was cancelled before the operation completed.
    #[error("session cancelled")]
    Cancelled,
}

impl ProxyError {
    /// Short label used for metrics and log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            ProxyError::Handshake(_) => "handshake",
            ProxyError::AuthRead(_) => "auth_read",
            ProxyError::TransportRead(_) => "transport_read",
            ProxyError::TransportWrite(_) => "transport_write",
            ProxyError::HandlerBody(_) => "handler_body",
            ProxyError::Conduit(_) => "conduit",
            ProxyError::Cancelled => "cancelled",
        }
    }
}
