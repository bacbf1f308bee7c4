//! Response forwarding onto the outbound conduit.
//!
//! # Responsibilities
//! - Give the handler a response-writing surface backed by a conduit
//! - Forward body bytes verbatim, in order
//! - Accept status and headers without transport effect
//!
//! # Design Decisions
//! - The websocket has no header channel, so headers stay local
//! - Flushing is a no-op: conduit writes are visible to the reader at once
//! - Trailers are dropped

use axum::{
    http::{HeaderMap, StatusCode},
    response::Response,
};
use futures_util::StreamExt;

use crate::error::ProxyError;
use crate::net::conduit::ConduitWriter;

/// Writes a handler's response into the outbound conduit.
#[derive(Debug)]
pub struct ResponseForwarder {
    writer: ConduitWriter,
    headers: HeaderMap,
}

impl ResponseForwarder {
    pub fn new(writer: ConduitWriter) -> Self {
        Self {
            writer,
            headers: HeaderMap::new(),
        }
    }

    /// Response headers. Accepted but never sent.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// No-op: there is nowhere to send a status code.
    pub fn set_status(&mut self, status: StatusCode) {
        tracing::trace!(status = %status, "Dropping response status");
    }

    /// Forward `bytes` verbatim.
    pub async fn write(&mut self, bytes: &[u8]) -> Result<(), ProxyError> {
        self.writer.write_all(bytes).await?;
        Ok(())
    }

    /// No-op: every `write` is already visible to the reader.
    pub fn flush(&mut self) {}

    /// Apply a complete response: status and headers through the surface
    /// above, then every data frame of the body through `write`.
    pub async fn forward(&mut self, response: Response) -> Result<(), ProxyError> {
        let (parts, body) = response.into_parts();
        self.set_status(parts.status);
        self.headers.extend(parts.headers);

        let mut frames = body.into_data_stream();
        while let Some(chunk) = frames.next().await {
            let chunk = chunk.map_err(|e| ProxyError::HandlerBody(e.into()))?;
            self.write(&chunk).await?;
        }
        self.flush();
        Ok(())
    }

    /// Close the outbound conduit so the write loop sees end-of-stream.
    pub async fn finish(self) -> Result<(), ProxyError> {
        self.writer.close().await?;
        Ok(())
    }
}
