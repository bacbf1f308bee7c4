//! Write loop: handler response lines → websocket messages.

use axum::{extract::ws::Message, BoxError};
use futures_util::{Sink, SinkExt};
use tokio_util::sync::CancellationToken;

use crate::error::ProxyError;
use crate::net::conduit::ConduitReader;
use crate::observability::metrics::{self, Direction};

/// Send each `\n`-terminated chunk of `response` as one websocket message,
/// terminator included, until the handler closes its writer.
pub async fn write_loop<K>(
    sink: &mut K,
    mut response: ConduitReader,
    cancel: CancellationToken,
) -> Result<(), ProxyError>
where
    K: Sink<Message> + Unpin,
    K::Error: Into<BoxError>,
{
    loop {
        let chunk = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ProxyError::Cancelled),
            chunk = response.read_chunk() => chunk,
        };

        let chunk = match chunk {
            Ok(Some(chunk)) => chunk,
            Ok(None) => {
                tracing::debug!("Response finished");
                return Ok(());
            }
            Err(e) => {
                tracing::error!(error = %e, "Error while reading response");
                return Err(ProxyError::Conduit(e));
            }
        };

        let sent = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ProxyError::Cancelled),
            sent = sink.send(into_message(chunk)) => sent,
        };

        if let Err(e) = sent {
            let e: BoxError = e.into();
            tracing::error!(error = %e, "Error while writing to websocket");
            return Err(ProxyError::TransportWrite(e));
        }
        metrics::record_message(Direction::Outbound);
    }
}

/// Text frame for UTF-8 lines, binary frame otherwise.
fn into_message(chunk: Vec<u8>) -> Message {
    match String::from_utf8(chunk) {
        Ok(text) => Message::Text(text.into()),
        Err(e) => Message::Binary(e.into_bytes().into()),
    }
}
