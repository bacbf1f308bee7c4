//! Read loop: websocket messages → handler request body.

use axum::{body::Bytes, extract::ws::Message, BoxError};
use futures_util::{Stream, StreamExt};
use std::io::ErrorKind;
use tokio_util::sync::CancellationToken;

use crate::error::ProxyError;
use crate::net::conduit::ConduitWriter;
use crate::observability::metrics::{self, Direction};

/// Forward every data message from `stream` into `body` as one
/// `\n`-terminated line, in arrival order.
///
/// Returns `Ok(())` on a clean close (close frame or end of stream). The
/// body conduit is closed on every exit path so the handler sees
/// end-of-body. If the handler drops its request body, further messages are
/// discarded but the loop keeps reading so it still observes the close.
pub async fn read_loop<S, E>(
    mut stream: S,
    body: ConduitWriter,
    cancel: CancellationToken,
) -> Result<(), ProxyError>
where
    S: Stream<Item = Result<Message, E>> + Unpin,
    E: Into<BoxError>,
{
    let mut body = Some(body);

    let result = loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => break Err(ProxyError::Cancelled),
            next = stream.next() => next,
        };

        let payload = match next {
            Some(Ok(Message::Text(text))) => Bytes::copy_from_slice(text.as_str().as_bytes()),
            Some(Ok(Message::Binary(bytes))) => bytes,
            Some(Ok(Message::Ping(_) | Message::Pong(_))) => continue,
            Some(Ok(Message::Close(frame))) => {
                tracing::debug!(frame = ?frame, "Websocket closed by client");
                break Ok(());
            }
            None => {
                tracing::debug!("Websocket stream ended");
                break Ok(());
            }
            Some(Err(e)) => {
                let e: BoxError = e.into();
                tracing::error!(error = %e, "Error while reading from websocket");
                break Err(ProxyError::TransportRead(e));
            }
        };

        let Some(writer) = body.as_mut() else {
            tracing::trace!(bytes = payload.len(), "Discarding message; request body dropped");
            continue;
        };

        let written = tokio::select! {
            biased;
            _ = cancel.cancelled() => break Err(ProxyError::Cancelled),
            written = writer.write_line(&payload) => written,
        };

        match written {
            Ok(()) => metrics::record_message(Direction::Inbound),
            Err(e) if e.kind() == ErrorKind::BrokenPipe => {
                tracing::debug!("Handler dropped the request body; discarding further messages");
                body = None;
            }
            Err(e) => {
                tracing::error!(error = %e, "Error while writing request body");
                break Err(ProxyError::Conduit(e));
            }
        }
    };

    if let Some(writer) = body {
        if let Err(e) = writer.close().await {
            tracing::trace!(error = %e, "Request body already closed");
        }
    }
    result
}
