//! Bearer token handshake.
//!
//! When `read_token` is set, the first data message of a session is taken
//! as the bearer token before any body data flows.

use axum::{extract::ws::Message, BoxError};
use futures_util::{Stream, StreamExt};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::error::ProxyError;

/// Read exactly one data message and return it as the token.
///
/// Ping and pong frames are skipped. A close frame, end of stream, read
/// error, expired `timeout` or cancellation all fail with `AuthRead`
/// (or `Cancelled`).
pub async fn read_token<S, E>(
    stream: &mut S,
    timeout: Option<Duration>,
    cancel: &CancellationToken,
) -> Result<String, ProxyError>
where
    S: Stream<Item = Result<Message, E>> + Unpin,
    E: Into<BoxError>,
{
    let receive = next_data_message(stream);
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(ProxyError::Cancelled),
        received = async {
            match timeout {
                Some(limit) => tokio::time::timeout(limit, receive)
                    .await
                    .unwrap_or_else(|_| Err(ProxyError::AuthRead("timed out".into()))),
                None => receive.await,
            }
        } => received,
    }
}

async fn next_data_message<S, E>(stream: &mut S) -> Result<String, ProxyError>
where
    S: Stream<Item = Result<Message, E>> + Unpin,
    E: Into<BoxError>,
{
    loop {
        match stream.next().await {
            Some(Ok(Message::Text(text))) => return Ok(text.as_str().to_owned()),
            Some(Ok(Message::Binary(bytes))) => {
                return Ok(String::from_utf8_lossy(&bytes).into_owned())
            }
            Some(Ok(Message::Ping(_) | Message::Pong(_))) => continue,
            Some(Ok(Message::Close(_))) | None => {
                return Err(ProxyError::AuthRead("connection closed".into()))
            }
            Some(Err(e)) => {
                let e: BoxError = e.into();
                return Err(ProxyError::AuthRead(e.to_string()));
            }
        }
    }
}
