//! Per-connection session orchestration.
//!
//! # State Machine
//! ```text
//! Init → [Auth] → Streaming → Closed
//!           │                   ▲
//!           └── read failure ───┘
//! ```
//!
//! # Tasks
//! Streaming runs three tokio tasks sharing one cancellation token:
//! - handler: calls the wrapped service, forwards its response
//! - read loop: websocket → request body conduit
//! - write loop: response conduit → websocket
//!
//! The write loop exiting, or the read loop failing, cancels the session.
//! A clean client close only ends the request body: the handler may finish
//! reading it within the configured close grace, and is cancelled after
//! that. The handler only cancels on failure; on success it closes the
//! response conduit and the write loop drains what is left before exiting.

use axum::{
    body::Body,
    extract::ws::WebSocket,
    http::{Method, Request},
    response::Response,
};
use futures_util::{SinkExt, StreamExt};
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tower::{Service, ServiceExt};
use tracing::{Instrument, Span};

use crate::config::ProxyConfig;
use crate::error::ProxyError;
use crate::http::request::{adapt_request, RequestMeta};
use crate::http::response::ResponseForwarder;
use crate::net::conduit::conduit;
use crate::net::connection::{SessionGuard, SessionState};
use crate::observability::metrics;
use crate::session::{auth, read::read_loop, write::write_loop};

/// How long the session waits for the websocket close handshake.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

/// One accepted websocket connection bridged to the wrapped service.
pub struct Session<S> {
    guard: SessionGuard,
    meta: RequestMeta,
    config: Arc<ProxyConfig>,
    rewrite_method: Option<Method>,
    service: S,
    cancel: CancellationToken,
    request_cancel: Option<CancellationToken>,
    span: Span,
}

impl<S> Session<S>
where
    S: Service<Request<Body>, Response = Response, Error = Infallible> + Send + 'static,
    S::Future: Send + 'static,
{
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        guard: SessionGuard,
        meta: RequestMeta,
        config: Arc<ProxyConfig>,
        rewrite_method: Option<Method>,
        service: S,
        cancel: CancellationToken,
        request_cancel: Option<CancellationToken>,
        span: Span,
    ) -> Self {
        Self {
            guard,
            meta,
            config,
            rewrite_method,
            service,
            cancel,
            request_cancel,
            span,
        }
    }

    /// Drive the session to completion. Resolves once every task has
    /// stopped and the websocket has been released.
    pub async fn run(self, socket: WebSocket) {
        let span = self.span.clone();
        self.drive(socket).instrument(span).await
    }

    async fn drive(self, mut socket: WebSocket) {
        let Session {
            guard,
            meta,
            config,
            rewrite_method,
            service,
            cancel,
            request_cancel,
            span: _,
        } = self;

        tracing::debug!(state = %SessionState::Init, "Websocket accepted");

        if let Some(parent) = request_cancel {
            tokio::spawn(link_cancellation(parent, cancel.clone()));
        }

        let token = if config.read_token {
            tracing::debug!(state = %SessionState::Auth, "Waiting for auth token");
            match auth::read_token(&mut socket, config.auth_timeout(), &cancel).await {
                Ok(token) => Some(token),
                Err(e) => {
                    tracing::warn!(error = %e, "Auth handshake failed; handler not invoked");
                    metrics::record_session_error(e.kind());
                    close_socket(socket).await;
                    cancel.cancel();
                    tracing::debug!(state = %SessionState::Closed, "Session closed");
                    drop(guard);
                    return;
                }
            }
        } else {
            None
        };

        tracing::debug!(state = %SessionState::Streaming, "Starting streaming");

        let (body_writer, body_reader) = conduit(config.conduit_capacity);
        let (response_writer, response_reader) = conduit(config.conduit_capacity);
        let request = adapt_request(
            &meta,
            rewrite_method.as_ref(),
            token.as_deref(),
            body_reader,
            cancel.clone(),
        );
        let (mut sink, stream) = socket.split();

        let handler = spawn_task(run_handler(
            service,
            request,
            ResponseForwarder::new(response_writer),
            cancel.clone(),
        ));

        let reader = spawn_task({
            let cancel = cancel.clone();
            let grace = config.close_grace();
            async move {
                let exit = cancel.clone().drop_guard();
                let result = read_loop(stream, body_writer, cancel.clone()).await;
                if result.is_ok() {
                    exit.disarm();
                    await_handler_after_close(&cancel, grace).await;
                }
                result
            }
        });

        let writer = spawn_task({
            let cancel = cancel.clone();
            async move {
                let result = {
                    let _exit = cancel.clone().drop_guard();
                    write_loop(&mut sink, response_reader, cancel).await
                };
                match tokio::time::timeout(CLOSE_TIMEOUT, sink.close()).await {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => tracing::trace!(error = %e, "Websocket already closed"),
                    Err(_) => tracing::debug!("Timed out closing websocket"),
                }
                result
            }
        });

        let (handler, reader, writer) = tokio::join!(handler, reader, writer);
        for (task, outcome) in [("handler", handler), ("read", reader), ("write", writer)] {
            match outcome {
                Ok(Ok(())) | Ok(Err(ProxyError::Cancelled)) => {}
                Ok(Err(e)) => metrics::record_session_error(e.kind()),
                Err(e) => tracing::error!(task, error = %e, "Session task panicked"),
            }
        }

        tracing::debug!(state = %SessionState::Closed, "Session closed");
        drop(guard);
    }
}

fn spawn_task<F>(task: F) -> JoinHandle<Result<(), ProxyError>>
where
    F: std::future::Future<Output = Result<(), ProxyError>> + Send + 'static,
{
    tokio::spawn(task.in_current_span())
}

/// Call the wrapped service exactly once and forward its response.
async fn run_handler<S>(
    service: S,
    request: Request<Body>,
    mut forwarder: ResponseForwarder,
    cancel: CancellationToken,
) -> Result<(), ProxyError>
where
    S: Service<Request<Body>, Response = Response, Error = Infallible> + Send + 'static,
    S::Future: Send + 'static,
{
    let handled = tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(ProxyError::Cancelled),
        handled = async {
            let response = service.oneshot(request).await.unwrap_or_else(|e| match e {});
            forwarder.forward(response).await
        } => handled,
    };

    match handled {
        Ok(()) => {
            forwarder.finish().await?;
            tracing::debug!("Handler finished");
            Ok(())
        }
        Err(ProxyError::Cancelled) => {
            tracing::debug!("Handler cancelled");
            Err(ProxyError::Cancelled)
        }
        Err(e) => {
            tracing::warn!(error = %e, "Handler response could not be forwarded");
            cancel.cancel();
            Err(e)
        }
    }
}

/// After a clean client close the request body has already ended. The
/// handler keeps running until the session ends on its own (the write loop
/// drains or fails) or `grace` runs out.
async fn await_handler_after_close(cancel: &CancellationToken, grace: Duration) {
    tokio::select! {
        _ = cancel.cancelled() => {}
        _ = tokio::time::sleep(grace) => {
            tracing::debug!(grace_ms = grace.as_millis() as u64, "Handler still running after close; cancelling");
            cancel.cancel();
        }
    }
}

/// Cancel `session` when the originating request is cancelled.
async fn link_cancellation(parent: CancellationToken, session: CancellationToken) {
    tokio::select! {
        _ = parent.cancelled() => {
            tracing::debug!("Originating request cancelled");
            session.cancel();
        }
        _ = session.cancelled() => {}
    }
}

async fn close_socket(mut socket: WebSocket) {
    if let Ok(Err(e)) = tokio::time::timeout(CLOSE_TIMEOUT, SinkExt::close(&mut socket)).await {
        tracing::trace!(error = %e, "Websocket already closed");
    }
}
