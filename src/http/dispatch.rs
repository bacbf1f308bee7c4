//! Upgrade dispatch: plain HTTP passes through, websockets get a session.
//!
//! # Responsibilities
//! - Detect websocket upgrade requests by the `Upgrade` header
//! - Call the wrapped service untouched for everything else
//! - Complete the upgrade and hand the socket to a `Session`
//!
//! # Design Decisions
//! - Exposed as a tower `Service` plus `Layer`, so it wraps an axum
//!   `Router` or any service with the same request/response types
//! - Upgrade rejections from the transport are returned as-is; the wrapped
//!   service never sees a request whose upgrade failed

use axum::{
    body::Body,
    extract::{FromRequestParts, WebSocketUpgrade},
    http::{header::UPGRADE, HeaderMap, Method, Request},
    response::{IntoResponse, Response},
};
use futures_util::future::BoxFuture;
use std::convert::Infallible;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio_util::sync::CancellationToken;
use tower::{Layer, Service};

use crate::config::loader::ConfigError;
use crate::config::validation::{validate_proxy_config, ValidationError};
use crate::config::ProxyConfig;
use crate::error::ProxyError;
use crate::http::request::RequestMeta;
use crate::net::connection::SessionTracker;
use crate::observability::metrics;
use crate::session::Session;

/// True when the `Upgrade` header asks for a websocket (case-insensitive).
pub fn is_websocket_upgrade(headers: &HeaderMap) -> bool {
    headers
        .get(UPGRADE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.eq_ignore_ascii_case("websocket"))
}

/// State shared by every clone of a proxy.
#[derive(Debug)]
struct Shared {
    config: Arc<ProxyConfig>,
    rewrite_method: Option<Method>,
    shutdown: CancellationToken,
    tracker: SessionTracker,
}

impl Shared {
    fn new(config: ProxyConfig, shutdown: CancellationToken) -> Result<Self, ConfigError> {
        validate_proxy_config(&config).map_err(ConfigError::Validation)?;

        let rewrite_method = if config.rewrite_method.is_empty() {
            None
        } else {
            Some(
                Method::from_bytes(config.rewrite_method.as_bytes()).map_err(|_| {
                    ConfigError::Validation(vec![ValidationError::InvalidRewriteMethod(
                        config.rewrite_method.clone(),
                    )])
                })?,
            )
        };

        Ok(Self {
            config: Arc::new(config),
            rewrite_method,
            shutdown,
            tracker: SessionTracker::new(),
        })
    }
}

/// Layer that wraps services in a [`WsProxy`].
#[derive(Debug, Clone)]
pub struct WsProxyLayer {
    shared: Arc<Shared>,
}

impl WsProxyLayer {
    pub fn new(config: ProxyConfig) -> Result<Self, ConfigError> {
        Self::with_shutdown(config, CancellationToken::new())
    }

    /// Tie every session to `shutdown`: cancelling it tears sessions down.
    pub fn with_shutdown(
        config: ProxyConfig,
        shutdown: CancellationToken,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            shared: Arc::new(Shared::new(config, shutdown)?),
        })
    }

    /// Sessions currently open across every service built by this layer.
    pub fn active_sessions(&self) -> u64 {
        self.shared.tracker.active_count()
    }
}

impl<S> Layer<S> for WsProxyLayer {
    type Service = WsProxy<S>;

    fn layer(&self, inner: S) -> Self::Service {
        WsProxy {
            inner,
            shared: Arc::clone(&self.shared),
        }
    }
}

/// Service that serves websocket upgrades through a streaming session and
/// passes every other request to `inner`.
#[derive(Debug, Clone)]
pub struct WsProxy<S> {
    inner: S,
    shared: Arc<Shared>,
}

impl<S> WsProxy<S> {
    pub fn new(config: ProxyConfig, inner: S) -> Result<Self, ConfigError> {
        Ok(WsProxyLayer::new(config)?.layer(inner))
    }

    pub fn with_shutdown(
        config: ProxyConfig,
        shutdown: CancellationToken,
        inner: S,
    ) -> Result<Self, ConfigError> {
        Ok(WsProxyLayer::with_shutdown(config, shutdown)?.layer(inner))
    }

    pub fn config(&self) -> &ProxyConfig {
        &self.shared.config
    }

    pub fn active_sessions(&self) -> u64 {
        self.shared.tracker.active_count()
    }
}

impl<S> Service<Request<Body>> for WsProxy<S>
where
    S: Service<Request<Body>, Response = Response, Error = Infallible> + Clone + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = Response;
    type Error = Infallible;
    type Future = BoxFuture<'static, Result<Response, Infallible>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: Request<Body>) -> Self::Future {
        // The readied service handles this request; the clone stays behind.
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        if !is_websocket_upgrade(request.headers()) {
            metrics::record_passthrough();
            return Box::pin(inner.call(request));
        }

        let shared = Arc::clone(&self.shared);
        Box::pin(async move { Ok(upgrade(shared, inner, request).await) })
    }
}

async fn upgrade<S>(shared: Arc<Shared>, inner: S, request: Request<Body>) -> Response
where
    S: Service<Request<Body>, Response = Response, Error = Infallible> + Send + 'static,
    S::Future: Send + 'static,
{
    let (mut parts, _body) = request.into_parts();
    let meta = RequestMeta::from_parts(&parts);
    let request_cancel = parts.extensions.get::<CancellationToken>().cloned();

    let ws = match WebSocketUpgrade::from_request_parts(&mut parts, &()).await {
        Ok(ws) => ws,
        Err(rejection) => {
            let err = ProxyError::Handshake(rejection.body_text());
            tracing::warn!(
                method = %meta.method,
                uri = %meta.uri,
                error = %err,
                "Rejecting websocket upgrade"
            );
            metrics::record_session_error(err.kind());
            return rejection.into_response();
        }
    };

    let guard = shared.tracker.track();
    let span = tracing::info_span!(
        "ws_session",
        session_id = %guard.id(),
        method = %meta.method,
        uri = %meta.uri,
        remote_addr = ?meta.remote_addr,
    );
    tracing::info!(parent: &span, "Upgrading to websocket");

    let session = Session::new(
        guard,
        meta,
        Arc::clone(&shared.config),
        shared.rewrite_method.clone(),
        inner,
        shared.shutdown.child_token(),
        request_cancel,
        span,
    );

    ws.max_message_size(shared.config.max_message_size)
        .on_failed_upgrade(|e: axum::Error| {
            let err = ProxyError::Handshake(e.to_string());
            tracing::warn!(error = %err, "Websocket upgrade failed");
            metrics::record_session_error(err.kind());
        })
        .on_upgrade(move |socket| session.run(socket))
}
