//! Demo HTTP server.
//!
//! # Responsibilities
//! - Build an axum `Router` around a line-echo handler
//! - Wrap it in the websocket proxy layer
//! - Serve with connect info and graceful shutdown
//! - Give open sessions a grace period to finish after shutdown

use axum::{
    extract::Request,
    http::header::CONTENT_TYPE,
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::config::loader::ConfigError;
use crate::config::ServerConfig;
use crate::http::dispatch::WsProxyLayer;
use crate::lifecycle::Shutdown;

/// HTTP server exposing the echo handler over plain HTTP and websockets.
pub struct HttpServer {
    router: Router,
    config: ServerConfig,
    proxy: WsProxyLayer,
    shutdown: Shutdown,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(config: ServerConfig, shutdown: Shutdown) -> Result<Self, ConfigError> {
        let proxy = WsProxyLayer::with_shutdown(config.proxy.clone(), shutdown.token())?;
        let router = Self::build_router(proxy.clone());
        Ok(Self {
            router,
            config,
            proxy,
            shutdown,
        })
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(proxy: WsProxyLayer) -> Router {
        Router::new()
            .route("/{*path}", any(echo_handler))
            .route("/", any(echo_handler))
            .layer(proxy)
            .layer(TraceLayer::new_for_http())
    }

    /// Run the server, accepting connections on the given listener.
    pub async fn run(self, listener: TcpListener) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let app = self
            .router
            .into_make_service_with_connect_info::<SocketAddr>();
        let shutdown = self.shutdown.clone();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move { shutdown.wait().await })
            .await?;

        let grace = Duration::from_secs(self.config.listener.shutdown_grace_secs);
        let drained = tokio::time::timeout(grace, async {
            while self.proxy.active_sessions() > 0 {
                tokio::time::sleep(Duration::from_millis(100)).await;
            }
        })
        .await;
        if drained.is_err() {
            tracing::warn!(
                active_sessions = self.proxy.active_sessions(),
                "Sessions still open after shutdown grace period"
            );
        }

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Streams the request body straight back as the response body.
///
/// Over a websocket every message comes back as the same message.
async fn echo_handler(request: Request) -> Response {
    (
        [(CONTENT_TYPE, "application/x-ndjson")],
        request.into_body(),
    )
        .into_response()
}
