//! Request adaptation for proxied websocket sessions.
//!
//! # Responsibilities
//! - Capture routing-relevant metadata from the upgrade request
//! - Build the synthetic request the handler sees for a session
//! - Back the request body with the inbound conduit
//!
//! # Design Decisions
//! - Headers are built once: `Host` from the original request and
//!   `Authorization` when a token was captured, nothing else
//! - No `Content-Length`: the body length is unknown up front
//! - The session's cancellation token rides along as an extension

use axum::{
    body::Body,
    extract::ConnectInfo,
    http::{
        header::{AUTHORIZATION, HOST},
        request::Parts,
        HeaderMap, HeaderValue, Method, Request, Uri, Version,
    },
};
use std::net::SocketAddr;
use tokio_util::sync::CancellationToken;

use crate::net::conduit::ConduitReader;

/// Metadata copied from the request that triggered the upgrade.
#[derive(Debug, Clone)]
pub struct RequestMeta {
    pub method: Method,
    pub uri: Uri,
    pub host: Option<HeaderValue>,
    pub remote_addr: Option<SocketAddr>,
}

impl RequestMeta {
    /// Capture metadata from request parts.
    ///
    /// The remote address comes from the `ConnectInfo<SocketAddr>` extension,
    /// which is present when the app is served with connect info.
    pub fn from_parts(parts: &Parts) -> Self {
        Self {
            method: parts.method.clone(),
            uri: parts.uri.clone(),
            host: parts.headers.get(HOST).cloned(),
            remote_addr: parts
                .extensions
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| *addr),
        }
    }
}

/// Build the header map for the adapted request.
pub fn adapted_headers(meta: &RequestMeta, token: Option<&str>) -> HeaderMap {
    let mut headers = HeaderMap::new();
    if let Some(host) = &meta.host {
        headers.insert(HOST, host.clone());
    }
    if let Some(token) = token {
        match HeaderValue::from_str(&format!("Bearer {}", token)) {
            Ok(value) => {
                headers.insert(AUTHORIZATION, value);
            }
            Err(_) => {
                tracing::warn!("Auth token is not a valid header value; dropping it");
            }
        }
    }
    headers
}

/// Build the request the wrapped handler receives for a session.
pub fn adapt_request(
    meta: &RequestMeta,
    rewrite_method: Option<&Method>,
    token: Option<&str>,
    body: ConduitReader,
    cancel: CancellationToken,
) -> Request<Body> {
    let method = rewrite_method.unwrap_or(&meta.method).clone();

    let mut request = Request::new(Body::from_stream(body.into_stream()));
    *request.method_mut() = method;
    *request.uri_mut() = meta.uri.clone();
    *request.version_mut() = Version::HTTP_2;
    *request.headers_mut() = adapted_headers(meta, token);

    let extensions = request.extensions_mut();
    if let Some(addr) = meta.remote_addr {
        extensions.insert(ConnectInfo(addr));
    }
    extensions.insert(cancel);

    request
}
