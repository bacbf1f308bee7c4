//! End-to-end tests: a real websocket client against a wrapped axum router.

use axum::{
    body::Body,
    http::{header::AUTHORIZATION, HeaderMap, Method},
    routing::any,
    Router,
};
use futures_util::{stream, SinkExt, StreamExt, TryStreamExt};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::tungstenite::Message;
use tokio_util::io::StreamReader;
use tokio_util::sync::CancellationToken;
use ws_stream_proxy::{ProxyConfig, WsProxyLayer};

mod common;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Payload {
    #[serde(skip_serializing_if = "Option::is_none")]
    foo: Option<String>,
}

fn payload(foo: &str) -> Payload {
    Payload {
        foo: Some(foo.to_string()),
    }
}

/// Request body as a buffered reader, for line-by-line parsing.
fn body_reader(body: Body) -> impl AsyncBufRead + Unpin {
    StreamReader::new(body.into_data_stream().map_err(std::io::Error::other))
}

#[tokio::test]
async fn handler_lines_arrive_as_messages() {
    let expected = vec![payload("bar"), payload("baz")];

    let lines = expected.clone();
    let app = Router::new()
        .route(
            "/",
            any(move || {
                let lines = lines.clone();
                async move {
                    let chunks = lines.into_iter().map(|p| {
                        let mut line = serde_json::to_vec(&p).unwrap();
                        line.push(b'\n');
                        Ok::<_, Infallible>(line)
                    });
                    Body::from_stream(stream::iter(chunks))
                }
            }),
        )
        .layer(WsProxyLayer::new(ProxyConfig::default()).unwrap());

    let addr = common::serve(app).await;
    let mut ws = common::dial(addr).await;

    for want in &expected {
        let text = common::next_text(&mut ws).await.expect("message");
        assert!(text.ends_with('\n'));
        let got: Payload = serde_json::from_str(text.trim_end()).unwrap();
        assert_eq!(&got, want);
    }
    assert_eq!(common::next_text(&mut ws).await, None);
}

#[tokio::test]
async fn client_messages_arrive_as_body_lines() {
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();
    let app = Router::new()
        .route(
            "/",
            any(move |body: Body| {
                let tx = tx.clone();
                async move {
                    let mut lines = body_reader(body).lines();
                    while let Ok(Some(line)) = lines.next_line().await {
                        let _ = tx.send(line);
                    }
                }
            }),
        )
        .layer(WsProxyLayer::new(ProxyConfig::default()).unwrap());

    let addr = common::serve(app).await;
    let mut ws = common::dial(addr).await;

    ws.send(Message::text("bar")).await.unwrap();
    ws.send(Message::text("baz")).await.unwrap();

    for want in ["bar", "baz"] {
        let got = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("line within timeout");
        assert_eq!(got.as_deref(), Some(want));
    }
    ws.close(None).await.unwrap();
}

#[tokio::test]
async fn clean_close_lets_handler_read_to_end_of_body() {
    let (tx, mut rx) = mpsc::unbounded_channel::<Vec<String>>();
    let app = Router::new()
        .route(
            "/",
            any(move |body: Body| {
                let tx = tx.clone();
                async move {
                    let mut lines = body_reader(body).lines();
                    let mut seen = Vec::new();
                    while let Ok(Some(line)) = lines.next_line().await {
                        seen.push(line);
                    }
                    let _ = tx.send(seen);
                }
            }),
        )
        .layer(WsProxyLayer::new(ProxyConfig::default()).unwrap());

    let addr = common::serve(app).await;

    for _ in 0..10 {
        let mut ws = common::dial(addr).await;
        for line in ["a", "b", "c"] {
            ws.send(Message::text(line)).await.unwrap();
        }
        ws.close(None).await.unwrap();

        let seen = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("handler reached end of body")
            .unwrap();
        assert_eq!(seen, vec!["a", "b", "c"]);
    }
}

#[tokio::test]
async fn handler_ignoring_body_ends_after_close_grace() {
    let config = ProxyConfig {
        close_grace_ms: 200,
        ..Default::default()
    };
    let layer = WsProxyLayer::new(config).unwrap();
    let (tx, dropped) = oneshot::channel();
    let signal = Arc::new(Mutex::new(Some(tx)));
    let app = Router::new()
        .route(
            "/",
            any(move || {
                let guard = DropSignal(signal.lock().unwrap().take());
                async move {
                    let _guard = guard;
                    std::future::pending::<()>().await;
                }
            }),
        )
        .layer(layer.clone());

    let addr = common::serve(app).await;
    let mut ws = common::dial(addr).await;
    ws.send(Message::text("ignored")).await.unwrap();
    ws.close(None).await.unwrap();

    tokio::time::timeout(Duration::from_secs(2), dropped)
        .await
        .expect("handler dropped after the close grace")
        .unwrap();
    assert!(common::eventually(Duration::from_secs(2), || layer.active_sessions() == 0).await);
}

#[tokio::test]
async fn echo_preserves_count_and_order() {
    let app = Router::new()
        .route("/", any(|body: Body| async move { body }))
        .layer(WsProxyLayer::new(ProxyConfig::default()).unwrap());

    let addr = common::serve(app).await;
    let mut ws = common::dial(addr).await;

    let (mut sink, mut source) = ws.split();
    let sender = tokio::spawn(async move {
        for i in 0..100 {
            sink.send(Message::text(format!("msg-{}", i))).await.unwrap();
        }
        sink
    });

    for i in 0..100 {
        let next = tokio::time::timeout(Duration::from_secs(5), source.next())
            .await
            .expect("echo within timeout")
            .expect("connection open")
            .unwrap();
        assert_eq!(next.to_text().unwrap(), format!("msg-{}\n", i));
    }

    let sink = sender.await.unwrap();
    ws = sink.reunite(source).unwrap();
    ws.close(None).await.unwrap();
}

#[tokio::test]
async fn read_token_sets_authorization_header() {
    let (tx, mut rx) = mpsc::unbounded_channel::<(Option<String>, Vec<String>)>();
    let config = ProxyConfig {
        read_token: true,
        ..Default::default()
    };
    let app = Router::new()
        .route(
            "/",
            any(move |headers: HeaderMap, body: Body| {
                let tx = tx.clone();
                async move {
                    let auth = headers
                        .get(AUTHORIZATION)
                        .and_then(|v| v.to_str().ok())
                        .map(str::to_owned);
                    let mut lines = body_reader(body).lines();
                    let mut seen = Vec::new();
                    while let Ok(Some(line)) = lines.next_line().await {
                        seen.push(line);
                    }
                    let _ = tx.send((auth, seen));
                }
            }),
        )
        .layer(WsProxyLayer::new(config).unwrap());

    let addr = common::serve(app).await;
    let mut ws = common::dial(addr).await;
    ws.send(Message::text("dummy token")).await.unwrap();
    ws.send(Message::text("payload")).await.unwrap();
    ws.close(None).await.unwrap();

    let (auth, lines) = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("handler invoked")
        .unwrap();
    assert_eq!(auth.as_deref(), Some("Bearer dummy token"));
    assert_eq!(lines, vec!["payload".to_string()]);
}

#[tokio::test]
async fn handler_not_invoked_when_token_missing() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let config = ProxyConfig {
        read_token: true,
        ..Default::default()
    };
    let layer = WsProxyLayer::new(config).unwrap();
    let app = Router::new()
        .route(
            "/",
            any(move || {
                counter.fetch_add(1, Ordering::SeqCst);
                async {}
            }),
        )
        .layer(layer.clone());

    let addr = common::serve(app).await;
    let mut ws = common::dial(addr).await;
    ws.close(None).await.unwrap();
    assert_eq!(common::next_text(&mut ws).await, None);

    assert!(common::eventually(Duration::from_secs(2), || layer.active_sessions() == 0).await);
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn rewrite_method_applies_to_handler() {
    let (tx, mut rx) = mpsc::unbounded_channel::<(Method, String)>();
    let config = ProxyConfig {
        rewrite_method: "POST".into(),
        ..Default::default()
    };
    let app = Router::new()
        .route(
            "/",
            any(move |method: Method, body: Body| {
                let tx = tx.clone();
                async move {
                    let mut lines = body_reader(body).lines();
                    if let Ok(Some(line)) = lines.next_line().await {
                        let _ = tx.send((method, line));
                    }
                }
            }),
        )
        .layer(WsProxyLayer::new(config).unwrap());

    let addr = common::serve(app).await;
    let mut ws = common::dial(addr).await;
    ws.send(Message::text("Hello World!")).await.unwrap();

    let (method, line) = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("handler invoked")
        .unwrap();
    assert_eq!(method, Method::POST);
    assert_eq!(line, "Hello World!");
}

#[tokio::test]
async fn plain_http_passes_through() {
    let app = Router::new()
        .route("/", any(|| async { "Hello World!" }))
        .layer(WsProxyLayer::new(ProxyConfig::default()).unwrap());

    let addr = common::serve(app).await;
    let res = reqwest::Client::builder()
        .no_proxy()
        .build()
        .unwrap()
        .get(format!("http://{}/", addr))
        .send()
        .await
        .expect("Failed to request data from server.");

    assert_eq!(res.status(), 200);
    assert_eq!(res.text().await.unwrap(), "Hello World!");
}

/// Fires its sender when the response stream holding it is dropped.
struct DropSignal(Option<oneshot::Sender<()>>);

impl Drop for DropSignal {
    fn drop(&mut self) {
        if let Some(tx) = self.0.take() {
            let _ = tx.send(());
        }
    }
}

/// Router whose handler streams lines forever, signalling when dropped.
fn endless_app(layer: WsProxyLayer) -> (Router, oneshot::Receiver<()>) {
    let (tx, rx) = oneshot::channel();
    let signal = Arc::new(Mutex::new(Some(tx)));

    let app = Router::new()
        .route(
            "/",
            any(move || {
                let guard = DropSignal(signal.lock().unwrap().take());
                async move {
                    let lines = stream::unfold((0u64, guard), |(n, guard)| async move {
                        tokio::time::sleep(Duration::from_millis(10)).await;
                        Some((Ok::<_, Infallible>(format!("{{\"n\":{}}}\n", n)), (n + 1, guard)))
                    });
                    Body::from_stream(lines)
                }
            }),
        )
        .layer(layer);
    (app, rx)
}

#[tokio::test]
async fn client_close_stops_a_streaming_handler() {
    let layer = WsProxyLayer::new(ProxyConfig::default()).unwrap();
    let (app, dropped) = endless_app(layer.clone());

    let addr = common::serve(app).await;
    let mut ws = common::dial(addr).await;
    assert_eq!(common::next_text(&mut ws).await.as_deref(), Some("{\"n\":0}\n"));

    ws.close(None).await.unwrap();
    drop(ws);

    tokio::time::timeout(Duration::from_secs(2), dropped)
        .await
        .expect("handler response dropped in bounded time")
        .unwrap();
    assert!(common::eventually(Duration::from_secs(2), || layer.active_sessions() == 0).await);
}

#[tokio::test]
async fn abrupt_disconnect_stops_a_streaming_handler() {
    let layer = WsProxyLayer::new(ProxyConfig::default()).unwrap();
    let (app, dropped) = endless_app(layer.clone());

    let addr = common::serve(app).await;
    let mut ws = common::dial(addr).await;
    assert!(common::next_text(&mut ws).await.is_some());
    drop(ws);

    tokio::time::timeout(Duration::from_secs(2), dropped)
        .await
        .expect("handler response dropped in bounded time")
        .unwrap();
    assert!(common::eventually(Duration::from_secs(2), || layer.active_sessions() == 0).await);
}

#[tokio::test]
async fn shutdown_closes_open_sessions() {
    let shutdown = CancellationToken::new();
    let layer = WsProxyLayer::with_shutdown(ProxyConfig::default(), shutdown.clone()).unwrap();
    let (app, dropped) = endless_app(layer.clone());

    let addr = common::serve(app).await;
    let mut ws = common::dial(addr).await;
    assert!(common::next_text(&mut ws).await.is_some());

    shutdown.cancel();

    tokio::time::timeout(Duration::from_secs(2), dropped)
        .await
        .expect("handler response dropped on shutdown")
        .unwrap();

    // Drain whatever was in flight; the server then closes the socket.
    while common::next_text(&mut ws).await.is_some() {}
    assert!(common::eventually(Duration::from_secs(2), || layer.active_sessions() == 0).await);
}
