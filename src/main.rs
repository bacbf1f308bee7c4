//! Websocket line-streaming demo server.
//!
//! Serves a line-echo handler behind the websocket proxy:
//!
//! ```text
//!   ws client ──msg──▶ proxy ──line──▶ echo handler
//!             ◀─msg─        ◀─line──
//! ```
//!
//! Plain HTTP requests to the same address reach the handler directly.

use clap::Parser;
use std::path::PathBuf;
use tokio::net::TcpListener;

use ws_stream_proxy::config::loader::load_config;
use ws_stream_proxy::config::ServerConfig;
use ws_stream_proxy::lifecycle::signals::watch_signals;
use ws_stream_proxy::observability::{logging, metrics};
use ws_stream_proxy::{HttpServer, Shutdown};

#[derive(Parser)]
#[command(name = "ws-stream-proxy")]
#[command(about = "Serve a streaming line-echo handler over HTTP and websockets", long_about = None)]
struct Cli {
    /// TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Bind address, overriding the config file.
    #[arg(short, long)]
    bind: Option<String>,

    /// Require the first websocket message to be a bearer token.
    #[arg(long)]
    read_token: bool,

    /// Method the handler sees for websocket sessions.
    #[arg(long)]
    rewrite_method: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ServerConfig::default(),
    };
    if let Some(bind) = cli.bind {
        config.listener.bind_address = bind;
    }
    if cli.read_token {
        config.proxy.read_token = true;
    }
    if let Some(method) = cli.rewrite_method {
        config.proxy.rewrite_method = method;
    }

    logging::init_logging(&config.observability);
    tracing::info!("ws-stream-proxy v{} starting", env!("CARGO_PKG_VERSION"));

    tracing::info!(
        bind_address = %config.listener.bind_address,
        read_token = config.proxy.read_token,
        rewrite_method = %config.proxy.rewrite_method,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    tokio::spawn(watch_signals(shutdown.clone()));

    let server = HttpServer::new(config, shutdown)?;
    server.run(listener).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
