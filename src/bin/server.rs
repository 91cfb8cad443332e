//! Bridge server entry point.
//!
//! Starts the HTTP/WebSocket bridge against a board backend. The serial
//! firmata transport is a separate concern; until a serial backend is
//! wired in, the server runs the in-memory mock board, which is enough
//! to exercise every transport end to end.
//!
//! Configuration comes from the environment:
//!
//! ```sh
//! HTTP_PORT=3000 cargo run --bin pin-bridge-server
//! ```

use std::sync::Arc;

use anyhow::Context;
use tracing::info;
use tracing_subscriber::EnvFilter;

use pin_bridge::services::{run_server, WebServerConfig};
use pin_bridge::{Bridge, BridgeConfig, MockBoard};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = BridgeConfig::from_env();
    info!(port = config.http_port, usb_path = %config.usb_path, "starting bridge");

    let bridge = Arc::new(Bridge::new(MockBoard::new()));
    bridge.spawn_event_pump();

    run_server(bridge, WebServerConfig::from_config(&config))
        .await
        .context("bridge server failed")
}
