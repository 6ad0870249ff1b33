//! Development echo backend for companion chat.
//!
//! Run with: cargo run -p companion-echo-server
//!
//! Then point the chat window at ws://127.0.0.1:8000/ws.

use std::net::SocketAddr;

use anyhow::{Context, Result};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Env var overriding the listen address.
const ADDR_ENV: &str = "COMPANION_ECHO_ADDR";

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .init();

    let addr: SocketAddr = match std::env::var(ADDR_ENV) {
        Ok(value) => value
            .parse()
            .with_context(|| format!("{ADDR_ENV} is not a socket address: {value:?}"))?,
        Err(_) => SocketAddr::from(([127, 0, 0, 1], 8000)),
    };

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    companion_chat_transport::server::serve(listener).await?;
    Ok(())
}
