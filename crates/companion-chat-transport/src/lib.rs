//! Transports for companion chat sessions.
//!
//! Provides:
//! - WebSocket client and `ChatSession` (feature: client)
//! - Echo server (feature: server)
//! - TUI transport bridge (feature: tui)

#[cfg(feature = "client")]
pub mod client;

#[cfg(feature = "server")]
pub mod server;

#[cfg(feature = "tui")]
pub mod tui;

#[cfg(feature = "client")]
pub use client::{ChatSession, WsConnection, connect};
