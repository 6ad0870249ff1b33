//! Transport-agnostic building blocks for a realtime chat session.
//!
//! This crate provides:
//! - `Transcript` - Append-only display log with live subscribers
//! - `SessionController` - Connection lifecycle state machine
//! - `Connection` trait and `TransportEvent` for transports to implement
//! - `ChatConfig` - TOML + environment configuration

pub mod config;
pub mod session;
pub mod traits;
pub mod transcript;

pub use config::{ChatConfig, ConfigError, EndpointConfig, LogConfig};
pub use session::SessionController;
pub use traits::{Connection, ConnectionState, TransportError, TransportEvent};
pub use transcript::{Line, Origin, Transcript};
