//! Core traits and types shared with transports.

use std::fmt;

use thiserror::Error;

/// Lifecycle state of a session's connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    /// Connection requested, not yet established.
    Connecting,
    /// Connection established; sends are permitted.
    Open,
    /// Connection ended. Terminal for the session.
    Closed,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Connecting => "connecting",
            Self::Open => "open",
            Self::Closed => "closed",
        };
        f.write_str(label)
    }
}

/// Lifecycle callback delivered by a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// Handshake completed.
    Opened,
    /// Text payload received from the peer.
    Message(String),
    /// Transport failure. A `Closed` event follows.
    Error(String),
    /// Connection ended, by either side.
    Closed,
}

/// Transport error.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Connection task has stopped")]
    ChannelClosed,
}

/// Handle to one realtime, message-oriented connection.
///
/// Both calls are fire-and-forget: they queue work for the transport and
/// return without waiting on the network. Outcomes are reported back as
/// [`TransportEvent`]s.
pub trait Connection: Send + Sync {
    /// Queue a text payload for transmission.
    ///
    /// # Errors
    /// Returns error if the transport can no longer accept work.
    fn send_text(&self, text: &str) -> Result<(), TransportError>;

    /// Ask the transport to close the connection.
    fn close(&self);
}
