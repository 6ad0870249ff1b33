//! WebSocket client transport.
//!
//! [`connect`] spawns one task that owns the socket. The task reports
//! lifecycle callbacks as [`TransportEvent`]s and takes outbound work from
//! a command queue, so the [`WsConnection`] handle never blocks.

use std::sync::{Arc, Weak};

use companion_chat_core::{
    Connection, ConnectionState, EndpointConfig, Line, SessionController, Transcript,
    TransportError, TransportEvent,
};
use futures::{SinkExt, StreamExt};
use tokio::{sync::mpsc, task::JoinHandle};
use tokio_tungstenite::{connect_async, tungstenite::Message};

enum Command {
    Send(String),
    Close,
}

/// Handle to a connection task started by [`connect`].
pub struct WsConnection {
    commands: mpsc::UnboundedSender<Command>,
}

impl Connection for WsConnection {
    fn send_text(&self, text: &str) -> Result<(), TransportError> {
        self.commands
            .send(Command::Send(text.to_owned()))
            .map_err(|_| TransportError::ChannelClosed)
    }

    fn close(&self) {
        let _ = self.commands.send(Command::Close);
    }
}

/// Open a WebSocket connection to `url` in a background task.
///
/// Returns the command handle and the stream of lifecycle events. The
/// event stream always ends with [`TransportEvent::Closed`].
///
/// # Panics
/// Panics if called outside a Tokio runtime.
#[must_use]
pub fn connect(
    url: impl Into<String>,
) -> (WsConnection, mpsc::UnboundedReceiver<TransportEvent>) {
    let url = url.into();
    // Fails only when a provider is already installed.
    let _ = rustls::crypto::ring::default_provider().install_default();

    let (command_tx, command_rx) = mpsc::unbounded_channel();
    let (event_tx, event_rx) = mpsc::unbounded_channel();

    tokio::spawn(run_connection(url, command_rx, event_tx));

    (
        WsConnection {
            commands: command_tx,
        },
        event_rx,
    )
}

async fn run_connection(
    url: String,
    mut commands: mpsc::UnboundedReceiver<Command>,
    events: mpsc::UnboundedSender<TransportEvent>,
) {
    let handshake = tokio::select! {
        result = connect_async(url.as_str()) => result,
        () = wait_for_close(&mut commands) => {
            tracing::debug!(%url, "closed before handshake completed");
            let _ = events.send(TransportEvent::Closed);
            return;
        }
    };

    let socket = match handshake {
        Ok((socket, _response)) => socket,
        Err(e) => {
            tracing::warn!(%url, "WebSocket connect failed: {e}");
            let _ = events.send(TransportEvent::Error(e.to_string()));
            let _ = events.send(TransportEvent::Closed);
            return;
        }
    };

    tracing::debug!(%url, "WebSocket handshake complete");
    let _ = events.send(TransportEvent::Opened);

    let (mut sink, mut stream) = socket.split();

    loop {
        tokio::select! {
            frame = stream.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    let _ = events.send(TransportEvent::Message(text.as_str().to_owned()));
                }
                Some(Ok(Message::Binary(data))) => match String::from_utf8(data.to_vec()) {
                    Ok(text) => {
                        let _ = events.send(TransportEvent::Message(text));
                    }
                    Err(_) => tracing::debug!("ignoring non-UTF-8 binary frame"),
                },
                Some(Ok(Message::Close(frame))) => {
                    tracing::debug!(?frame, "server closed the connection");
                    // Flushes the queued close reply.
                    let _ = sink.close().await;
                    break;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    tracing::error!("WebSocket error: {e}");
                    let _ = events.send(TransportEvent::Error(e.to_string()));
                    break;
                }
                None => break,
            },
            command = commands.recv() => match command {
                Some(Command::Send(text)) => {
                    if let Err(e) = sink.send(Message::Text(text.into())).await {
                        tracing::error!("WebSocket send failed: {e}");
                        let _ = events.send(TransportEvent::Error(e.to_string()));
                        break;
                    }
                }
                Some(Command::Close) | None => {
                    if let Err(e) = sink.close().await {
                        tracing::debug!("WebSocket close failed: {e}");
                    }
                    break;
                }
            },
        }
    }

    let _ = events.send(TransportEvent::Closed);
}

/// Resolves on a close request or once every handle is gone.
async fn wait_for_close(commands: &mut mpsc::UnboundedReceiver<Command>) {
    while let Some(command) = commands.recv().await {
        match command {
            Command::Close => return,
            Command::Send(_) => tracing::debug!("dropping send queued before handshake"),
        }
    }
}

/// A chat session over one WebSocket connection.
///
/// Dropping the session tears it down.
pub struct ChatSession {
    controller: Arc<SessionController<WsConnection>>,
    pump: JoinHandle<()>,
}

impl ChatSession {
    /// Start connecting to `endpoint`. The session begins in
    /// [`ConnectionState::Connecting`].
    ///
    /// # Panics
    /// Panics if called outside a Tokio runtime.
    #[must_use]
    pub fn connect(endpoint: &EndpointConfig) -> Self {
        let (connection, events) = connect(endpoint.url.clone());
        let controller = Arc::new(SessionController::new(connection));
        tracing::info!(session = %controller.id(), url = %endpoint.url, "connecting");

        let pump = tokio::spawn(pump_events(Arc::downgrade(&controller), events));

        Self { controller, pump }
    }

    #[must_use]
    pub fn controller(&self) -> &SessionController<WsConnection> {
        &self.controller
    }

    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.controller.state()
    }

    #[must_use]
    pub fn transcript(&self) -> Arc<Transcript> {
        self.controller.transcript()
    }

    #[must_use]
    pub fn lines(&self) -> Vec<Line> {
        self.controller.lines()
    }

    pub fn send(&self, text: &str) {
        self.controller.send(text);
    }

    pub fn submit(&self) {
        self.controller.submit();
    }

    #[must_use]
    pub fn pending(&self) -> String {
        self.controller.pending()
    }

    pub fn set_pending(&self, text: impl Into<String>) {
        self.controller.set_pending(text);
    }

    pub fn push_pending(&self, c: char) {
        self.controller.push_pending(c);
    }

    pub fn pop_pending(&self) -> Option<char> {
        self.controller.pop_pending()
    }

    pub fn teardown(&self) {
        self.controller.teardown();
    }

    /// Whether the event pump has drained the transport.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.pump.is_finished()
    }
}

impl Drop for ChatSession {
    fn drop(&mut self) {
        self.controller.teardown();
    }
}

async fn pump_events(
    controller: Weak<SessionController<WsConnection>>,
    mut events: mpsc::UnboundedReceiver<TransportEvent>,
) {
    while let Some(event) = events.recv().await {
        let Some(controller) = controller.upgrade() else {
            break;
        };
        controller.handle_event(event);
    }
}
