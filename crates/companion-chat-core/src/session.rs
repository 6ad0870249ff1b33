//! Transcript session controller.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use uuid::Uuid;

use crate::{Connection, ConnectionState, Transcript, TransportEvent};

/// System line appended when the connection opens.
pub const CONNECTED_NOTICE: &str = "Connected to server";
/// System line appended when the connection closes.
pub const DISCONNECTED_NOTICE: &str = "Disconnected from server";

struct Inner<C> {
    state: ConnectionState,
    connection: Option<C>,
    pending: String,
    torn_down: bool,
}

/// Owns one connection and keeps the transcript consistent with its
/// lifecycle.
///
/// Transports feed lifecycle callbacks through [`handle_event`]; the UI
/// calls [`send`] / [`submit`] and reads the shared [`Transcript`].
/// Dropping the controller tears it down.
///
/// [`handle_event`]: Self::handle_event
/// [`send`]: Self::send
/// [`submit`]: Self::submit
pub struct SessionController<C: Connection> {
    id: Uuid,
    transcript: Arc<Transcript>,
    inner: Mutex<Inner<C>>,
}

impl<C: Connection> SessionController<C> {
    /// Create a controller in the `Connecting` state over `connection`.
    #[must_use]
    pub fn new(connection: C) -> Self {
        Self::with_transcript(connection, Arc::new(Transcript::new()))
    }

    /// Create a controller that appends to an existing transcript.
    #[must_use]
    pub fn with_transcript(connection: C, transcript: Arc<Transcript>) -> Self {
        let id = Uuid::new_v4();
        tracing::debug!(session = %id, "session created");
        Self {
            id,
            transcript,
            inner: Mutex::new(Inner {
                state: ConnectionState::Connecting,
                connection: Some(connection),
                pending: String::new(),
                torn_down: false,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner<C>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Session identifier, used in log fields.
    #[must_use]
    pub const fn id(&self) -> Uuid {
        self.id
    }

    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.lock().state
    }

    /// Shared handle to the transcript for renderers.
    #[must_use]
    pub fn transcript(&self) -> Arc<Transcript> {
        Arc::clone(&self.transcript)
    }

    /// Snapshot of the transcript lines.
    #[must_use]
    pub fn lines(&self) -> Vec<crate::Line> {
        self.transcript.snapshot()
    }

    /// Apply a lifecycle callback from the transport.
    pub fn handle_event(&self, event: TransportEvent) {
        let mut inner = self.lock();
        if inner.torn_down {
            tracing::debug!(session = %self.id, ?event, "discarding event after teardown");
            return;
        }

        match event {
            TransportEvent::Opened => {
                if inner.state == ConnectionState::Connecting {
                    inner.state = ConnectionState::Open;
                    self.transcript.push_system(CONNECTED_NOTICE);
                    tracing::info!(session = %self.id, "connection open");
                } else {
                    tracing::debug!(session = %self.id, state = %inner.state, "ignoring open");
                }
            }
            TransportEvent::Message(text) => {
                if inner.state == ConnectionState::Open {
                    self.transcript.push_peer(text);
                } else {
                    tracing::debug!(session = %self.id, state = %inner.state, "ignoring message");
                }
            }
            TransportEvent::Error(description) => {
                if inner.state != ConnectionState::Closed {
                    tracing::warn!(session = %self.id, %description, "transport error");
                    self.transcript.push_system(format!("Error: {description}"));
                }
            }
            TransportEvent::Closed => {
                if inner.state != ConnectionState::Closed {
                    inner.state = ConnectionState::Closed;
                    inner.connection = None;
                    self.transcript.push_system(DISCONNECTED_NOTICE);
                    tracing::info!(session = %self.id, "connection closed");
                }
            }
        }
    }

    /// Send `text` verbatim if the connection is open and `text` is not blank.
    ///
    /// Anything else is silently ignored: no transcript line, no
    /// transmission, no error.
    pub fn send(&self, text: &str) {
        let mut inner = self.lock();
        self.send_locked(&mut inner, text);
    }

    /// Send the pending input.
    pub fn submit(&self) {
        let mut inner = self.lock();
        let text = inner.pending.clone();
        self.send_locked(&mut inner, &text);
    }

    fn send_locked(&self, inner: &mut Inner<C>, text: &str) {
        if inner.state != ConnectionState::Open || text.trim().is_empty() {
            return;
        }
        let Some(connection) = inner.connection.as_ref() else {
            return;
        };

        if let Err(e) = connection.send_text(text) {
            tracing::warn!(session = %self.id, "send dropped: {e}");
            return;
        }
        self.transcript.push_local(text);
        inner.pending.clear();
    }

    /// Current pending input.
    #[must_use]
    pub fn pending(&self) -> String {
        self.lock().pending.clone()
    }

    /// Replace the pending input.
    pub fn set_pending(&self, text: impl Into<String>) {
        self.lock().pending = text.into();
    }

    /// Append a character to the pending input.
    pub fn push_pending(&self, c: char) {
        self.lock().pending.push(c);
    }

    /// Remove the last character of the pending input.
    pub fn pop_pending(&self) -> Option<char> {
        self.lock().pending.pop()
    }

    /// Close the connection unless it is already closed, and stop acting on
    /// transport callbacks.
    ///
    /// Idempotent.
    pub fn teardown(&self) {
        let mut inner = self.lock();
        if inner.torn_down {
            return;
        }
        inner.torn_down = true;

        if let Some(connection) = inner.connection.take() {
            if inner.state != ConnectionState::Closed {
                connection.close();
            }
        }
        inner.state = ConnectionState::Closed;
        tracing::debug!(session = %self.id, "session torn down");
    }

    #[must_use]
    pub fn is_torn_down(&self) -> bool {
        self.lock().torn_down
    }
}

impl<C: Connection> Drop for SessionController<C> {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use super::*;
    use crate::{Line, TransportError};

    #[derive(Default)]
    struct Recorder {
        sent: Mutex<Vec<String>>,
        closes: AtomicUsize,
        refuse: AtomicBool,
    }

    impl Recorder {
        fn sent(&self) -> Vec<String> {
            self.sent.lock().unwrap().clone()
        }

        fn closes(&self) -> usize {
            self.closes.load(Ordering::SeqCst)
        }
    }

    struct FakeConnection(Arc<Recorder>);

    impl Connection for FakeConnection {
        fn send_text(&self, text: &str) -> Result<(), TransportError> {
            if self.0.refuse.load(Ordering::SeqCst) {
                return Err(TransportError::ChannelClosed);
            }
            self.0.sent.lock().unwrap().push(text.to_string());
            Ok(())
        }

        fn close(&self) {
            self.0.closes.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn controller() -> (SessionController<FakeConnection>, Arc<Recorder>) {
        let recorder = Arc::new(Recorder::default());
        let controller = SessionController::new(FakeConnection(Arc::clone(&recorder)));
        (controller, recorder)
    }

    fn open_controller() -> (SessionController<FakeConnection>, Arc<Recorder>) {
        let (controller, recorder) = controller();
        controller.handle_event(TransportEvent::Opened);
        (controller, recorder)
    }

    #[test]
    fn test_starts_connecting_with_empty_transcript() {
        let (controller, _) = controller();
        assert_eq!(controller.state(), ConnectionState::Connecting);
        assert!(controller.lines().is_empty());
        assert!(controller.pending().is_empty());
    }

    #[test]
    fn test_replay_lifecycle_events() {
        let (controller, _) = controller();
        controller.handle_event(TransportEvent::Opened);
        for text in ["first", "second", "third"] {
            controller.handle_event(TransportEvent::Message(text.to_string()));
        }
        controller.handle_event(TransportEvent::Closed);

        assert_eq!(
            controller.lines(),
            vec![
                Line::system(CONNECTED_NOTICE),
                Line::peer("first"),
                Line::peer("second"),
                Line::peer("third"),
                Line::system(DISCONNECTED_NOTICE),
            ]
        );
        assert_eq!(controller.state(), ConnectionState::Closed);
    }

    #[test]
    fn test_peer_payload_kept_verbatim() {
        let (controller, _) = open_controller();
        controller.handle_event(TransportEvent::Message("  spaced\tout \n".to_string()));
        assert_eq!(controller.lines()[1], Line::peer("  spaced\tout \n"));
    }

    #[test]
    fn test_blank_send_is_noop_in_every_state() {
        let (controller, recorder) = controller();
        controller.send("");
        controller.send("   ");

        controller.handle_event(TransportEvent::Opened);
        controller.send("");
        controller.send("   ");
        controller.send("\t\n");

        controller.handle_event(TransportEvent::Closed);
        controller.send("");
        controller.send("   ");

        assert!(recorder.sent().is_empty());
        assert_eq!(
            controller.lines(),
            vec![Line::system(CONNECTED_NOTICE), Line::system(DISCONNECTED_NOTICE)]
        );
    }

    #[test]
    fn test_send_when_open() {
        let (controller, recorder) = open_controller();
        controller.set_pending("hello");
        controller.send("hello");

        assert_eq!(recorder.sent(), vec!["hello".to_string()]);
        assert_eq!(
            controller.lines(),
            vec![Line::system(CONNECTED_NOTICE), Line::local("hello")]
        );
        assert!(controller.pending().is_empty());
    }

    #[test]
    fn test_send_transmits_untrimmed_text() {
        let (controller, recorder) = open_controller();
        controller.send("  hello  ");
        assert_eq!(recorder.sent(), vec!["  hello  ".to_string()]);
        assert_eq!(controller.lines()[1], Line::local("  hello  "));
    }

    #[test]
    fn test_send_when_connecting_is_noop() {
        let (controller, recorder) = controller();
        controller.set_pending("hello");
        controller.send("hello");

        assert!(recorder.sent().is_empty());
        assert!(controller.lines().is_empty());
        assert_eq!(controller.pending(), "hello");
    }

    #[test]
    fn test_send_when_closed_is_noop() {
        let (controller, recorder) = open_controller();
        controller.handle_event(TransportEvent::Closed);
        let before = controller.lines();

        controller.send("hello");

        assert!(recorder.sent().is_empty());
        assert_eq!(controller.lines(), before);
    }

    #[test]
    fn test_refused_send_leaves_no_line() {
        let (controller, recorder) = open_controller();
        recorder.refuse.store(true, Ordering::SeqCst);
        controller.set_pending("hello");
        controller.submit();

        assert_eq!(controller.lines(), vec![Line::system(CONNECTED_NOTICE)]);
        assert_eq!(controller.pending(), "hello");
    }

    #[test]
    fn test_submit_sends_pending_input() {
        let (controller, recorder) = open_controller();
        for c in "helloo".chars() {
            controller.push_pending(c);
        }
        assert_eq!(controller.pop_pending(), Some('o'));
        controller.submit();

        assert_eq!(recorder.sent(), vec!["hello".to_string()]);
        assert!(controller.pending().is_empty());

        // Nothing left to send.
        controller.submit();
        assert_eq!(recorder.sent().len(), 1);
    }

    #[test]
    fn test_error_then_close() {
        let (controller, _) = open_controller();
        controller.handle_event(TransportEvent::Error("connection reset".to_string()));
        controller.handle_event(TransportEvent::Closed);

        assert_eq!(
            controller.lines(),
            vec![
                Line::system(CONNECTED_NOTICE),
                Line::system("Error: connection reset"),
                Line::system(DISCONNECTED_NOTICE),
            ]
        );
    }

    #[test]
    fn test_failed_connection_attempt() {
        let (controller, _) = controller();
        controller.handle_event(TransportEvent::Error("connection refused".to_string()));
        controller.handle_event(TransportEvent::Closed);

        assert_eq!(controller.state(), ConnectionState::Closed);
        assert_eq!(
            controller.lines(),
            vec![
                Line::system("Error: connection refused"),
                Line::system(DISCONNECTED_NOTICE),
            ]
        );
    }

    #[test]
    fn test_closed_is_terminal() {
        let (controller, _) = open_controller();
        controller.handle_event(TransportEvent::Closed);
        controller.handle_event(TransportEvent::Opened);
        controller.handle_event(TransportEvent::Message("late".to_string()));
        controller.handle_event(TransportEvent::Closed);

        assert_eq!(controller.state(), ConnectionState::Closed);
        assert_eq!(controller.lines().len(), 2);
    }

    #[test]
    fn test_teardown_is_idempotent() {
        let (controller, recorder) = open_controller();
        controller.teardown();
        controller.teardown();

        assert_eq!(recorder.closes(), 1);
        assert!(controller.is_torn_down());
        assert_eq!(controller.state(), ConnectionState::Closed);
    }

    #[test]
    fn test_teardown_while_connecting_closes() {
        let (controller, recorder) = controller();
        controller.teardown();
        assert_eq!(recorder.closes(), 1);
    }

    #[test]
    fn test_teardown_after_close_does_nothing() {
        let (controller, recorder) = open_controller();
        controller.handle_event(TransportEvent::Closed);
        controller.teardown();
        assert_eq!(recorder.closes(), 0);
    }

    #[test]
    fn test_stale_events_after_teardown_are_discarded() {
        let (controller, recorder) = controller();
        controller.teardown();

        controller.handle_event(TransportEvent::Opened);
        controller.handle_event(TransportEvent::Message("stale".to_string()));
        controller.handle_event(TransportEvent::Error("stale".to_string()));
        controller.handle_event(TransportEvent::Closed);
        controller.send("hello");

        assert!(controller.lines().is_empty());
        assert!(recorder.sent().is_empty());
    }

    #[test]
    fn test_drop_tears_down() {
        let (controller, recorder) = open_controller();
        drop(controller);
        assert_eq!(recorder.closes(), 1);
    }

    #[test]
    fn test_shared_transcript_receives_lines() {
        let recorder = Arc::new(Recorder::default());
        let transcript = Arc::new(Transcript::new());
        let controller = SessionController::with_transcript(
            FakeConnection(Arc::clone(&recorder)),
            Arc::clone(&transcript),
        );
        controller.handle_event(TransportEvent::Opened);
        assert_eq!(transcript.snapshot(), vec![Line::system(CONNECTED_NOTICE)]);
        assert!(Arc::ptr_eq(&controller.transcript(), &transcript));
    }

    #[test]
    fn test_chat_scenario() {
        let (controller, recorder) = controller();
        controller.handle_event(TransportEvent::Opened);
        controller.handle_event(TransportEvent::Message("hi there".to_string()));
        controller.set_pending("hello");
        controller.submit();
        controller.handle_event(TransportEvent::Closed);

        assert_eq!(recorder.sent(), vec!["hello".to_string()]);
        assert_eq!(
            controller.lines(),
            vec![
                Line::system(CONNECTED_NOTICE),
                Line::peer("hi there"),
                Line::local("hello"),
                Line::system(DISCONNECTED_NOTICE),
            ]
        );
    }
}
