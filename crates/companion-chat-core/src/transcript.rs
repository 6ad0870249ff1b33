//! Append-only transcript with history + live broadcast.

use std::{
    fmt,
    sync::{Arc, PoisonError, RwLock},
};

use futures::StreamExt;
use tokio::sync::broadcast::{self, error::RecvError};

/// Capacity of the live broadcast channel.
///
/// Raw [`Transcript::subscribe`] receivers that fall further behind see
/// `Lagged`; [`Transcript::history_plus_stream`] reads from history and
/// never loses lines.
const LIVE_CAPACITY: usize = 1024;

/// Who a transcript line came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Origin {
    /// Connection lifecycle notice.
    System,
    /// Message received from the server.
    Peer,
    /// Message the local user sent.
    Local,
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::System => "system",
            Self::Peer => "peer",
            Self::Local => "you",
        };
        f.write_str(label)
    }
}

/// One display line of the transcript.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Line {
    pub origin: Origin,
    pub text: String,
}

impl Line {
    #[must_use]
    pub fn system(text: impl Into<String>) -> Self {
        Self {
            origin: Origin::System,
            text: text.into(),
        }
    }

    #[must_use]
    pub fn peer(text: impl Into<String>) -> Self {
        Self {
            origin: Origin::Peer,
            text: text.into(),
        }
    }

    #[must_use]
    pub fn local(text: impl Into<String>) -> Self {
        Self {
            origin: Origin::Local,
            text: text.into(),
        }
    }
}

/// Ordered, append-only log of display lines.
///
/// Renderers either take a [`snapshot`](Self::snapshot) or follow
/// [`history_plus_stream`](Self::history_plus_stream), which yields every
/// line already recorded and then each new one as it is appended.
pub struct Transcript {
    lines: Arc<RwLock<Vec<Line>>>,
    sender: broadcast::Sender<Line>,
}

impl Default for Transcript {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Transcript {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transcript")
            .field("len", &self.len())
            .finish_non_exhaustive()
    }
}

impl Transcript {
    /// Create an empty transcript.
    #[must_use]
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(LIVE_CAPACITY);
        Self {
            lines: Arc::new(RwLock::new(Vec::with_capacity(32))),
            sender,
        }
    }

    /// Append a line and notify live subscribers.
    pub fn push(&self, line: Line) {
        // Broadcast under the write lock so a concurrent subscribe either
        // sees the line in history or receives it live, never both.
        let mut lines = self.lines.write().unwrap_or_else(PoisonError::into_inner);
        let _ = self.sender.send(line.clone());
        lines.push(line);
    }

    /// Append a system notice.
    pub fn push_system<S: Into<String>>(&self, s: S) {
        self.push(Line::system(s));
    }

    /// Append a received message.
    pub fn push_peer<S: Into<String>>(&self, s: S) {
        self.push(Line::peer(s));
    }

    /// Append a sent message.
    pub fn push_local<S: Into<String>>(&self, s: S) {
        self.push(Line::local(s));
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lines
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy of every line recorded so far, in insertion order.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Line> {
        self.lines
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Receiver for lines appended from now on.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<Line> {
        self.sender.subscribe()
    }

    /// Stream that yields history first, then live appends.
    ///
    /// Lines are read back from history by position, so a consumer that
    /// falls behind the live channel still sees every line in order. The
    /// stream ends once the transcript is dropped and fully read.
    #[must_use]
    pub fn history_plus_stream(&self) -> futures::stream::BoxStream<'static, Line> {
        let cursor = Cursor {
            lines: Arc::clone(&self.lines),
            wakeups: self.subscribe(),
            next: 0,
        };

        futures::stream::unfold(cursor, |mut cursor| async move {
            loop {
                if let Some(line) = cursor.take_next() {
                    return Some((line, cursor));
                }
                match cursor.wakeups.recv().await {
                    Ok(_) => {}
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::debug!(skipped, "transcript stream catching up from history");
                    }
                    Err(RecvError::Closed) => return None,
                }
            }
        })
        .boxed()
    }
}

/// Read position of one [`Transcript::history_plus_stream`] consumer.
///
/// `wakeups` is subscribed before the first read, so every append after
/// that read also shows up as a wakeup.
struct Cursor {
    lines: Arc<RwLock<Vec<Line>>>,
    wakeups: broadcast::Receiver<Line>,
    next: usize,
}

impl Cursor {
    fn take_next(&mut self) -> Option<Line> {
        let line = self
            .lines
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(self.next)
            .cloned()?;
        self.next += 1;
        Some(line)
    }
}
