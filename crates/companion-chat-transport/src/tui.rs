//! TUI bridge for ratatui chat front ends.

use companion_chat_core::{ConnectionState, Line, Origin};
use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use ratatui::{
    style::{Color, Modifier, Style},
    text::{Line as TextLine, Span},
};

/// Lines moved by PageUp / PageDown.
const PAGE: u16 = 10;

/// What a key press means for the chat window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputAction {
    /// Append a character to the pending input.
    Insert(char),
    /// Delete the last pending character.
    Backspace,
    /// Send the pending input.
    Submit,
    ScrollUp(u16),
    ScrollDown(u16),
    Quit,
}

/// Map a crossterm key event to a chat action.
#[must_use]
pub fn key_to_action(key: &KeyEvent) -> Option<InputAction> {
    if key.kind == KeyEventKind::Release {
        return None;
    }

    match key.code {
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            Some(InputAction::Quit)
        }
        KeyCode::Char(c)
            if !key
                .modifiers
                .intersects(KeyModifiers::CONTROL | KeyModifiers::ALT) =>
        {
            Some(InputAction::Insert(c))
        }
        KeyCode::Esc => Some(InputAction::Quit),
        KeyCode::Enter => Some(InputAction::Submit),
        KeyCode::Backspace => Some(InputAction::Backspace),
        KeyCode::Up => Some(InputAction::ScrollUp(1)),
        KeyCode::Down => Some(InputAction::ScrollDown(1)),
        KeyCode::PageUp => Some(InputAction::ScrollUp(PAGE)),
        KeyCode::PageDown => Some(InputAction::ScrollDown(PAGE)),
        _ => None,
    }
}

/// Style for lines of the given origin.
#[must_use]
pub fn origin_style(origin: Origin) -> Style {
    match origin {
        Origin::System => Style::default()
            .fg(Color::DarkGray)
            .add_modifier(Modifier::ITALIC),
        Origin::Peer => Style::default().fg(Color::Cyan),
        Origin::Local => Style::default().fg(Color::Yellow),
    }
}

/// Style for the status bar in the given connection state.
#[must_use]
pub fn state_style(state: ConnectionState) -> Style {
    match state {
        ConnectionState::Connecting => Style::default().fg(Color::Yellow),
        ConnectionState::Open => Style::default().fg(Color::Green),
        ConnectionState::Closed => Style::default().fg(Color::Red),
    }
}

/// Render one transcript line as `origin: text`.
#[must_use]
pub fn render_line(line: &Line) -> TextLine<'_> {
    let style = origin_style(line.origin);
    TextLine::from(vec![
        Span::styled(format!("{}: ", line.origin), style.add_modifier(Modifier::BOLD)),
        Span::styled(line.text.as_str(), style),
    ])
}

/// Scroll position of the transcript pane.
///
/// Jumps to the newest line whenever the transcript grows.
#[derive(Debug, Default)]
pub struct TranscriptView {
    scroll: u16,
    seen: usize,
    max: u16,
}

impl TranscriptView {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current scroll offset, for `Paragraph::scroll`.
    #[must_use]
    pub const fn scroll(&self) -> u16 {
        self.scroll
    }

    /// Recompute limits for `total` lines shown in `height` rows.
    pub fn update(&mut self, total: usize, height: u16) {
        self.max = u16::try_from(total)
            .unwrap_or(u16::MAX)
            .saturating_sub(height);
        if total > self.seen {
            self.scroll = self.max;
        }
        self.seen = total;
        self.scroll = self.scroll.min(self.max);
    }

    pub fn scroll_up(&mut self, n: u16) {
        self.scroll = self.scroll.saturating_sub(n);
    }

    pub fn scroll_down(&mut self, n: u16) {
        self.scroll = self.scroll.saturating_add(n).min(self.max);
    }
}
