//! Terminal chat window for a companion chat server.
//!
//! Run with: cargo run -p companion-chat-tui
//!
//! Connects to the configured endpoint (`COMPANION_CHAT_URL` overrides the
//! config file). Start `companion-echo-server` for a local peer.

use std::{fs::OpenOptions, io, sync::Arc, time::Duration};

use anyhow::{Context, Result};
use companion_chat_core::{ChatConfig, Line, LogConfig};
use companion_chat_transport::{
    ChatSession,
    tui::{InputAction, TranscriptView, key_to_action, render_line, state_style},
};
use crossterm::{
    event::{self, Event},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{
    Frame, Terminal,
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout},
    style::{Color, Style},
    text::{Line as TextLine, Span},
    widgets::{Block, Borders, Paragraph},
};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let config = ChatConfig::load().context("failed to load configuration")?;
    init_tracing(&config.log)?;

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let session = ChatSession::connect(&config.endpoint);
    let result = run_app(&mut terminal, &session, &config.endpoint.url);
    session.teardown();

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    result
}

/// Log to the configured file only; the terminal belongs to the UI.
fn init_tracing(log: &LogConfig) -> Result<()> {
    let Some(path) = &log.file else {
        return Ok(());
    };

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("failed to open log file {}", path.display()))?;
    let filter = EnvFilter::try_new(&log.level).unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Arc::new(file))
        .with_ansi(false)
        .init();
    Ok(())
}

fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    session: &ChatSession,
    url: &str,
) -> Result<()> {
    let transcript = session.transcript();
    let mut view = TranscriptView::new();

    loop {
        let lines = transcript.snapshot();
        terminal.draw(|f| ui(f, session, &lines, &mut view, url))?;

        if !event::poll(Duration::from_millis(50))? {
            continue;
        }
        let Event::Key(key) = event::read()? else {
            continue;
        };

        match key_to_action(&key) {
            Some(InputAction::Quit) => return Ok(()),
            Some(InputAction::Insert(c)) => session.push_pending(c),
            Some(InputAction::Backspace) => {
                session.pop_pending();
            }
            Some(InputAction::Submit) => session.submit(),
            Some(InputAction::ScrollUp(n)) => view.scroll_up(n),
            Some(InputAction::ScrollDown(n)) => view.scroll_down(n),
            None => {}
        }
    }
}

fn ui(f: &mut Frame, session: &ChatSession, lines: &[Line], view: &mut TranscriptView, url: &str) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(3),    // Transcript
            Constraint::Length(3), // Input
            Constraint::Length(1), // Status
        ])
        .split(f.area());

    view.update(lines.len(), chunks[0].height.saturating_sub(2));

    let transcript_text: Vec<TextLine> = lines.iter().map(render_line).collect();
    let transcript = Paragraph::new(transcript_text)
        .block(Block::default().borders(Borders::ALL).title("Chat"))
        .scroll((view.scroll(), 0));
    f.render_widget(transcript, chunks[0]);

    let pending = session.pending();
    let input = Paragraph::new(pending.as_str())
        .style(Style::default().fg(Color::Yellow))
        .block(Block::default().borders(Borders::ALL).title("Message"));
    f.render_widget(input, chunks[1]);

    let width = u16::try_from(pending.chars().count()).unwrap_or(u16::MAX);
    f.set_cursor_position((
        chunks[1].x.saturating_add(width).saturating_add(1),
        chunks[1].y + 1,
    ));

    let state = session.state();
    let key_style = Style::default().fg(Color::Yellow);
    let status = Paragraph::new(TextLine::from(vec![
        Span::raw(" "),
        Span::styled(state.to_string(), state_style(state)),
        Span::raw(format!(" {url} | ")),
        Span::styled("Enter", key_style),
        Span::raw(" send | "),
        Span::styled("Up/Down/PgUp/PgDn", key_style),
        Span::raw(" scroll | "),
        Span::styled("Esc", key_style),
        Span::raw(" quit "),
    ]));
    f.render_widget(status, chunks[2]);
}
