//! Terminal front-end: renders a [`Session`] and feeds it keystrokes.

pub mod conversation;

use crate::session::Session;
use anyhow::{Context, Result};
use conversation::ConversationManager;
use crossterm::{
    event::{self, Event},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use std::io::{stdout, Stdout};
use std::time::Duration;

const FRAME_INTERVAL: Duration = Duration::from_millis(50);

/// Restores the terminal even when the loop bails out with an error.
struct TerminalGuard {
    terminal: Terminal<CrosstermBackend<Stdout>>,
}

impl TerminalGuard {
    fn new() -> Result<Self> {
        enable_raw_mode().context("Failed to enable raw mode")?;
        let mut out = stdout();
        execute!(out, EnterAlternateScreen).context("Failed to enter alternate screen")?;
        let terminal = Terminal::new(CrosstermBackend::new(out)).context("Failed to create terminal")?;
        Ok(Self { terminal })
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
        let _ = execute!(self.terminal.backend_mut(), LeaveAlternateScreen);
        let _ = self.terminal.show_cursor();
    }
}

/// Run the interactive chat until the user quits.
///
/// Terminal input is read with blocking calls, so the event loop lives on the
/// runtime's blocking pool while requests stream on its async workers.
pub async fn run(session: Session) -> Result<()> {
    tokio::task::spawn_blocking(move || event_loop(session))
        .await
        .context("Terminal event loop panicked")?
}

fn event_loop(session: Session) -> Result<()> {
    let mut guard = TerminalGuard::new()?;
    let mut manager = ConversationManager::new(session);
    tracing::info!(session = %manager.session().id(), "interactive session started");

    while !manager.should_quit() {
        manager.process_streaming();
        guard
            .terminal
            .draw(|frame| manager.render(frame))
            .context("Failed to draw frame")?;

        if event::poll(FRAME_INTERVAL).context("Failed to poll terminal events")? {
            if let Event::Key(key) = event::read().context("Failed to read terminal event")? {
                manager.handle_key(key);
            }
        }
    }

    tracing::info!(
        turns = manager.session().transcript().count(),
        "interactive session finished"
    );
    Ok(())
}
