use crate::error::SessionError;
use crate::session::{Session, SessionState};
use crate::ui::conversation::{
    get_help_text, ComposerResult, ConversationComposer, ConversationHistory, ParsedCommand,
    SlashCommand,
};
use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use ratatui::{
    layout::{Constraint, Direction, Layout},
    style::{Color, Style},
    text::{Line, Span},
    Frame,
};

/// What the status line currently reports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Status {
    Ready,
    Thinking,
    Info(String),
    Error(String),
}

/// Binds a [`Session`] to the terminal: keys in, frames out.
pub struct ConversationManager {
    session: Session,
    composer: ConversationComposer,
    status: Status,
    should_quit: bool,
}

impl ConversationManager {
    pub fn new(session: Session) -> Self {
        Self {
            session,
            composer: ConversationComposer::new("Ask me anything ..."),
            status: Status::Ready,
            should_quit: false,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn status(&self) -> &Status {
        &self.status
    }

    pub fn should_quit(&self) -> bool {
        self.should_quit
    }

    /// Handle key input
    pub fn handle_key(&mut self, key: KeyEvent) {
        if key.kind != KeyEventKind::Press {
            return;
        }

        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        match key.code {
            KeyCode::Esc => self.should_quit = true,
            KeyCode::Char('c') if ctrl => self.should_quit = true,
            KeyCode::Char('l') if ctrl => self.clear(),
            _ => match self.composer.handle_key(key) {
                ComposerResult::Submitted(input) => self.handle_input(input),
                ComposerResult::Command(command) => self.handle_slash_command(command),
                ComposerResult::None => {}
            },
        }
    }

    /// Submit user text to the session
    pub fn handle_input(&mut self, input: String) {
        match self.session.submit(input.clone()) {
            Ok(()) => self.status = Status::Thinking,
            Err(SessionError::EmptyInput) => {
                self.status = Status::Info("Type a message before sending.".to_string());
            }
            Err(SessionError::InvalidState { .. }) => {
                // Keep the draft so it can be sent once the reply is in.
                self.composer.restore(input);
                self.status = Status::Info("Wait for the reply to finish before sending.".to_string());
            }
            Err(err) => self.status = Status::Error(err.to_string()),
        }
    }

    /// Fold a finished reply into the history (called once per frame)
    pub fn process_streaming(&mut self) {
        match self.session.poll_response() {
            Some(Ok(_)) => self.status = Status::Ready,
            Some(Err(err)) => self.status = Status::Error(err.to_string()),
            None => {}
        }
    }

    fn clear(&mut self) {
        match self.session.reset() {
            Ok(()) => {
                self.composer.clear();
                self.status = Status::Ready;
            }
            Err(_) => {
                self.status = Status::Info("Wait for the reply to finish before clearing.".to_string());
            }
        }
    }

    fn handle_slash_command(&mut self, command: ParsedCommand) {
        let streaming = self.session.state() == SessionState::AwaitingResponse;
        if streaming && !command.command.available_during_streaming() {
            self.status = Status::Info(format!(
                "/{} is unavailable while a reply is streaming.",
                command.command.command()
            ));
            return;
        }

        match command.command {
            SlashCommand::Clear => self.clear(),
            SlashCommand::Help => self.status = Status::Info(get_help_text()),
            SlashCommand::Quit => self.should_quit = true,
        }
    }

    /// Render the conversation UI components
    pub fn render(&self, frame: &mut Frame) {
        let status_height = match &self.status {
            Status::Info(text) | Status::Error(text) => text.lines().count().max(1) as u16,
            _ => 1,
        };
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Min(5),                // History
                Constraint::Length(status_height), // Status
                Constraint::Length(5),             // Composer
            ])
            .split(frame.size());

        let history = ConversationHistory::new(self.session.transcript(), self.session.live_buffer());
        frame.render_widget(history, chunks[0]);

        for (i, line) in self.status_lines().into_iter().enumerate() {
            if (i as u16) < chunks[1].height {
                frame.buffer_mut().set_line(chunks[1].x, chunks[1].y + i as u16, &line, chunks[1].width);
            }
        }

        frame.render_widget(&self.composer, chunks[2]);
    }

    fn status_lines(&self) -> Vec<Line<'static>> {
        match &self.status {
            Status::Ready => vec![Line::from(Span::styled(
                "Enter to send · /help for commands",
                Style::default().fg(Color::DarkGray),
            ))],
            Status::Thinking => vec![Line::from(Span::styled(
                "Thinking...",
                Style::default().fg(Color::Yellow),
            ))],
            Status::Info(text) => text
                .lines()
                .map(|l| Line::from(Span::styled(l.to_string(), Style::default().fg(Color::Cyan))))
                .collect(),
            Status::Error(text) => text
                .lines()
                .map(|l| Line::from(Span::styled(format!("❌ {l}"), Style::default().fg(Color::Red))))
                .collect(),
        }
    }
}
