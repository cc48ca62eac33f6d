//! Conversation history display component

use crate::transcript::{Role, Turn};
use crate::ui::conversation::markdown::render_markdown;
use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Widget},
};

/// Snapshot of what the history pane shows for one frame.
pub struct ConversationHistory<'a> {
    turns: Vec<&'a Turn>,
    streaming_message: Option<String>,
}

impl<'a> ConversationHistory<'a> {
    pub fn new(turns: impl IntoIterator<Item = &'a Turn>, streaming_message: Option<String>) -> Self {
        Self {
            turns: turns.into_iter().collect(),
            streaming_message,
        }
    }

    /// Every line the pane would show given unlimited height.
    pub fn lines(&self, width: u16) -> Vec<Line<'static>> {
        // Two columns for the border, two for the body indent.
        let width = width.saturating_sub(4) as usize;
        let mut all_lines = Vec::new();

        for turn in &self.turns {
            if turn.role == Role::User {
                all_lines.push(header("You:"));
                all_lines.extend(body(user_lines(&turn.content, width), false));
            } else {
                all_lines.push(header("AI:"));
                all_lines.extend(body(reply_lines(&turn.content, width), false));
            }
            all_lines.push(Line::default());
        }

        if let Some(streaming_text) = &self.streaming_message {
            all_lines.push(header("AI:"));
            all_lines.extend(body(reply_lines(streaming_text, width), true));
        }

        all_lines
    }
}

impl Widget for ConversationHistory<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let block = Block::default().borders(Borders::ALL).title("🧠 Portable Mind");
        let inner_area = block.inner(area);
        block.render(area, buf);

        if self.turns.is_empty() && self.streaming_message.is_none() {
            let welcome = Line::from(vec![Span::styled(
                "Ask me anything ... /help lists commands.",
                Style::default().fg(Color::DarkGray),
            )]);
            buf.set_line(inner_area.x, inner_area.y, &welcome, inner_area.width);
            return;
        }

        // Newest content stays pinned to the bottom of the pane.
        let all_lines = self.lines(inner_area.width);
        let start = all_lines.len().saturating_sub(inner_area.height as usize);
        for (i, line) in all_lines[start..].iter().enumerate() {
            buf.set_line(inner_area.x, inner_area.y + i as u16, line, inner_area.width);
        }
    }
}

fn header(label: &'static str) -> Line<'static> {
    Line::from(vec![Span::styled(
        label,
        Style::default().add_modifier(Modifier::BOLD),
    )])
}

fn user_lines(text: &str, width: usize) -> Vec<Vec<Span<'static>>> {
    let style = Style::default().fg(Color::Blue);
    wrap_text(text, width)
        .into_iter()
        .map(|line| vec![Span::styled(line, style)])
        .collect()
}

fn reply_lines(text: &str, width: usize) -> Vec<Vec<Span<'static>>> {
    render_markdown(text, width, Style::default().fg(Color::Green))
}

fn body(lines: Vec<Vec<Span<'static>>>, with_cursor: bool) -> Vec<Line<'static>> {
    let last = lines.len().saturating_sub(1);
    lines
        .into_iter()
        .enumerate()
        .map(|(i, content)| {
            let mut spans = vec![Span::raw("  ")];
            spans.extend(content);
            if with_cursor && i == last {
                spans.push(Span::styled("▋", Style::default().fg(Color::Yellow)));
            }
            Line::from(spans)
        })
        .collect()
}

/// Word-wrap each source line to `width` columns, keeping blank lines.
pub fn wrap_text(text: &str, width: usize) -> Vec<String> {
    if width == 0 {
        return text.lines().map(str::to_string).collect();
    }

    let mut lines = Vec::new();
    for source_line in text.split('\n') {
        let mut current_line = String::new();
        let mut current_width = 0;

        for word in source_line.split_whitespace() {
            let word_width = word.chars().count();
            if current_width > 0 && current_width + 1 + word_width > width {
                lines.push(std::mem::take(&mut current_line));
                current_width = 0;
            }
            if current_width > 0 {
                current_line.push(' ');
                current_width += 1;
            }
            current_line.push_str(word);
            current_width += word_width;
        }

        lines.push(current_line);
    }

    lines
}
