//! Markdown to styled terminal lines for assistant replies.

use pulldown_cmark::{Event, Options, Parser, Tag, TagEnd};
use ratatui::{
    style::{Color, Modifier, Style},
    text::Span,
};

/// One rendered line before wrapping.
struct Block {
    indent: usize,
    spans: Vec<Span<'static>>,
    /// Code block lines keep their layout and are never re-wrapped.
    preformatted: bool,
}

struct Renderer {
    base: Style,
    blocks: Vec<Block>,
    current: Vec<Span<'static>>,
    styles: Vec<Style>,
    lists: Vec<Option<u64>>,
    in_code_block: bool,
}

impl Renderer {
    fn new(base: Style) -> Self {
        Self {
            base,
            blocks: Vec::new(),
            current: Vec::new(),
            styles: vec![base],
            lists: Vec::new(),
            in_code_block: false,
        }
    }

    fn style(&self) -> Style {
        self.styles.last().copied().unwrap_or(self.base)
    }

    fn push_style(&mut self, patch: Style) {
        let style = self.style().patch(patch);
        self.styles.push(style);
    }

    fn pop_style(&mut self) {
        if self.styles.len() > 1 {
            self.styles.pop();
        }
    }

    fn indent(&self) -> usize {
        self.lists.len().saturating_sub(1) * 2
    }

    fn flush(&mut self) {
        if !self.current.is_empty() {
            self.blocks.push(Block {
                indent: self.indent(),
                spans: std::mem::take(&mut self.current),
                preformatted: false,
            });
        }
    }

    fn blank(&mut self) {
        self.flush();
        if self.blocks.last().is_some_and(|block| !block.spans.is_empty()) {
            self.blocks.push(Block {
                indent: 0,
                spans: Vec::new(),
                preformatted: false,
            });
        }
    }

    fn text(&mut self, text: &str) {
        if self.in_code_block {
            let style = code_style();
            for line in text.lines() {
                self.blocks.push(Block {
                    indent: 2,
                    spans: vec![Span::styled(line.to_string(), style)],
                    preformatted: true,
                });
            }
        } else {
            self.current.push(Span::styled(text.to_string(), self.style()));
        }
    }

    fn start(&mut self, tag: Tag) {
        match tag {
            Tag::Heading { .. } => {
                self.flush();
                self.push_style(Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD));
            }
            Tag::Strong => self.push_style(Style::default().add_modifier(Modifier::BOLD)),
            Tag::Emphasis => self.push_style(Style::default().add_modifier(Modifier::ITALIC)),
            Tag::Strikethrough => {
                self.push_style(Style::default().add_modifier(Modifier::CROSSED_OUT))
            }
            Tag::Link { .. } => self.push_style(Style::default().add_modifier(Modifier::UNDERLINED)),
            Tag::CodeBlock(_) => {
                self.flush();
                self.in_code_block = true;
            }
            Tag::List(start) => {
                self.flush();
                self.lists.push(start);
            }
            Tag::Item => {
                self.flush();
                let marker = match self.lists.last_mut() {
                    Some(Some(number)) => {
                        let marker = format!("{number}.");
                        *number += 1;
                        marker
                    }
                    _ => "•".to_string(),
                };
                self.current.push(Span::styled(marker, self.base));
                self.current.push(Span::raw(" "));
            }
            _ => {}
        }
    }

    fn end(&mut self, tag: TagEnd) {
        match tag {
            TagEnd::Heading(_) => {
                self.pop_style();
                self.blank();
            }
            TagEnd::Strong | TagEnd::Emphasis | TagEnd::Strikethrough | TagEnd::Link => {
                self.pop_style()
            }
            TagEnd::CodeBlock => {
                self.in_code_block = false;
                self.blank();
            }
            TagEnd::Paragraph => {
                if self.lists.is_empty() {
                    self.blank();
                } else {
                    self.flush();
                }
            }
            TagEnd::Item => self.flush(),
            TagEnd::List(_) => {
                self.lists.pop();
                if self.lists.is_empty() {
                    self.blank();
                }
            }
            _ => {}
        }
    }

    fn finish(mut self) -> Vec<Block> {
        self.flush();
        while self.blocks.last().is_some_and(|block| block.spans.is_empty()) {
            self.blocks.pop();
        }
        self.blocks
    }
}

fn code_style() -> Style {
    Style::default().fg(Color::Yellow)
}

/// Render markdown into lines no wider than `width` columns (0 disables wrapping).
///
/// Always yields at least one line so a cursor can be appended to it.
pub fn render_markdown(markdown: &str, width: usize, base: Style) -> Vec<Vec<Span<'static>>> {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TASKLISTS);

    let mut renderer = Renderer::new(base);
    for event in Parser::new_ext(markdown, options) {
        match event {
            Event::Start(tag) => renderer.start(tag),
            Event::End(tag) => renderer.end(tag),
            Event::Text(text) | Event::Html(text) | Event::InlineHtml(text) => {
                renderer.text(&text)
            }
            Event::Code(code) => renderer.current.push(Span::styled(code.into_string(), code_style())),
            Event::SoftBreak | Event::HardBreak => renderer.flush(),
            Event::Rule => {
                renderer.flush();
                renderer.current.push(Span::styled("────", Style::default().fg(Color::DarkGray)));
                renderer.blank();
            }
            Event::TaskListMarker(checked) => {
                let marker = if checked { "[x] " } else { "[ ] " };
                renderer.current.push(Span::styled(marker, base));
            }
            _ => {}
        }
    }

    let mut lines = Vec::new();
    for block in renderer.finish() {
        let pad = " ".repeat(block.indent);
        if block.preformatted || block.spans.is_empty() {
            let mut line = vec![Span::raw(pad)];
            line.extend(block.spans);
            lines.push(line);
            continue;
        }
        for wrapped in wrap_spans(&block.spans, width.saturating_sub(block.indent)) {
            let mut line = vec![Span::raw(pad.clone())];
            line.extend(wrapped);
            lines.push(line);
        }
    }

    if lines.is_empty() {
        lines.push(Vec::new());
    }
    lines
}

/// Greedy word wrap that keeps each word's styling. Runs of whitespace
/// collapse to one space.
fn wrap_spans(spans: &[Span<'static>], width: usize) -> Vec<Vec<Span<'static>>> {
    let mut words: Vec<Vec<(String, Style)>> = Vec::new();
    let mut word: Vec<(String, Style)> = Vec::new();
    for span in spans {
        for c in span.content.chars() {
            if c.is_whitespace() {
                if !word.is_empty() {
                    words.push(std::mem::take(&mut word));
                }
                continue;
            }
            match word.last_mut() {
                Some((text, style)) if *style == span.style => text.push(c),
                _ => word.push((c.to_string(), span.style)),
            }
        }
    }
    if !word.is_empty() {
        words.push(word);
    }

    let mut lines = Vec::new();
    let mut current: Vec<Span<'static>> = Vec::new();
    let mut current_width = 0;
    for word in words {
        let word_width: usize = word.iter().map(|(text, _)| text.chars().count()).sum();
        if width > 0 && current_width > 0 && current_width + 1 + word_width > width {
            lines.push(std::mem::take(&mut current));
            current_width = 0;
        }
        if current_width > 0 {
            current.push(Span::raw(" "));
            current_width += 1;
        }
        current.extend(word.into_iter().map(|(text, style)| Span::styled(text, style)));
        current_width += word_width;
    }
    lines.push(current);
    lines
}
