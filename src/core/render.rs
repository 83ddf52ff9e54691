//! # Message Rendering
//!
//! Every line shown in the message pane goes through [`MessageRenderer::render`]:
//!
//! ```text
//! (sender, message, sender color, message color)
//!     │  color check: "#hex" or a known name, else reject
//!     ▼
//! message_format  "<{sender}> {message}"   first occurrence of each placeholder
//!     │
//!     ▼
//! markup::parse → spans → word-pin highlight (skipped for System) → Output
//! ```

use std::collections::VecDeque;

use log::warn;

use crate::core::color::{Color, NamedColor};
use crate::core::markup::{self, SpanStyle, StyledSpan};
use crate::core::state::SessionState;

/// Sender label reserved for controller-generated lines.
pub const SYSTEM_SENDER: &str = "{bold}System{/bold}";

const PIN_STYLE_FG: Color = Color::Named(NamedColor::White);
const PIN_STYLE_BG: Color = Color::Named(NamedColor::Cyan);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedLine {
    pub spans: Vec<StyledSpan>,
}

impl RenderedLine {
    pub fn text(&self) -> String {
        markup::plain_text(&self.spans)
    }
}

/// Scrollback buffer behind the message pane.
pub struct Output {
    lines: VecDeque<RenderedLine>,
    capacity: usize,
    scroll_to_end: bool,
    needs_redraw: bool,
    hard_redraw: bool,
}

impl Output {
    pub fn new(capacity: usize) -> Self {
        Self {
            lines: VecDeque::new(),
            capacity: capacity.max(1),
            scroll_to_end: false,
            needs_redraw: true,
            hard_redraw: false,
        }
    }

    pub fn push(&mut self, line: RenderedLine) {
        if self.lines.len() == self.capacity {
            self.lines.pop_front();
        }
        self.lines.push_back(line);
        self.scroll_to_end = true;
        self.needs_redraw = true;
    }

    pub fn clear(&mut self) {
        self.lines.clear();
        self.hard_redraw = true;
        self.needs_redraw = true;
    }

    pub fn lines(&self) -> impl Iterator<Item = &RenderedLine> {
        self.lines.iter()
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn last(&self) -> Option<&RenderedLine> {
        self.lines.back()
    }

    /// Ask the surface for a redraw; `hard` clears the terminal first.
    pub fn request_redraw(&mut self, hard: bool) {
        self.needs_redraw = true;
        self.hard_redraw |= hard;
    }

    /// Consume the pending redraw request: `Some(hard)` when one is pending.
    pub fn take_redraw(&mut self) -> Option<bool> {
        if !self.needs_redraw {
            return None;
        }
        self.needs_redraw = false;
        Some(std::mem::take(&mut self.hard_redraw))
    }

    pub fn take_scroll_to_end(&mut self) -> bool {
        std::mem::take(&mut self.scroll_to_end)
    }
}

/// Formats lines with the active template, theme and word pins.
pub struct MessageRenderer<'a> {
    state: &'a SessionState,
    output: &'a mut Output,
}

impl<'a> MessageRenderer<'a> {
    pub fn new(state: &'a SessionState, output: &'a mut Output) -> Self {
        Self { state, output }
    }

    /// Render one line. A color that is neither `#hex` nor a known name
    /// rejects the whole line and a system error line is pushed instead.
    /// Returns whether the requested line was pushed.
    pub fn render(
        &mut self,
        sender: &str,
        message: &str,
        sender_color: &str,
        message_color: &str,
    ) -> bool {
        self.push_line(sender, message, sender_color, message_color, true)
    }

    fn push_line(
        &mut self,
        sender: &str,
        message: &str,
        sender_color: &str,
        message_color: &str,
        pins: bool,
    ) -> bool {
        if Color::parse(message_color).is_none() || Color::parse(sender_color).is_none() {
            warn!(
                "Rejected render: sender color '{}', message color '{}'",
                sender_color, message_color
            );
            self.push_line(
                SYSTEM_SENDER,
                "Refusing to append message: An invalid color was provided",
                "green",
                "white",
                false,
            );
            return false;
        }

        let sender = format!("{{{sender_color}-fg}}{sender}{{/{sender_color}-fg}}");
        let message = format!("{{{message_color}-fg}}{message}{{/{message_color}-fg}}");
        let line = self
            .state
            .message_format
            .replacen("{sender}", &sender, 1)
            .replacen("{message}", &message, 1);

        let mut spans = markup::parse(&line);
        if pins {
            spans = highlight_pins(spans, &self.state.word_pins);
        }

        self.output.push(RenderedLine { spans });
        true
    }

    fn body_color(&self) -> String {
        self.state.theme_data.messages.foreground_color.clone()
    }

    /// The local user's own message.
    pub fn self_message(&mut self, name: &str, message: &str) -> bool {
        let color = self.body_color();
        self.render(&format!("@{{bold}}{name}{{/bold}}"), message, "cyan", &color)
    }

    /// Another user's message. Each modifier is prepended, so the last one
    /// ends up leftmost.
    pub fn user_message(&mut self, sender: &str, message: &str, modifiers: &[String]) -> bool {
        let mut name = format!("@{sender}");
        for modifier in modifiers {
            name = format!("{modifier}{name}");
        }
        let color = self.body_color();
        self.render(&name, message, "cyan", &color)
    }

    /// Cross-context traffic (tracked users, DMs, global).
    pub fn special_message(
        &mut self,
        prefix: &str,
        sender: &str,
        message: &str,
        color: Option<&str>,
    ) -> bool {
        let label = format!("{prefix} ~> @{{bold}}{sender}{{/bold}}");
        let body = self.body_color();
        self.render(&label, message, color.unwrap_or("yellow"), &body)
    }

    pub fn system(&mut self, message: &str) -> bool {
        let body = self.body_color();
        self.push_line(SYSTEM_SENDER, message, "green", &body, false)
    }
}

/// Byte ranges of space-delimited tokens in `plain` that equal a pin.
fn pin_ranges(plain: &str, pins: &[String]) -> Vec<(usize, usize)> {
    let mut ranges = Vec::new();
    let mut start = 0;
    for token in plain.split(' ') {
        let end = start + token.len();
        if !token.is_empty() && pins.iter().any(|pin| pin == token) {
            ranges.push((start, end));
        }
        start = end + 1;
    }
    ranges
}

fn highlight_pins(spans: Vec<StyledSpan>, pins: &[String]) -> Vec<StyledSpan> {
    if pins.is_empty() {
        return spans;
    }
    let ranges = pin_ranges(&markup::plain_text(&spans), pins);
    if ranges.is_empty() {
        return spans;
    }

    let mut out = Vec::with_capacity(spans.len() + ranges.len() * 2);
    let mut offset = 0;
    for span in spans {
        let span_start = offset;
        let span_end = offset + span.text.len();
        let mut cursor = span_start;

        for &(start, end) in &ranges {
            if end <= cursor || start >= span_end {
                continue;
            }
            let from = start.max(cursor);
            let to = end.min(span_end);
            if from > cursor {
                out.push(StyledSpan::new(
                    &span.text[cursor - span_start..from - span_start],
                    span.style,
                ));
            }
            let pinned = SpanStyle {
                fg: Some(PIN_STYLE_FG),
                bg: Some(PIN_STYLE_BG),
                bold: span.style.bold,
            };
            out.push(StyledSpan::new(
                &span.text[from - span_start..to - span_start],
                pinned,
            ));
            cursor = to;
        }
        if cursor < span_end {
            out.push(StyledSpan::new(&span.text[cursor - span_start..], span.style));
        }
        offset = span_end;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state_with_pins(pins: &[&str]) -> SessionState {
        SessionState {
            word_pins: pins.iter().map(|p| p.to_string()).collect(),
            ..Default::default()
        }
    }

    fn pinned_tokens(line: &RenderedLine) -> Vec<String> {
        line.spans
            .iter()
            .filter(|s| s.style.bg == Some(PIN_STYLE_BG))
            .map(|s| s.text.clone())
            .collect()
    }

    #[test]
    fn test_render_applies_template() {
        let state = SessionState::default();
        let mut output = Output::new(10);
        assert!(MessageRenderer::new(&state, &mut output).render("alice", "hi there", "cyan", "white"));
        assert_eq!(output.last().unwrap().text(), "<alice> hi there");
    }

    #[test]
    fn test_render_colors_sender_and_message() {
        let state = SessionState::default();
        let mut output = Output::new(10);
        MessageRenderer::new(&state, &mut output).render("alice", "hi", "cyan", "#ff0000");
        let spans = &output.last().unwrap().spans;
        let sender = spans.iter().find(|s| s.text == "alice").unwrap();
        let body = spans.iter().find(|s| s.text == "hi").unwrap();
        assert_eq!(sender.style.fg, Some(Color::Named(NamedColor::Cyan)));
        assert_eq!(body.style.fg, Some(Color::Rgb(255, 0, 0)));
    }

    #[test]
    fn test_unknown_color_rejects_line() {
        let state = SessionState::default();
        let mut output = Output::new(10);
        let pushed = MessageRenderer::new(&state, &mut output).render(
            "alice",
            "secret",
            "white",
            "not-a-real-color",
        );
        assert!(!pushed);
        assert_eq!(output.len(), 1);
        let text = output.last().unwrap().text();
        assert!(text.starts_with("<System>"));
        assert!(!text.contains("secret"));
    }

    #[test]
    fn test_unknown_placeholders_survive() {
        let state = SessionState {
            message_format: "[{time}] {sender}: {message}".into(),
            ..Default::default()
        };
        let mut output = Output::new(10);
        MessageRenderer::new(&state, &mut output).render("bob", "yo", "white", "white");
        assert_eq!(output.last().unwrap().text(), "[{time}] bob: yo");
    }

    #[test]
    fn test_pin_highlights_whole_token_only() {
        let state = state_with_pins(&["foo"]);
        let mut output = Output::new(10);
        MessageRenderer::new(&state, &mut output).render("bob", "foo foobar xfoo foo", "white", "white");
        let line = output.last().unwrap();
        assert_eq!(pinned_tokens(line), vec!["foo", "foo"]);
        assert_eq!(line.text(), "<bob> foo foobar xfoo foo");
    }

    #[test]
    fn test_pin_inside_label_punctuation_not_matched() {
        let state = state_with_pins(&["bob"]);
        let mut output = Output::new(10);
        MessageRenderer::new(&state, &mut output).render("bob", "hello bob", "white", "white");
        // "<bob>" is one token; only the standalone body token matches
        assert_eq!(pinned_tokens(output.last().unwrap()), vec!["bob"]);
    }

    #[test]
    fn test_system_lines_skip_pins() {
        let state = state_with_pins(&["foo"]);
        let mut output = Output::new(10);
        MessageRenderer::new(&state, &mut output).system("foo happened");
        assert!(pinned_tokens(output.last().unwrap()).is_empty());
    }

    #[test]
    fn test_own_message_from_user_named_system_keeps_pins() {
        let state = state_with_pins(&["foo"]);
        let mut output = Output::new(10);
        MessageRenderer::new(&state, &mut output).self_message("System", "foo bar");
        let line = output.last().unwrap();
        assert_eq!(line.text(), "<@System> foo bar");
        assert_eq!(pinned_tokens(line), vec!["foo"]);
    }

    #[test]
    fn test_user_modifiers_last_is_leftmost() {
        let state = SessionState::default();
        let mut output = Output::new(10);
        MessageRenderer::new(&state, &mut output).user_message(
            "carol",
            "hey",
            &["+".to_string(), "&".to_string()],
        );
        assert_eq!(output.last().unwrap().text(), "<&+@carol> hey");
    }

    #[test]
    fn test_special_message_defaults_to_yellow() {
        let state = SessionState::default();
        let mut output = Output::new(10);
        MessageRenderer::new(&state, &mut output).special_message("Track", "dave", "sup", None);
        let line = output.last().unwrap();
        assert_eq!(line.text(), "<Track ~> @dave> sup");
        let label = line.spans.iter().find(|s| s.text == "dave").unwrap();
        assert_eq!(label.style.fg, Some(Color::Named(NamedColor::Yellow)));
        assert!(label.style.bold);
    }

    #[test]
    fn test_output_capacity_and_redraw() {
        let state = SessionState::default();
        let mut output = Output::new(2);
        let _ = output.take_redraw();
        for n in 0..3 {
            MessageRenderer::new(&state, &mut output).system(&n.to_string());
        }
        assert_eq!(output.len(), 2);
        assert!(output.take_scroll_to_end());
        assert_eq!(output.take_redraw(), Some(false));
        assert_eq!(output.take_redraw(), None);
        output.clear();
        assert_eq!(output.take_redraw(), Some(true));
    }
}
