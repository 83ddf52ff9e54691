//! Inline markup for output lines.
//!
//! ```text
//! {bold}System{/bold}          bold text
//! {red-fg}+{/red-fg}           foreground color (names or #hex)
//! {cyan-bg}pin{/cyan-bg}       background color
//! {/}                          reset all styling
//! {open} {close}               literal braces
//! ```
//!
//! Any other `{...}` sequence is kept verbatim, so unknown template
//! placeholders survive rendering untouched.

use serde::{Deserialize, Serialize};

use crate::core::color::Color;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpanStyle {
    pub fg: Option<Color>,
    pub bg: Option<Color>,
    pub bold: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StyledSpan {
    pub text: String,
    pub style: SpanStyle,
}

impl StyledSpan {
    pub fn new(text: impl Into<String>, style: SpanStyle) -> Self {
        Self {
            text: text.into(),
            style,
        }
    }
}

enum Tag {
    Bold(bool),
    Fg(Option<Color>),
    Bg(Option<Color>),
    Reset,
    Literal(&'static str),
}

fn parse_tag(body: &str) -> Option<Tag> {
    match body {
        "bold" => return Some(Tag::Bold(true)),
        "/bold" => return Some(Tag::Bold(false)),
        "/" => return Some(Tag::Reset),
        "open" => return Some(Tag::Literal("{")),
        "close" => return Some(Tag::Literal("}")),
        _ => {}
    }
    let (closing, body) = match body.strip_prefix('/') {
        Some(rest) => (true, rest),
        None => (false, body),
    };
    if let Some(name) = body.strip_suffix("-fg") {
        let color = Color::parse(name)?;
        return Some(Tag::Fg(if closing { None } else { Some(color) }));
    }
    if let Some(name) = body.strip_suffix("-bg") {
        let color = Color::parse(name)?;
        return Some(Tag::Bg(if closing { None } else { Some(color) }));
    }
    None
}

/// Escapes text so that none of it is interpreted as markup.
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '{' => out.push_str("{open}"),
            '}' => out.push_str("{close}"),
            _ => out.push(c),
        }
    }
    out
}

/// Parses markup into styled spans. Adjacent spans of equal style are merged.
pub fn parse(markup: &str) -> Vec<StyledSpan> {
    let mut spans: Vec<StyledSpan> = Vec::new();
    let mut fg_stack: Vec<Color> = Vec::new();
    let mut bg_stack: Vec<Color> = Vec::new();
    let mut bold_depth = 0usize;
    let mut rest = markup;

    let current = |fg: &[Color], bg: &[Color], bold: usize| SpanStyle {
        fg: fg.last().copied(),
        bg: bg.last().copied(),
        bold: bold > 0,
    };

    let push = |spans: &mut Vec<StyledSpan>, text: &str, style: SpanStyle| {
        if text.is_empty() {
            return;
        }
        match spans.last_mut() {
            Some(last) if last.style == style => last.text.push_str(text),
            _ => spans.push(StyledSpan::new(text, style)),
        }
    };

    while let Some(open) = rest.find('{') {
        let style = current(&fg_stack, &bg_stack, bold_depth);
        push(&mut spans, &rest[..open], style);
        let after = &rest[open + 1..];

        let tag = after
            .find('}')
            .and_then(|close| parse_tag(&after[..close]).map(|tag| (tag, close)));

        match tag {
            Some((tag, close)) => {
                match tag {
                    Tag::Bold(true) => bold_depth += 1,
                    Tag::Bold(false) => bold_depth = bold_depth.saturating_sub(1),
                    Tag::Fg(Some(color)) => fg_stack.push(color),
                    Tag::Fg(None) => {
                        fg_stack.pop();
                    }
                    Tag::Bg(Some(color)) => bg_stack.push(color),
                    Tag::Bg(None) => {
                        bg_stack.pop();
                    }
                    Tag::Reset => {
                        fg_stack.clear();
                        bg_stack.clear();
                        bold_depth = 0;
                    }
                    Tag::Literal(text) => push(&mut spans, text, style),
                }
                rest = &after[close + 1..];
            }
            None => {
                push(&mut spans, "{", style);
                rest = after;
            }
        }
    }
    let style = current(&fg_stack, &bg_stack, bold_depth);
    push(&mut spans, rest, style);
    spans
}

/// Concatenated text of a span list, without styling.
pub fn plain_text(spans: &[StyledSpan]) -> String {
    spans.iter().map(|s| s.text.as_str()).collect()
}
