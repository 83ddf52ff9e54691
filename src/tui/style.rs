//! Core colors and markup styles → ratatui styles.

use ratatui::style::{Color as TermColor, Modifier, Style};
use ratatui::text::{Line, Span};

use crate::core::color::{Color, NamedColor};
use crate::core::markup::{SpanStyle, StyledSpan};
use crate::core::theme::RegionStyle;

pub fn term_color(color: Color) -> TermColor {
    match color {
        Color::Rgb(r, g, b) => TermColor::Rgb(r, g, b),
        Color::Named(named) => match named {
            NamedColor::Black => TermColor::Black,
            NamedColor::Red => TermColor::Red,
            NamedColor::Green => TermColor::Green,
            NamedColor::Yellow => TermColor::Yellow,
            NamedColor::Blue => TermColor::Blue,
            NamedColor::Magenta => TermColor::Magenta,
            NamedColor::Cyan => TermColor::Cyan,
            NamedColor::White => TermColor::White,
            NamedColor::Gray => TermColor::DarkGray,
            NamedColor::DarkGray => TermColor::DarkGray,
            NamedColor::LightRed => TermColor::LightRed,
            NamedColor::LightGreen => TermColor::LightGreen,
            NamedColor::LightYellow => TermColor::LightYellow,
            NamedColor::LightBlue => TermColor::LightBlue,
            NamedColor::LightMagenta => TermColor::LightMagenta,
            NamedColor::LightCyan => TermColor::LightCyan,
            NamedColor::LightGray => TermColor::Gray,
        },
    }
}

/// A theme color string; unparseable values fall back to the terminal default.
pub fn named(value: &str) -> TermColor {
    Color::parse(value).map(term_color).unwrap_or(TermColor::Reset)
}

pub fn region(style: &RegionStyle) -> Style {
    Style::default()
        .fg(named(&style.foreground_color))
        .bg(named(&style.background_color))
}

pub fn span_style(style: &SpanStyle) -> Style {
    let mut out = Style::default();
    if let Some(fg) = style.fg {
        out = out.fg(term_color(fg));
    }
    if let Some(bg) = style.bg {
        out = out.bg(term_color(bg));
    }
    if style.bold {
        out = out.add_modifier(Modifier::BOLD);
    }
    out
}

pub fn line(spans: &[StyledSpan]) -> Line<'static> {
    Line::from(
        spans
            .iter()
            .map(|s| Span::styled(s.text.clone(), span_style(&s.style)))
            .collect::<Vec<_>>(),
    )
}
