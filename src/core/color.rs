//! Color names understood by the message pipeline and theme files.
//!
//! Accepts the basic terminal palette (`red`, `cyan`, ...), bright variants
//! spelled either `redBright` or `lightred`, the grays (`gray`, `grey`,
//! `lightgray`), and raw `#rgb` / `#rrggbb` values.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NamedColor {
    Black,
    Red,
    Green,
    Yellow,
    Blue,
    Magenta,
    Cyan,
    White,
    Gray,
    DarkGray,
    LightRed,
    LightGreen,
    LightYellow,
    LightBlue,
    LightMagenta,
    LightCyan,
    LightGray,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Color {
    Named(NamedColor),
    Rgb(u8, u8, u8),
}

impl Color {
    /// Parses a color name or `#hex` value. Returns None for anything unrecognized.
    pub fn parse(value: &str) -> Option<Color> {
        let value = value.trim();
        if let Some(hex) = value.strip_prefix('#') {
            return parse_hex(hex);
        }
        parse_name(value).map(Color::Named)
    }
}

fn parse_name(name: &str) -> Option<NamedColor> {
    let lower = name.to_ascii_lowercase();
    let base = lower
        .strip_suffix("bright")
        .map(|b| format!("light{b}"))
        .unwrap_or(lower);

    let color = match base.as_str() {
        "black" => NamedColor::Black,
        "red" => NamedColor::Red,
        "green" => NamedColor::Green,
        "yellow" => NamedColor::Yellow,
        "blue" => NamedColor::Blue,
        "magenta" => NamedColor::Magenta,
        "cyan" => NamedColor::Cyan,
        "white" | "lightwhite" => NamedColor::White,
        "gray" | "grey" => NamedColor::Gray,
        "darkgray" | "darkgrey" | "lightblack" => NamedColor::DarkGray,
        "lightred" => NamedColor::LightRed,
        "lightgreen" => NamedColor::LightGreen,
        "lightyellow" => NamedColor::LightYellow,
        "lightblue" => NamedColor::LightBlue,
        "lightmagenta" => NamedColor::LightMagenta,
        "lightcyan" => NamedColor::LightCyan,
        "lightgray" | "lightgrey" => NamedColor::LightGray,
        _ => return None,
    };
    Some(color)
}

fn parse_hex(hex: &str) -> Option<Color> {
    if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    match hex.len() {
        6 => {
            let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
            let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
            let b = u8::from_str_radix(&hex[4..6], 16).ok()?;
            Some(Color::Rgb(r, g, b))
        }
        3 => {
            let mut channels = hex
                .chars()
                .map(|c| c.to_digit(16).map(|d| (d * 17) as u8));
            let r = channels.next()??;
            let g = channels.next()??;
            let b = channels.next()??;
            Some(Color::Rgb(r, g, b))
        }
        _ => None,
    }
}
