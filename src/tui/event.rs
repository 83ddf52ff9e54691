use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers, MouseEventKind};
use log::warn;

use crate::core::action::Action;

/// TUI-specific input events
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TuiEvent {
    // Forwarded to core::update
    InputChar(char),
    Paste(String),
    Backspace,
    Submit,
    Complete,
    Escape,
    EditLast,
    DeleteLast,
    Quit,
    ForceQuit,

    // TUI-local
    ScrollUp,
    ScrollDown,
    ScrollPageUp,
    ScrollPageDown,
    Resize,
}

impl TuiEvent {
    /// The core action for events the session handles. Paste expands to
    /// one action per character.
    pub fn into_actions(self) -> Vec<Action> {
        match self {
            TuiEvent::InputChar(c) => vec![Action::InsertChar(c)],
            TuiEvent::Paste(text) => text
                .chars()
                .filter(|c| *c != '\r' && *c != '\n')
                .map(Action::InsertChar)
                .collect(),
            TuiEvent::Backspace => vec![Action::Backspace],
            TuiEvent::Submit => vec![Action::Submit],
            TuiEvent::Complete => vec![Action::Complete],
            TuiEvent::Escape => vec![Action::ClearInput],
            TuiEvent::EditLast => vec![Action::EditLast],
            TuiEvent::DeleteLast => vec![Action::DeleteLast],
            TuiEvent::Quit => vec![Action::Quit],
            TuiEvent::ForceQuit => vec![Action::ForceQuit],
            TuiEvent::ScrollUp
            | TuiEvent::ScrollDown
            | TuiEvent::ScrollPageUp
            | TuiEvent::ScrollPageDown
            | TuiEvent::Resize => Vec::new(),
        }
    }
}

pub fn map_key(key: KeyEvent) -> Option<TuiEvent> {
    if key.kind == KeyEventKind::Release {
        return None;
    }
    match (key.modifiers, key.code) {
        (KeyModifiers::CONTROL, KeyCode::Char('c')) => Some(TuiEvent::Quit),
        (KeyModifiers::CONTROL, KeyCode::Char('x')) => Some(TuiEvent::ForceQuit),
        (KeyModifiers::CONTROL, _) => None,
        (_, KeyCode::Char(c)) => Some(TuiEvent::InputChar(c)),
        (_, KeyCode::Backspace) => Some(TuiEvent::Backspace),
        (_, KeyCode::Enter) => Some(TuiEvent::Submit),
        (_, KeyCode::Tab) => Some(TuiEvent::Complete),
        (_, KeyCode::Esc) => Some(TuiEvent::Escape),
        (_, KeyCode::Up) => Some(TuiEvent::EditLast),
        (_, KeyCode::Down) => Some(TuiEvent::DeleteLast),
        (_, KeyCode::PageUp) => Some(TuiEvent::ScrollPageUp),
        (_, KeyCode::PageDown) => Some(TuiEvent::ScrollPageDown),
        _ => None,
    }
}

/// Poll for an event without blocking (returns immediately)
pub fn poll_event_immediate() -> Option<TuiEvent> {
    poll_event_timeout(std::time::Duration::ZERO)
}

pub fn poll_event_timeout(timeout: std::time::Duration) -> Option<TuiEvent> {
    match event::poll(timeout) {
        Ok(true) => {}
        Ok(false) => return None,
        Err(e) => {
            warn!("Event poll failed: {}", e);
            return None;
        }
    }
    let event = match event::read() {
        Ok(event) => event,
        Err(e) => {
            warn!("Event read failed: {}", e);
            return None;
        }
    };
    match event {
        Event::Key(key_event) => {
            log::debug!("Key event: {:?} with modifiers {:?}", key_event.code, key_event.modifiers);
            map_key(key_event)
        }
        Event::Mouse(mouse_event) => match mouse_event.kind {
            MouseEventKind::ScrollUp => Some(TuiEvent::ScrollUp),
            MouseEventKind::ScrollDown => Some(TuiEvent::ScrollDown),
            _ => None,
        },
        Event::Paste(data) => Some(TuiEvent::Paste(data)),
        Event::Resize(_, _) => Some(TuiEvent::Resize),
        _ => None,
    }
}
