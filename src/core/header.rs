//! # Header Banner
//!
//! A one-line notice shown above the message pane. Showing it shrinks the
//! pane; hiding restores the full height. An auto-hiding header waits
//! `ms_per_char` per character of its text.

use std::fmt;
use std::time::Duration;

use crate::core::action::EffectQueue;
use crate::core::render::Output;
use crate::core::state::{StateStore, TimerHandle};

#[derive(Debug, PartialEq, Eq)]
pub enum HeaderError {
    MissingText,
}

impl fmt::Display for HeaderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HeaderError::MissingText => write!(f, "expecting header text"),
        }
    }
}

impl std::error::Error for HeaderError {}

pub struct HeaderNotifier {
    ms_per_char: u64,
    text: Option<String>,
}

impl HeaderNotifier {
    pub fn new(ms_per_char: u64) -> Self {
        Self {
            ms_per_char,
            text: None,
        }
    }

    pub fn is_visible(&self) -> bool {
        self.text.is_some()
    }

    /// Banner content as markup, `[!]`-prefixed.
    pub fn content(&self) -> Option<String> {
        self.text.as_ref().map(|t| format!("[!] {t}"))
    }

    pub fn show(
        &mut self,
        text: &str,
        auto_hide: bool,
        state: &mut StateStore,
        effects: &mut EffectQueue,
        output: &mut Output,
    ) -> Result<(), HeaderError> {
        if text.is_empty() {
            return Err(HeaderError::MissingText);
        }
        self.text = Some(text.to_string());

        if auto_hide {
            if let Some(previous) = state.get().header_timer {
                effects.cancel(previous);
            }
            let delay = Duration::from_millis(text.chars().count() as u64 * self.ms_per_char);
            let handle = effects.arm(delay);
            state.update(|s| s.header_timer = Some(handle));
        }

        output.request_redraw(false);
        Ok(())
    }

    /// Returns false when the header was already hidden.
    pub fn hide(
        &mut self,
        state: &mut StateStore,
        effects: &mut EffectQueue,
        output: &mut Output,
    ) -> bool {
        if let Some(pending) = state.get().header_timer {
            effects.cancel(pending);
            state.update(|s| s.header_timer = None);
        }
        if self.text.take().is_none() {
            return false;
        }
        output.request_redraw(false);
        true
    }

    /// The auto-hide timer fired. Stale handles are ignored.
    pub fn expire(&mut self, state: &mut StateStore, handle: TimerHandle, output: &mut Output) -> bool {
        if state.get().header_timer != Some(handle) {
            return false;
        }
        state.update(|s| s.header_timer = None);
        if self.text.take().is_some() {
            output.request_redraw(false);
        }
        true
    }
}
