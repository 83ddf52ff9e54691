//! # TUI Adapter
//!
//! The ratatui-specific layer. Handles terminal I/O, renders the UI,
//! translates keyboard events into core::Action values and executes the
//! effects `update()` hands back.
//!
//! This is the only module that knows about ratatui and crossterm.
//!
//! ## Redraw Strategy
//!
//! The loop sleeps up to 100ms waiting for input, then drains every pending
//! key and every action posted by background tasks before drawing once.
//! A frame is drawn only when an event arrived or the output buffer asked
//! for it; a hard redraw clears the terminal first.

mod component;
mod components;
mod effects;
mod event;
mod style;
mod ui;

use log::{info, warn};
use std::io::stdout;
use std::sync::{Arc, mpsc};
use std::time::Duration;

use crossterm::cursor::{SetCursorStyle, Show};
use crossterm::event::{
    DisableBracketedPaste, DisableMouseCapture, EnableBracketedPaste, EnableMouseCapture,
};
use crossterm::execute;

use crate::core::action::{Action, update};
use crate::core::app::App;
use crate::core::config::ResolvedConfig;
use crate::transport::{RestTransport, Transport};
use crate::tui::component::EventHandler;
use crate::tui::components::MessagePaneState;
use crate::tui::effects::EffectRunner;
use crate::tui::event::{TuiEvent, poll_event_immediate, poll_event_timeout};

const POLL_TIMEOUT: Duration = Duration::from_millis(100);
const DISCONNECT_GRACE: Duration = Duration::from_secs(2);

/// TUI-specific presentation state (not part of core session logic)
pub struct TuiState {
    pub message_pane: MessagePaneState,
}

impl Default for TuiState {
    fn default() -> Self {
        Self::new()
    }
}

impl TuiState {
    pub fn new() -> Self {
        Self {
            message_pane: MessagePaneState::new(),
        }
    }
}

struct TerminalModeGuard;

impl TerminalModeGuard {
    fn new() -> std::io::Result<Self> {
        execute!(
            stdout(),
            EnableMouseCapture,
            EnableBracketedPaste,
            Show,
            SetCursorStyle::SteadyBlock,
        )?;
        info!("Terminal modes enabled (mouse, bracketed paste, steady block cursor)");
        Ok(Self)
    }
}

impl Drop for TerminalModeGuard {
    fn drop(&mut self) {
        let _ = execute!(stdout(), DisableMouseCapture, DisableBracketedPaste);
    }
}

pub fn build_transport(config: &ResolvedConfig) -> Arc<dyn Transport> {
    Arc::new(RestTransport::new(
        Some(config.api_base_url.clone()),
        config.poll_interval,
    ))
}

/// Run the client until the session asks to exit. Returns the exit code.
pub fn run(config: ResolvedConfig, env_token: Option<String>) -> std::io::Result<i32> {
    let transport = build_transport(&config);
    let mut app = App::new(config);
    let mut tui = TuiState::new();

    let mut terminal = ratatui::init();
    let _terminal_mode_guard = TerminalModeGuard::new();

    // Channel for actions from background tasks
    let (tx, rx) = mpsc::channel();
    let mut runner = EffectRunner::new(transport, tx);

    app.start(env_token);
    let mut exit_code = runner.run_all(app.effects.drain());
    let mut needs_redraw = true;

    while exit_code.is_none() {
        if let Some(hard) = app.output.take_redraw() {
            if hard {
                terminal.clear()?;
            }
            needs_redraw = true;
        }
        if app.output.take_scroll_to_end() {
            tui.message_pane.stick_to_bottom = true;
        }
        if needs_redraw {
            terminal.draw(|f| ui::draw_ui(f, &app, &mut tui))?;
            needs_redraw = false;
        }

        let first_event = poll_event_timeout(POLL_TIMEOUT);
        if first_event.is_some() {
            needs_redraw = true;
        }
        for event in first_event
            .into_iter()
            .chain(std::iter::from_fn(poll_event_immediate))
        {
            if matches!(
                event,
                TuiEvent::ScrollUp
                    | TuiEvent::ScrollDown
                    | TuiEvent::ScrollPageUp
                    | TuiEvent::ScrollPageDown
            ) {
                tui.message_pane.handle_event(&event);
                continue;
            }
            for action in event.into_actions() {
                if let Some(code) = runner.run_all(update(&mut app, action)) {
                    exit_code = Some(code);
                }
            }
            if exit_code.is_some() {
                break;
            }
        }

        // Handle background task actions (transport events, completions, timers)
        while exit_code.is_none()
            && let Ok(action) = rx.try_recv()
        {
            needs_redraw = true;
            if let Action::TimerFired(handle) = action {
                runner.timer_fired(handle);
            }
            if let Some(code) = runner.run_all(update(&mut app, action)) {
                exit_code = Some(code);
            }
        }
    }

    // Let an in-flight disconnect finish before the runtime goes away
    if let Some(disconnect) = runner.take_disconnect() {
        let finished = tokio::task::block_in_place(|| {
            tokio::runtime::Handle::current()
                .block_on(async { tokio::time::timeout(DISCONNECT_GRACE, disconnect).await })
        });
        if finished.is_err() {
            warn!("Disconnect did not finish within {:?}", DISCONNECT_GRACE);
        }
    }

    ratatui::restore();
    let code = exit_code.unwrap_or(0);
    info!("Exiting with code {}", code);
    Ok(code)
}
