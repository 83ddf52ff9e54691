//! # Actions
//!
//! Everything that can happen to a session becomes an `Action`.
//! User presses Enter? That's `Action::Submit`.
//! Transport delivers a message? That's `Action::Transport(event)`.
//! A timer ran out? That's `Action::TimerFired(handle)`.
//!
//! `update()` applies an action to the [`App`] and returns the I/O the
//! runtime must perform as a list of `Effect`s. No network calls, sleeps or
//! terminal writes happen in here; their results come back as new actions.
//!
//! ```text
//! App + Action  →  update()  →  App' + [Effect]
//!                                  │
//!                   runtime executes effects, posts completions as Actions
//! ```

use std::time::Duration;

use log::debug;

use crate::core::app::App;
use crate::core::state::{OutgoingMessage, TimerHandle};
use crate::transport::{Snowflake, TransportEvent};

#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    InsertChar(char),
    Backspace,
    /// Enter: dispatch a command or send the input as a message.
    Submit,
    /// Tab: complete a partial command name.
    Complete,
    /// Esc: clear the input, keeping the prefix when it holds a command.
    ClearInput,
    /// Up: prefill an edit of the last outgoing message.
    EditLast,
    /// Down: delete the last outgoing message.
    DeleteLast,
    /// Ctrl+C: graceful shutdown.
    Quit,
    /// Ctrl+X: exit immediately without saving.
    ForceQuit,
    Transport(TransportEvent),
    Completed(Completion),
    TimerFired(TimerHandle),
}

/// Results of transport round-trips started by an [`Effect`].
#[derive(Debug, Clone, PartialEq)]
pub enum Completion {
    LoginFailed(String),
    Sent(OutgoingMessage),
    SendFailed(String),
    EditFailed(String),
    DeleteFailed(String),
}

/// I/O requested by the core, executed by the runtime in order.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    Connect {
        token: String,
    },
    Disconnect,
    /// Make this the channel followed for inbound traffic.
    Watch {
        channel_id: Snowflake,
    },
    /// Follow every guild text channel too (global mode or tracked users).
    FollowAll(bool),
    /// `content` goes on the wire; `plaintext` is what the user typed and
    /// is what an edit of this message starts from.
    Send {
        channel_id: Snowflake,
        content: String,
        plaintext: String,
    },
    SendDirect {
        user_id: Snowflake,
        content: String,
    },
    StartTyping {
        channel_id: Snowflake,
    },
    StopTyping {
        channel_id: Snowflake,
    },
    Edit {
        channel_id: Snowflake,
        message_id: Snowflake,
        content: String,
    },
    Delete {
        channel_id: Snowflake,
        message_id: Snowflake,
    },
    ArmTimer {
        handle: TimerHandle,
        delay: Duration,
    },
    CancelTimer(TimerHandle),
    SetTitle(String),
    Exit(i32),
}

/// Pending effects plus the timer-handle counter.
#[derive(Debug, Default)]
pub struct EffectQueue {
    effects: Vec<Effect>,
    next_timer: u64,
}

impl EffectQueue {
    pub fn push(&mut self, effect: Effect) {
        self.effects.push(effect);
    }

    /// Arm a new timer. Handles are never reused.
    pub fn arm(&mut self, delay: Duration) -> TimerHandle {
        self.next_timer += 1;
        let handle = TimerHandle(self.next_timer);
        self.effects.push(Effect::ArmTimer { handle, delay });
        handle
    }

    pub fn cancel(&mut self, handle: TimerHandle) {
        self.effects.push(Effect::CancelTimer(handle));
    }

    pub fn drain(&mut self) -> Vec<Effect> {
        std::mem::take(&mut self.effects)
    }

    pub fn is_empty(&self) -> bool {
        self.effects.is_empty()
    }
}

pub fn update(app: &mut App, action: Action) -> Vec<Effect> {
    debug!("Action: {:?}", action);
    match action {
        Action::InsertChar(c) => app.insert_char(c),
        Action::Backspace => {
            app.input.pop();
        }
        Action::Submit => app.submit(),
        Action::Complete => app.complete_input(),
        Action::ClearInput => app.clear_input(),
        Action::EditLast => app.prefill_edit_last(),
        Action::DeleteLast => app.delete_last(),
        Action::Quit => app.shutdown(0),
        Action::ForceQuit => app.effects.push(Effect::Exit(0)),
        Action::Transport(event) => app.handle_transport(event),
        Action::Completed(completion) => app.handle_completion(completion),
        Action::TimerFired(handle) => app.handle_timer(handle),
    }
    app.sync_follow_scope();
    app.effects.drain()
}
