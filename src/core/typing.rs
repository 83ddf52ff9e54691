//! # Typing Indicator
//!
//! ```text
//! idle ──start()──▶ active ──stop() / timer──▶ idle
//! ```
//!
//! The pending timer's handle lives in `SessionState::typing_timer`; it is
//! cleared in the same update that cancels or consumes the timer.

use std::time::Duration;

use log::debug;

use crate::core::action::{Effect, EffectQueue};
use crate::core::state::{StateStore, TimerHandle};

pub struct TypingIndicator {
    timeout: Duration,
}

impl TypingIndicator {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Signal "typing" and arm the expiry timer.
    ///
    /// No-op when muted, without an active channel, or when already active.
    pub fn start(&self, state: &mut StateStore, effects: &mut EffectQueue) -> bool {
        let current = state.get();
        if current.muted || current.typing_timer.is_some() {
            return false;
        }
        let Some(channel_id) = current.active_channel.clone() else {
            return false;
        };

        effects.push(Effect::StartTyping { channel_id });
        let handle = effects.arm(self.timeout);
        state.update(|s| s.typing_timer = Some(handle));
        debug!("Typing started, timer {:?}", handle);
        true
    }

    /// Cancel the timer and signal "stop typing". No-op when idle.
    pub fn stop(&self, state: &mut StateStore, effects: &mut EffectQueue) -> bool {
        let Some(handle) = state.get().typing_timer else {
            return false;
        };
        effects.cancel(handle);
        self.finish(state, effects);
        true
    }

    /// The expiry timer fired. Stale handles are ignored.
    pub fn expire(
        &self,
        state: &mut StateStore,
        effects: &mut EffectQueue,
        handle: TimerHandle,
    ) -> bool {
        if state.get().typing_timer != Some(handle) {
            return false;
        }
        self.finish(state, effects);
        true
    }

    fn finish(&self, state: &mut StateStore, effects: &mut EffectQueue) {
        state.update(|s| s.typing_timer = None);
        if let Some(channel_id) = state.get().active_channel.clone() {
            effects.push(Effect::StopTyping { channel_id });
        }
        debug!("Typing stopped");
    }
}
