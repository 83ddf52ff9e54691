//! Test utilities shared across the crate.
//!
//! This module is only compiled during tests (`#[cfg(test)]`).

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::core::action::{Action, update};
use crate::core::app::App;
use crate::core::config::ResolvedConfig;
use crate::transport::{
    Channel, ChannelKind, Guild, InboundMessage, MessageOrigin, TransportEvent, User,
};

static SCRATCH: AtomicUsize = AtomicUsize::new(0);

/// A path under the system temp dir no other test uses. Nothing is created.
fn scratch_path(label: &str) -> PathBuf {
    let n = SCRATCH.fetch_add(1, Ordering::Relaxed);
    std::env::temp_dir().join(format!("termcord-test-{}-{n}", std::process::id())).join(label)
}

/// An App with default settings, a private state file and no theme catalog.
pub fn test_app() -> App {
    let config = ResolvedConfig {
        state_file: scratch_path("state.json"),
        themes_dir: scratch_path("themes"),
        ..ResolvedConfig::default()
    };
    App::new(config)
}

/// An App that has received Ready as `me#0001`, with guild "Home"
/// (`g1`: #general, #random) active on #general. Pending effects are drained.
pub fn connected_app() -> App {
    let mut app = test_app();
    update(
        &mut app,
        Action::Transport(TransportEvent::Ready {
            user: user("u-me", "me#0001", false),
            token: "tok".into(),
            guilds: vec![guild("g1", "Home", &["general", "random"])],
            latency_ms: 42,
        }),
    );
    app.effects.drain();
    app
}

pub fn user(id: &str, tag: &str, bot: bool) -> User {
    User {
        id: id.into(),
        tag: tag.into(),
        bot,
    }
}

/// A guild of three members whose text channels get ids `c-<name>`.
pub fn guild(id: &str, name: &str, channels: &[&str]) -> Guild {
    Guild {
        id: id.into(),
        name: name.into(),
        member_count: 3,
        channels: channels
            .iter()
            .map(|c| Channel {
                id: format!("c-{c}"),
                name: (*c).into(),
                kind: ChannelKind::Text,
            })
            .collect(),
    }
}

pub fn inbound(id: &str, origin: MessageOrigin, author: User, content: &str) -> InboundMessage {
    InboundMessage {
        id: id.into(),
        origin,
        author,
        content: content.into(),
        roles: None,
    }
}
