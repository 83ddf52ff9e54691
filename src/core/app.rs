//! # Session Controller
//!
//! ```text
//! App
//! ├── config: ResolvedConfig        // prefix, paths, timings
//! ├── state: StateStore             // the one mutable session record
//! ├── themes: ThemeStore            // theme catalog
//! ├── output: Output                // message pane scrollback
//! ├── header: HeaderNotifier        // banner above the pane
//! ├── typing: TypingIndicator
//! ├── directory: Directory          // guilds/users the transport reported
//! ├── commands: CommandRegistry
//! ├── cipher: Box<dyn Cipher>
//! ├── effects: EffectQueue          // I/O for the runtime, drained by update()
//! ├── input: String                 // the input line
//! ├── channels_visible: bool
//! ├── following_all: bool           // last scope sent to the transport
//! └── title: String
//! ```
//!
//! Transport events and key presses arrive through `action::update`, which
//! calls into the methods here.

use log::{debug, error, info, warn};

use crate::core::action::{Completion, Effect, EffectQueue};
use crate::core::cipher::{self, ChaChaCipher, Cipher};
use crate::core::commands::{self, CommandError, CommandRegistry};
use crate::core::config::ResolvedConfig;
use crate::core::directory::Directory;
use crate::core::header::{HeaderError, HeaderNotifier};
use crate::core::markup::escape;
use crate::core::render::{MessageRenderer, Output};
use crate::core::state::{OutgoingMessage, SessionState, StateStore, TimerHandle};
use crate::core::tags;
use crate::core::theme::{DEFAULT_THEME, ThemeData, ThemeError, ThemeStore};
use crate::core::typing::TypingIndicator;
use crate::transport::{Channel, Guild, InboundMessage, MessageOrigin, TransportEvent, User};

pub const BASE_TITLE: &str = "Discord Terminal";
const MAX_CHANNEL_LABEL: usize = 25;
const TRUNCATED_CHANNEL_LABEL: usize = 21;

/// One row of the channel list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelEntry {
    pub id: String,
    pub label: String,
    pub active: bool,
}

/// How an inbound message is shown, decided before anything is rendered.
enum Route {
    Drop,
    Own,
    OwnDirect(User),
    Channel(Vec<String>),
    Special {
        prefix: &'static str,
        color: Option<&'static str>,
    },
}

pub struct App {
    pub config: ResolvedConfig,
    pub state: StateStore,
    pub themes: ThemeStore,
    pub output: Output,
    pub header: HeaderNotifier,
    pub typing: TypingIndicator,
    pub directory: Directory,
    pub commands: CommandRegistry,
    pub cipher: Box<dyn Cipher>,
    pub effects: EffectQueue,
    pub input: String,
    pub channels_visible: bool,
    pub following_all: bool,
    pub title: String,
}

impl App {
    pub fn new(config: ResolvedConfig) -> Self {
        let mut state = StateStore::new(config.state_file.clone());
        state.on_changed(log_state_change);

        Self {
            themes: ThemeStore::new(config.themes_dir.clone()),
            output: Output::new(config.scrollback),
            header: HeaderNotifier::new(config.header_ms_per_char),
            typing: TypingIndicator::new(config.typing_timeout),
            directory: Directory::default(),
            commands: CommandRegistry::builtin(),
            cipher: Box::new(ChaChaCipher),
            effects: EffectQueue::default(),
            input: String::new(),
            channels_visible: false,
            following_all: false,
            title: BASE_TITLE.to_string(),
            state,
            config,
        }
    }

    // ========================================================================
    // Startup & shutdown
    // ========================================================================

    /// Sync saved state, then log in: environment token, saved token, or prompt.
    pub fn start(&mut self, env_token: Option<String>) {
        self.sync_state();

        let prefix = self.config.command_prefix.clone();
        if let Some(token) = env_token.filter(|t| !t.trim().is_empty()) {
            self.system("Attempting to login using environment token");
            self.login(token.trim());
        } else if let Some(token) = self.state.get().token.clone() {
            self.system(&format!(
                "Attempting to login using saved token; Use {{bold}}{prefix}forget{{/bold}} to forget the token"
            ));
            self.login(&token);
        } else {
            self.input = format!("{prefix}login ");
            // non-empty literal, cannot fail
            let _ = self.show_header(
                "{bold}Pro Tip.{/bold} Set the environment variable {bold}TOKEN{/bold} to automagically login!",
                false,
            );
            self.system(&format!(
                "Welcome! Please login using {{bold}}{prefix}login <token>{{/bold}} or {{bold}}{prefix}help{{/bold}} to view available commands"
            ));
        }
    }

    pub fn login(&mut self, token: &str) {
        info!("Login requested");
        self.effects.push(Effect::Connect {
            token: token.to_string(),
        });
    }

    /// Stop typing, disconnect, save, exit. Every step runs even if an
    /// earlier one reported an error.
    pub fn shutdown(&mut self, code: i32) {
        info!("Shutting down with code {}", code);
        self.stop_typing();
        self.effects.push(Effect::Disconnect);
        self.save_state();
        self.effects.push(Effect::Exit(code));
    }

    // ========================================================================
    // Output
    // ========================================================================

    pub fn renderer(&mut self) -> MessageRenderer<'_> {
        MessageRenderer::new(self.state.get(), &mut self.output)
    }

    pub fn system(&mut self, message: &str) {
        self.renderer().system(message);
    }

    pub fn show_header(&mut self, text: &str, auto_hide: bool) -> Result<(), HeaderError> {
        self.header.show(
            text,
            auto_hide,
            &mut self.state,
            &mut self.effects,
            &mut self.output,
        )
    }

    pub fn hide_header(&mut self) -> bool {
        self.header
            .hide(&mut self.state, &mut self.effects, &mut self.output)
    }

    pub fn toggle_channels(&mut self) {
        self.channels_visible = !self.channels_visible;
        self.output.request_redraw(false);
    }

    // ========================================================================
    // Persistence & themes
    // ========================================================================

    /// Save the session record, reporting the outcome as system lines.
    pub fn save_state(&mut self) -> bool {
        self.system("Saving application state ...");
        let path = escape(&self.state.path().display().to_string());
        match self.state.save() {
            Ok(bytes) => {
                info!("Saved state ({} bytes)", bytes);
                self.system(&format!("Application state saved @ '{path}' ({bytes} bytes)"));
                true
            }
            Err(e) => {
                error!("Failed to save state: {}", e);
                self.system(&format!(
                    "{{red-fg}}Unable to save state @ '{path}': {}{{/red-fg}}",
                    escape(&e.to_string())
                ));
                false
            }
        }
    }

    /// Merge the state file into the session. Returns whether a sync happened.
    pub fn sync_state(&mut self) -> bool {
        let previous_theme = self.state.get().theme.clone();
        let path = escape(&self.state.path().display().to_string());
        match self.state.sync() {
            Ok(Some(bytes)) => {
                self.system(&format!("Synced state @ {path} ({bytes} bytes)"));
                let theme = self.state.get().theme.clone();
                if theme != previous_theme
                    && let Err(e) = self.load_theme(&theme)
                {
                    self.report(e);
                    self.state.update(|s| s.theme = previous_theme);
                }
                true
            }
            Ok(None) => false,
            Err(e) => {
                warn!("State sync failed: {}", e);
                self.system(&format!(
                    "There was an error while reading the state file: {}",
                    escape(&e.to_string())
                ));
                false
            }
        }
    }

    pub fn load_theme(&mut self, name: &str) -> Result<(), CommandError> {
        let shown = escape(name);
        if name != DEFAULT_THEME {
            self.system(&format!("Loading theme '{{bold}}{shown}{{/bold}}' ..."));
        }
        match self.themes.load(name) {
            Ok(loaded) => self.apply_theme(&loaded.name, Some(loaded.data), loaded.byte_len),
            Err(ThemeError::NotFound(_)) => Err(CommandError::Failed(format!(
                "Theme '{{bold}}{shown}{{/bold}}' not found (Are you sure it is under {{bold}}{}{{/bold}}?)",
                escape(&self.themes.dir().display().to_string())
            ))),
            Err(e) => {
                warn!("Theme '{}' failed to load: {}", name, e);
                Err(CommandError::Failed(format!(
                    "Unable to load theme '{shown}': {}",
                    escape(&e.to_string())
                )))
            }
        }
    }

    pub fn apply_theme(
        &mut self,
        name: &str,
        data: Option<ThemeData>,
        byte_len: usize,
    ) -> Result<(), CommandError> {
        match self.themes.apply(&mut self.state, name, data, byte_len) {
            Ok(bytes) => {
                self.output.request_redraw(false);
                self.system(&format!("Applied theme '{}' ({bytes} bytes)", escape(name)));
                Ok(())
            }
            Err(e) => Err(CommandError::Failed(format!(
                "Error while setting theme: {}",
                escape(&e.to_string())
            ))),
        }
    }

    fn report(&mut self, error: CommandError) {
        match error {
            CommandError::Failed(message) => self.system(&message),
            CommandError::Usage(usage) => {
                let prefix = self.config.command_prefix.clone();
                self.system(&format!("Usage: {{bold}}{prefix}{usage}{{/bold}}"));
            }
        }
    }

    // ========================================================================
    // Navigation
    // ========================================================================

    pub fn active_guild(&self) -> Option<&Guild> {
        let id = self.state.get().active_guild.as_deref()?;
        self.directory.guild(id)
    }

    pub fn active_channel(&self) -> Option<&Channel> {
        let id = self.state.get().active_channel.as_deref()?;
        self.active_guild()?.channel(id)
    }

    pub fn set_active_guild(&mut self, guild_id: &str) {
        let Some(guild) = self.directory.guild(guild_id).cloned() else {
            warn!("Unknown guild {}", guild_id);
            return;
        };
        self.stop_typing();
        self.state.update(|s| {
            s.active_guild = Some(guild.id.clone());
            s.active_channel = None;
        });
        self.system(&format!(
            "Switched to guild '{{bold}}{}{{/bold}}'",
            escape(&guild.name)
        ));

        match guild.default_channel().map(|c| c.id.clone()) {
            Some(channel_id) => self.set_active_channel(&channel_id),
            None => self.system(&format!(
                "Warning: Guild '{}' doesn't have any text channels",
                escape(&guild.name)
            )),
        }
        self.update_title();
        self.output.request_redraw(false);
    }

    pub fn set_active_channel(&mut self, channel_id: &str) {
        let Some(channel) = self
            .active_guild()
            .and_then(|g| g.channel(channel_id))
            .cloned()
        else {
            warn!("Unknown channel {}", channel_id);
            return;
        };
        self.stop_typing();
        self.state
            .update(|s| s.active_channel = Some(channel.id.clone()));
        self.effects.push(Effect::Watch {
            channel_id: channel.id.clone(),
        });
        self.update_title();
        self.system(&format!(
            "Switched to channel '{{bold}}{}{{/bold}}'",
            escape(&channel.name)
        ));
    }

    /// Global mode and tracked users need traffic from every channel, not
    /// only the active one. Tells the transport when that need changes.
    pub fn sync_follow_scope(&mut self) {
        if self.directory.me().is_none() {
            return;
        }
        let state = self.state.get();
        let wanted = state.global_messages || !state.track_list.is_empty();
        if wanted != self.following_all {
            self.following_all = wanted;
            self.effects.push(Effect::FollowAll(wanted));
        }
    }

    fn update_title(&mut self) {
        let title = match (self.active_guild(), self.active_channel()) {
            (Some(guild), Some(channel)) => {
                format!("{BASE_TITLE} @ {} # {}", guild.name, channel.name)
            }
            (Some(guild), None) => format!("{BASE_TITLE} @ {}", guild.name),
            _ => BASE_TITLE.to_string(),
        };
        if title != self.title {
            self.title = title.clone();
            self.effects.push(Effect::SetTitle(title));
        }
    }

    /// Text channels of the active guild, labelled for the sidebar.
    pub fn channel_entries(&self) -> Vec<ChannelEntry> {
        let Some(guild) = self.active_guild() else {
            return Vec::new();
        };
        let active = self.state.get().active_channel.as_deref();
        guild
            .text_channels()
            .map(|c| ChannelEntry {
                id: c.id.clone(),
                label: format!("#{}", channel_label(&c.name)),
                active: active == Some(c.id.as_str()),
            })
            .collect()
    }

    // ========================================================================
    // Input
    // ========================================================================

    pub fn insert_char(&mut self, c: char) {
        self.input.push(c);
        if !self.input.starts_with(self.config.command_prefix.as_str()) {
            self.typing.start(&mut self.state, &mut self.effects);
        }
    }

    pub fn stop_typing(&mut self) {
        self.typing.stop(&mut self.state, &mut self.effects);
    }

    pub fn submit(&mut self) {
        let raw = std::mem::take(&mut self.input);
        let line = tags::substitute(&raw, &self.state.get().tags);
        if line.is_empty() {
            return;
        }
        let prefix = self.config.command_prefix.clone();
        match line.strip_prefix(prefix.as_str()) {
            Some(command) => commands::dispatch(self, command),
            None => self.send_message(&line),
        }
    }

    fn send_message(&mut self, text: &str) {
        let prefix = self.config.command_prefix.clone();
        let state = self.state.get();
        if state.muted {
            self.system(&format!(
                "Message not sent; Muted mode is active. Please use {{bold}}{prefix}mute{{/bold}} to toggle"
            ));
            return;
        }
        let Some(channel_id) = state.active_channel.clone() else {
            self.system("No active text channel");
            return;
        };

        let content = if state.encrypt_outgoing {
            let key = state.decryption_key.clone();
            match cipher::wrap(self.cipher.as_ref(), text, &key) {
                Ok(wrapped) => wrapped,
                Err(e) => {
                    self.system(&format!("Unable to encrypt message: {e}"));
                    return;
                }
            }
        } else {
            text.to_string()
        };

        self.stop_typing();
        self.effects.push(Effect::Send {
            channel_id,
            content,
            plaintext: text.to_string(),
        });
    }

    pub fn complete_input(&mut self) {
        if let Some(completed) = self
            .commands
            .complete(&self.input, &self.config.command_prefix)
        {
            self.input = completed;
        }
    }

    pub fn clear_input(&mut self) {
        let prefix = self.config.command_prefix.as_str();
        if self.input.starts_with(prefix) {
            self.input = prefix.to_string();
        } else {
            self.input.clear();
        }
    }

    pub fn prefill_edit_last(&mut self) {
        if let Some(last) = &self.state.get().last_outgoing_message {
            self.input = format!(
                "{}edit {} {}",
                self.config.command_prefix, last.id, last.content
            );
        }
    }

    pub fn delete_last(&mut self) {
        let Some(last) = self.state.get().last_outgoing_message.clone() else {
            return;
        };
        self.effects.push(Effect::Delete {
            channel_id: last.channel_id,
            message_id: last.id,
        });
        self.state.update(|s| s.last_outgoing_message = None);
    }

    // ========================================================================
    // Runtime events
    // ========================================================================

    pub fn handle_completion(&mut self, completion: Completion) {
        match completion {
            Completion::LoginFailed(reason) => {
                self.system(&format!("Login failed: {}", escape(&reason)));
            }
            Completion::Sent(message) => {
                self.state
                    .update(|s| s.last_outgoing_message = Some(message));
            }
            Completion::SendFailed(reason) => {
                self.system(&format!("Unable to send message: {}", escape(&reason)));
            }
            Completion::EditFailed(reason) => self.system(&format!(
                "That message doesn't exist or it is not editable: {}",
                escape(&reason)
            )),
            Completion::DeleteFailed(reason) => {
                self.system(&format!("Unable to delete message: {}", escape(&reason)));
            }
        }
    }

    pub fn handle_timer(&mut self, handle: TimerHandle) {
        if self
            .typing
            .expire(&mut self.state, &mut self.effects, handle)
        {
            return;
        }
        if !self.header.expire(&mut self.state, handle, &mut self.output) {
            debug!("Ignoring stale timer {:?}", handle);
        }
    }

    pub fn handle_transport(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Ready {
                user,
                token,
                guilds,
                latency_ms,
            } => self.on_ready(user, token, guilds, latency_ms),
            TransportEvent::Message(message) | TransportEvent::MessageUpdate(message) => {
                self.handle_message(message)
            }
            TransportEvent::GuildCreate(guild) => {
                self.system(&format!(
                    "Joined guild '{{bold}}{}{{/bold}}' ({} members)",
                    escape(&guild.name),
                    guild.member_count
                ));
                self.directory.upsert_guild(guild);
            }
            TransportEvent::GuildDelete(guild) => {
                self.directory.remove_guild(&guild.id);
                self.system(&format!(
                    "Left guild '{{bold}}{}{{/bold}}' ({} members)",
                    escape(&guild.name),
                    guild.member_count
                ));
                if self.state.get().active_guild.as_deref() == Some(guild.id.as_str()) {
                    self.stop_typing();
                    self.state.update(|s| {
                        s.active_guild = None;
                        s.active_channel = None;
                    });
                    self.update_title();
                }
            }
            TransportEvent::Error(message) => {
                self.system(&format!(
                    "An error occurred within the client: {}",
                    escape(&message)
                ));
            }
        }
    }

    fn on_ready(&mut self, user: User, token: String, guilds: Vec<Guild>, latency_ms: u64) {
        info!("Connected as {} ({} guilds)", user.tag, guilds.len());
        self.hide_header();
        // Fresh transport session: scope starts narrow
        self.following_all = false;
        self.state.update(|s| s.token = Some(token));
        self.system(&format!(
            "Successfully connected as {{bold}}{}{{/bold}}",
            escape(&user.tag)
        ));
        self.directory.on_ready(user, guilds, latency_ms);

        if let Some(first) = self.directory.guilds().first().map(|g| g.id.clone()) {
            self.set_active_guild(&first);
        }
        self.channels_visible = true;
        self.save_state();
    }

    fn handle_message(&mut self, message: InboundMessage) {
        let from_me = self.directory.is_me(&message.author.id);
        self.directory.remember(message.author.clone());
        if let MessageOrigin::Direct { recipient, .. } = &message.origin {
            self.directory.remember(recipient.clone());
        }

        let key = self.state.get().decryption_key.clone();
        let content = cipher::unwrap_or_original(self.cipher.as_ref(), &message.content, &key);

        if from_me {
            let outgoing = OutgoingMessage {
                id: message.id.clone(),
                channel_id: message.origin.channel_id().to_string(),
                content: content.clone(),
            };
            self.state
                .update(|s| s.last_outgoing_message = Some(outgoing));
        }

        let route = route_message(self.state.get(), &message, from_me);
        let author = escape(&message.author.tag);
        let body = escape(&content);
        let mut renderer = self.renderer();
        match route {
            Route::Drop => {}
            Route::Own => {
                renderer.self_message(&author, &body);
            }
            Route::OwnDirect(recipient) => {
                renderer.special_message(
                    "{green-fg}=>{/green-fg} DM",
                    &escape(&recipient.tag),
                    &body,
                    Some("blue"),
                );
            }
            Route::Channel(modifiers) => {
                renderer.user_message(&author, &body, &modifiers);
            }
            Route::Special { prefix, color } => {
                renderer.special_message(prefix, &author, &body, color);
            }
        }
    }
}

/// Routing precedence: ignored, tracked, bot filter, empty filter, then
/// own / active channel / direct / global.
fn route_message(state: &SessionState, message: &InboundMessage, from_me: bool) -> Route {
    let author = &message.author;
    if state.ignored_users.contains(&author.id) {
        return Route::Drop;
    }
    if state.track_list.contains(&author.id) {
        return Route::Special {
            prefix: "Track",
            color: None,
        };
    }
    if state.ignore_bots && author.bot && !from_me {
        return Route::Drop;
    }
    if state.ignore_empty_messages && message.content.is_empty() {
        return Route::Drop;
    }

    match &message.origin {
        MessageOrigin::Guild { .. } if from_me => Route::Own,
        MessageOrigin::Direct { recipient, .. } if from_me => Route::OwnDirect(recipient.clone()),
        MessageOrigin::Guild { channel_id, .. }
            if state.active_guild.is_some()
                && state.active_channel.as_deref() == Some(channel_id.as_str()) =>
        {
            Route::Channel(role_glyphs(message))
        }
        MessageOrigin::Direct { .. } => Route::Special {
            prefix: "{green-fg}<={/green-fg} DM",
            color: Some("blue"),
        },
        MessageOrigin::Guild { .. } if state.global_messages => Route::Special {
            prefix: "Global",
            color: None,
        },
        MessageOrigin::Guild { .. } => Route::Drop,
    }
}

/// `+` manage messages, `&` bot, `$` manage guild; later glyphs render leftmost.
/// Authors without resolved member roles get none.
fn role_glyphs(message: &InboundMessage) -> Vec<String> {
    let Some(roles) = message.roles else {
        return Vec::new();
    };
    let mut glyphs = Vec::new();
    if roles.manage_messages {
        glyphs.push("{red-fg}+{/red-fg}".to_string());
    }
    if message.author.bot {
        glyphs.push("{blue-fg}&{/blue-fg}".to_string());
    }
    if roles.manage_guild {
        glyphs.push("{green-fg}${/green-fg}".to_string());
    }
    glyphs
}

/// Runs of characters outside `[a-z0-9-_]` become one `?`; long names are cut.
pub fn channel_label(name: &str) -> String {
    let mut label = String::with_capacity(name.len());
    let mut in_run = false;
    for c in name.chars() {
        if c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_' {
            label.push(c);
            in_run = false;
        } else if !in_run {
            label.push('?');
            in_run = true;
        }
    }
    if label.chars().count() > MAX_CHANNEL_LABEL {
        label = label.chars().take(TRUNCATED_CHANNEL_LABEL).collect();
        label.push_str(" ...");
    }
    label
}

fn log_state_change(new: &SessionState, old: &SessionState) {
    let flags = [
        ("muted", old.muted, new.muted),
        ("globalMessages", old.global_messages, new.global_messages),
        ("ignoreBots", old.ignore_bots, new.ignore_bots),
        ("encryptOutgoing", old.encrypt_outgoing, new.encrypt_outgoing),
    ];
    for (name, before, after) in flags {
        if before != after {
            debug!("State: {} {} -> {}", name, before, after);
        }
    }
    if old.active_guild != new.active_guild || old.active_channel != new.active_channel {
        debug!(
            "State: active {:?}/{:?} -> {:?}/{:?}",
            old.active_guild, old.active_channel, new.active_guild, new.active_channel
        );
    }
    if old.theme != new.theme {
        debug!("State: theme {} -> {}", old.theme, new.theme);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::action::{Action, update};
    use crate::core::cipher::wrap;
    use crate::core::state::StateStore;
    use crate::test_support::{connected_app, guild, inbound, test_app, user};
    use crate::transport::MemberRoles;

    fn in_channel(channel: &str) -> MessageOrigin {
        MessageOrigin::Guild {
            guild_id: "g1".into(),
            channel_id: channel.into(),
        }
    }

    fn deliver(app: &mut App, message: InboundMessage) {
        update(app, Action::Transport(TransportEvent::Message(message)));
    }

    fn last_line(app: &App) -> String {
        app.output.last().unwrap().text()
    }

    #[test]
    fn test_start_without_token_prompts() {
        let mut app = test_app();
        app.start(None);
        assert_eq!(app.input, "/login ");
        assert!(app.header.is_visible());
        assert!(last_line(&app).starts_with("<System> Welcome!"));
        assert!(app.effects.drain().is_empty());
    }

    #[test]
    fn test_start_env_token_wins_over_saved() {
        let mut app = test_app();
        app.state.update(|s| s.token = Some("saved".into()));
        app.start(Some("from-env".into()));
        assert_eq!(
            app.effects.drain(),
            vec![Effect::Connect {
                token: "from-env".into()
            }]
        );
    }

    #[test]
    fn test_start_uses_saved_token() {
        let mut app = test_app();
        app.state.update(|s| s.token = Some("saved".into()));
        app.start(None);
        assert!(last_line(&app).contains("Attempting to login using saved token"));
        assert_eq!(
            app.effects.drain(),
            vec![Effect::Connect {
                token: "saved".into()
            }]
        );
    }

    #[test]
    fn test_ready_selects_general_and_shows_channels() {
        let app = connected_app();
        assert_eq!(app.state.get().active_guild.as_deref(), Some("g1"));
        assert_eq!(app.state.get().active_channel.as_deref(), Some("c-general"));
        assert_eq!(app.state.get().token.as_deref(), Some("tok"));
        assert!(app.channels_visible);
        assert!(!app.header.is_visible());
        assert_eq!(app.title, "Discord Terminal @ Home # general");
    }

    #[test]
    fn test_ready_emits_watch_and_title() {
        let mut app = test_app();
        let effects = update(
            &mut app,
            Action::Transport(TransportEvent::Ready {
                user: user("u-me", "me#0001", false),
                token: "tok".into(),
                guilds: vec![guild("g1", "Home", &["general"])],
                latency_ms: 1,
            }),
        );
        assert!(effects.contains(&Effect::Watch {
            channel_id: "c-general".into()
        }));
        assert!(effects.contains(&Effect::SetTitle(
            "Discord Terminal @ Home # general".into()
        )));
    }

    #[test]
    fn test_guild_without_text_channels_warns() {
        let mut app = connected_app();
        let mut voice_only = guild("g2", "Voice", &[]);
        voice_only.channels.push(Channel {
            id: "v1".into(),
            name: "lounge".into(),
            kind: crate::transport::ChannelKind::Voice,
        });
        app.directory.upsert_guild(voice_only);
        app.set_active_guild("g2");
        assert_eq!(
            last_line(&app),
            "<System> Warning: Guild 'Voice' doesn't have any text channels"
        );
        assert!(app.state.get().active_channel.is_none());
        assert_eq!(app.title, "Discord Terminal @ Voice");
    }

    #[test]
    fn test_ignored_sender_dropped() {
        let mut app = connected_app();
        app.state.update(|s| s.ignore("u2"));
        let before = app.output.len();
        deliver(&mut app, inbound("m1", in_channel("c-general"), user("u2", "bob", false), "hi"));
        assert_eq!(app.output.len(), before);
    }

    #[test]
    fn test_tracked_sender_shown_anywhere() {
        let mut app = connected_app();
        app.state.update(|s| s.track("u2"));
        deliver(&mut app, inbound("m1", in_channel("c-elsewhere"), user("u2", "bob", false), "yo"));
        assert_eq!(last_line(&app), "<Track ~> @bob> yo");
    }

    #[test]
    fn test_bot_filter_and_empty_filter() {
        let mut app = connected_app();
        app.state.update(|s| s.ignore_bots = true);
        let before = app.output.len();
        deliver(&mut app, inbound("m1", in_channel("c-general"), user("b1", "robot", true), "beep"));
        deliver(&mut app, inbound("m2", in_channel("c-general"), user("u2", "bob", false), ""));
        assert_eq!(app.output.len(), before);
    }

    #[test]
    fn test_role_glyphs_last_is_leftmost() {
        let mut app = connected_app();
        let mut message = inbound("m1", in_channel("c-general"), user("b1", "robot", true), "beep");
        message.roles = Some(MemberRoles {
            manage_messages: true,
            manage_guild: true,
        });
        deliver(&mut app, message);
        assert_eq!(last_line(&app), "<$&+@robot> beep");
    }

    #[test]
    fn test_no_glyphs_without_member_roles() {
        let mut app = connected_app();
        deliver(&mut app, inbound("m1", in_channel("c-general"), user("b1", "robot", true), "beep"));
        assert_eq!(last_line(&app), "<@robot> beep");

        let mut message = inbound("m2", in_channel("c-general"), user("b1", "robot", true), "boop");
        message.roles = Some(MemberRoles::default());
        deliver(&mut app, message);
        assert_eq!(last_line(&app), "<&@robot> boop");
    }

    #[test]
    fn test_direct_messages_both_ways() {
        let mut app = connected_app();
        let me = app.directory.me().cloned().unwrap();
        let bob = user("u2", "bob", false);
        deliver(
            &mut app,
            inbound(
                "m1",
                MessageOrigin::Direct {
                    channel_id: "dm1".into(),
                    recipient: me.clone(),
                },
                bob.clone(),
                "psst",
            ),
        );
        assert_eq!(last_line(&app), "<<= DM ~> @bob> psst");

        deliver(
            &mut app,
            inbound(
                "m2",
                MessageOrigin::Direct {
                    channel_id: "dm1".into(),
                    recipient: bob,
                },
                me,
                "hey",
            ),
        );
        assert_eq!(last_line(&app), "<=> DM ~> @bob> hey");
    }

    #[test]
    fn test_other_channel_needs_global_mode() {
        let mut app = connected_app();
        let before = app.output.len();
        let elsewhere = || inbound("m1", in_channel("c-random"), user("u2", "bob", false), "hi");
        deliver(&mut app, elsewhere());
        assert_eq!(app.output.len(), before);
        app.state.update(|s| s.global_messages = true);
        deliver(&mut app, elsewhere());
        assert_eq!(last_line(&app), "<Global ~> @bob> hi");
    }

    #[test]
    fn test_remote_markup_is_escaped() {
        let mut app = connected_app();
        deliver(
            &mut app,
            inbound("m1", in_channel("c-general"), user("u2", "bob", false), "{bold}x{/bold}"),
        );
        assert_eq!(last_line(&app), "<@bob> {bold}x{/bold}");
    }

    #[test]
    fn test_wrapped_message_decrypted_with_key() {
        let mut app = connected_app();
        let key = app.state.get().decryption_key.clone();
        let wrapped = wrap(&ChaChaCipher, "hidden", &key).unwrap();
        deliver(&mut app, inbound("m1", in_channel("c-general"), user("u2", "bob", false), &wrapped));
        assert_eq!(last_line(&app), "<@bob> hidden");

        let foreign = wrap(&ChaChaCipher, "hidden", "other-key").unwrap();
        deliver(&mut app, inbound("m2", in_channel("c-general"), user("u2", "bob", false), &foreign));
        assert_eq!(last_line(&app), format!("<@bob> {foreign}"));
    }

    #[test]
    fn test_encrypt_outgoing_wraps_send() {
        let mut app = connected_app();
        app.state.update(|s| s.encrypt_outgoing = true);
        app.input = "secret plan".into();
        app.submit();
        let (sent, plaintext) = app
            .effects
            .drain()
            .into_iter()
            .find_map(|e| match e {
                Effect::Send {
                    content, plaintext, ..
                } => Some((content, plaintext)),
                _ => None,
            })
            .unwrap();
        assert!(sent.starts_with("$dt_"));
        assert_eq!(plaintext, "secret plan");
        let key = app.state.get().decryption_key.clone();
        assert_eq!(cipher::unwrap_or_original(&ChaChaCipher, &sent, &key), "secret plan");
    }

    #[test]
    fn test_edit_of_encrypted_message_starts_from_plaintext() {
        let mut app = connected_app();
        app.state.update(|s| s.encrypt_outgoing = true);
        app.input = "secret plan".into();
        app.submit();
        let plaintext = app
            .effects
            .drain()
            .into_iter()
            .find_map(|e| match e {
                Effect::Send { plaintext, .. } => Some(plaintext),
                _ => None,
            })
            .unwrap();
        update(
            &mut app,
            Action::Completed(Completion::Sent(OutgoingMessage {
                id: "m3".into(),
                channel_id: "c-general".into(),
                content: plaintext,
            })),
        );
        update(&mut app, Action::EditLast);
        assert_eq!(app.input, "/edit m3 secret plan");
    }

    #[test]
    fn test_tag_substitution_on_submit() {
        let mut app = connected_app();
        app.state.update(|s| {
            s.tags.insert("name".into(), "world".into());
        });
        app.effects.drain();
        app.input = "hello $name".into();
        app.submit();
        assert!(app.effects.drain().contains(&Effect::Send {
            channel_id: "c-general".into(),
            content: "hello world".into(),
            plaintext: "hello world".into(),
        }));

        app.input = "hello $nobody".into();
        app.submit();
        assert!(app.effects.drain().contains(&Effect::Send {
            channel_id: "c-general".into(),
            content: "hello nobody".into(),
            plaintext: "hello nobody".into(),
        }));
    }

    #[test]
    fn test_send_without_channel_reports() {
        let mut app = test_app();
        app.input = "hello".into();
        app.submit();
        assert_eq!(last_line(&app), "<System> No active text channel");
        assert!(app.effects.drain().is_empty());
    }

    #[test]
    fn test_guild_events_reported() {
        let mut app = connected_app();
        update(
            &mut app,
            Action::Transport(TransportEvent::GuildCreate(guild("g2", "Club", &["lobby"]))),
        );
        assert_eq!(last_line(&app), "<System> Joined guild 'Club' (3 members)");
        assert!(app.directory.guild("g2").is_some());

        update(
            &mut app,
            Action::Transport(TransportEvent::GuildDelete(guild("g1", "Home", &[]))),
        );
        assert!(app.state.get().active_guild.is_none());
        assert_eq!(app.title, BASE_TITLE);
    }

    #[test]
    fn test_transport_error_line() {
        let mut app = test_app();
        update(&mut app, Action::Transport(TransportEvent::Error("gateway hiccup".into())));
        assert_eq!(
            last_line(&app),
            "<System> An error occurred within the client: gateway hiccup"
        );
    }

    #[test]
    fn test_channel_entries_mark_active() {
        let app = connected_app();
        let entries = app.channel_entries();
        let labels: Vec<_> = entries.iter().map(|e| e.label.as_str()).collect();
        assert_eq!(labels, vec!["#general", "#random"]);
        assert!(entries[0].active);
        assert!(!entries[1].active);
    }

    #[test]
    fn test_channel_label_sanitising() {
        assert_eq!(channel_label("general"), "general");
        assert_eq!(channel_label("🎉party🎉time"), "?party?time");
        assert_eq!(channel_label("Off Topic"), "?ff?opic");
        let long = "a".repeat(30);
        assert_eq!(channel_label(&long), format!("{} ...", "a".repeat(21)));
    }

    #[test]
    fn test_sync_loads_saved_theme() {
        let dir = tempfile::tempdir().unwrap();
        let themes = dir.path().join("themes");
        std::fs::create_dir_all(&themes).unwrap();
        let mut ocean = ThemeData::builtin();
        ocean.header.background_color = "cyan".into();
        std::fs::write(
            themes.join("ocean.json"),
            serde_json::to_string(&ocean).unwrap(),
        )
        .unwrap();
        std::fs::write(dir.path().join("state.json"), r#"{"theme": "ocean"}"#).unwrap();

        let mut app = test_app();
        app.state = StateStore::new(dir.path().join("state.json"));
        app.themes = ThemeStore::new(themes);
        assert!(app.sync_state());
        assert_eq!(app.state.get().theme, "ocean");
        assert_eq!(app.state.get().theme_data.header.background_color, "cyan");
    }

    #[test]
    fn test_sync_with_missing_theme_keeps_previous() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("state.json"), r#"{"theme": "gone"}"#).unwrap();
        let mut app = test_app();
        app.state = StateStore::new(dir.path().join("state.json"));
        assert!(app.sync_state());
        assert_eq!(app.state.get().theme, "default");
        assert!(last_line(&app).contains("not found"));
    }

    #[test]
    fn test_sync_parse_error_reported() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("state.json"), "garbage").unwrap();
        let mut app = test_app();
        app.state = StateStore::new(dir.path().join("state.json"));
        assert!(!app.sync_state());
        assert!(last_line(&app).contains("error while reading the state file"));
    }
}
