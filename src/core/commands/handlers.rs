//! Built-in command handlers.

use rand::seq::SliceRandom;

use super::{Arity, CommandEntry, CommandError, CommandRegistry, Handler};
use crate::core::action::Effect;
use crate::core::app::App;
use crate::core::markup::escape;
use crate::core::tags::TagTable;
use crate::core::theme::{DEFAULT_THEME, ThemeError};

type CommandResult = Result<(), CommandError>;

pub const TIPS: &[&str] = &[
    "You can use the {bold}{prefix}sync{/bold} command to discard unsaved changes and reload saved state",
    "You can use the {bold}{prefix}format{/bold} command to change the message format style",
    "Toggle full-screen chat using the {bold}{prefix}fullscreen{/bold} command",
    "Command autocomplete is supported, type {bold}{prefix}he{/bold} then press tab to try it!",
    "Press {bold}ESC{/bold} anytime to clear the current input",
    "Press {bold}UP{/bold} to edit your last message",
    "Exiting with {bold}CTRL + C{/bold} is recommended since it will automatically save state",
    "Press {bold}CTRL + X{/bold} to force exit without saving state",
];

pub fn register_all(registry: &mut CommandRegistry) {
    let entries: [(&'static str, &'static str, &'static str, Arity, Handler); 28] = [
        ("login", "<token>", "Log in with a token", Arity::exactly(1), login),
        ("logout", "", "Disconnect, save and exit", Arity::NONE, logout),
        ("now", "", "Show the active guild and channel", Arity::NONE, now),
        ("mute", "", "Toggle muted mode", Arity::NONE, mute),
        ("ignore", "[user]", "List or toggle ignored users", Arity::between(0, 1), ignore),
        ("edit", "<message> <text>", "Edit one of your messages", Arity::at_least(2), edit),
        ("save", "", "Save state to disk", Arity::NONE, save),
        ("format", "<template>", "Set the message format", Arity::at_least(1), format),
        ("forget", "", "Forget the saved token", Arity::NONE, forget),
        ("encrypt", "<password>", "Set the encryption password", Arity::exactly(1), encrypt),
        ("doencrypt", "", "Toggle encrypting outgoing messages", Arity::NONE, doencrypt),
        ("theme", "[name]", "Show or switch the theme", Arity::between(0, 1), theme),
        ("themes", "", "List available themes", Arity::NONE, themes),
        ("tag", "[name] [value]", "List, set or delete tags", Arity::between(0, 2), tag),
        ("tip", "", "Show a random tip", Arity::NONE, tip),
        ("dm", "<user> <text>", "Send a direct message", Arity::at_least(2), dm),
        ("fullscreen", "", "Toggle the channel list", Arity::NONE, fullscreen),
        ("me", "", "Show who you are logged in as", Arity::NONE, me),
        ("sync", "", "Reload saved state", Arity::NONE, sync),
        ("pin", "[word]", "List or toggle word pins", Arity::between(0, 1), pin),
        ("track", "[user]", "List or toggle tracked users", Arity::between(0, 1), track),
        ("help", "", "List commands", Arity::NONE, help),
        ("global", "", "Toggle messages from other channels", Arity::NONE, global),
        ("bots", "", "Toggle bot messages", Arity::NONE, bots),
        ("clear", "", "Clear the message pane", Arity::NONE, clear),
        ("c", "<channel>", "Switch channel", Arity::exactly(1), switch_channel),
        ("g", "<guild>", "Switch guild", Arity::exactly(1), switch_guild),
        ("reset", "", "Redraw the screen", Arity::NONE, reset),
    ];

    for (name, args, help, arity, handler) in entries {
        registry.register(CommandEntry {
            name,
            args,
            help,
            arity,
            handler,
        });
    }
}

fn login(app: &mut App, args: &[String]) -> CommandResult {
    app.login(&args[0]);
    Ok(())
}

fn logout(app: &mut App, _args: &[String]) -> CommandResult {
    app.shutdown(0);
    Ok(())
}

fn now(app: &mut App, _args: &[String]) -> CommandResult {
    let Some(guild) = app.active_guild() else {
        app.system("No active guild");
        return Ok(());
    };
    let guild_name = escape(&guild.name);
    let line = match app.active_channel() {
        Some(channel) => format!(
            "Currently on guild '{{bold}}{guild_name}{{/bold}}' # '{{bold}}{}{{/bold}}'",
            escape(&channel.name)
        ),
        None => format!("Currently on guild '{{bold}}{guild_name}{{/bold}}'"),
    };
    app.system(&line);
    Ok(())
}

fn mute(app: &mut App, _args: &[String]) -> CommandResult {
    app.state.update(|s| s.muted = !s.muted);
    if app.state.get().muted {
        app.stop_typing();
        app.system("Muted mode activated");
    } else {
        app.system("Muted mode is no longer activated");
    }
    Ok(())
}

/// `@{bold}id{/bold}, …` for a set of user ids.
fn user_list<'a>(ids: impl Iterator<Item = &'a String>) -> String {
    ids.map(|id| format!("@{{bold}}{}{{/bold}}", escape(id)))
        .collect::<Vec<_>>()
        .join(", ")
}

fn ignore(app: &mut App, args: &[String]) -> CommandResult {
    let Some(id) = args.first() else {
        let ignored = &app.state.get().ignored_users;
        if ignored.is_empty() {
            app.system("Not ignoring anyone");
        } else {
            let list = user_list(ignored.iter());
            app.system(&format!("Currently ignoring messages from: {list}"));
        }
        return Ok(());
    };

    if app.directory.is_me(id) {
        return Err(CommandError::Failed("You can't ignore yourself, silly".into()));
    }

    let shown = escape(id);
    if app.state.get().ignored_users.contains(id) {
        app.state.update(|s| {
            s.ignored_users.remove(id);
        });
        app.system(&format!("Removed user @{{bold}}{shown}{{/bold}} from the ignore list"));
        return Ok(());
    }

    let was_tracked = app.state.get().track_list.contains(id);
    app.state.update(|s| s.ignore(id));
    if was_tracked {
        app.system(&format!("No longer tracking @{{bold}}{shown}{{/bold}}"));
    }
    app.system(&format!("Added user @{{bold}}{shown}{{/bold}} to the ignore list"));
    Ok(())
}

fn edit(app: &mut App, args: &[String]) -> CommandResult {
    let channel_id = app
        .state
        .get()
        .active_channel
        .clone()
        .ok_or_else(|| CommandError::Failed("No active text channel".into()))?;
    app.effects.push(Effect::Edit {
        channel_id,
        message_id: args[0].clone(),
        content: args[1..].join(" "),
    });
    Ok(())
}

fn save(app: &mut App, _args: &[String]) -> CommandResult {
    app.save_state();
    Ok(())
}

fn format(app: &mut App, args: &[String]) -> CommandResult {
    let template = args.join(" ");
    app.state.update(|s| s.message_format = template.clone());
    app.system(&format!(
        "Successfully changed format to '{}'",
        escape(&template)
    ));
    Ok(())
}

fn forget(app: &mut App, _args: &[String]) -> CommandResult {
    if app.state.get().token.is_none() {
        app.system("No saved token to forget");
        return Ok(());
    }
    app.state.update(|s| s.token = None);
    app.save_state();
    Ok(())
}

fn encrypt(app: &mut App, args: &[String]) -> CommandResult {
    let key = args[0].clone();
    app.state.update(|s| s.decryption_key = key.clone());
    app.system(&format!("Using decryption key '{{bold}}{}{{/bold}}'", escape(&key)));
    Ok(())
}

fn doencrypt(app: &mut App, _args: &[String]) -> CommandResult {
    app.state.update(|s| s.encrypt_outgoing = !s.encrypt_outgoing);
    if app.state.get().encrypt_outgoing {
        app.system("Now encrypting messages");
    } else {
        app.system("No longer encrypting messages");
    }
    Ok(())
}

fn theme(app: &mut App, args: &[String]) -> CommandResult {
    match args.first() {
        Some(name) => app.load_theme(name),
        None => {
            let current = escape(&app.state.get().theme);
            app.system(&format!("The current theme is '{{bold}}{current}{{/bold}}'"));
            Ok(())
        }
    }
}

fn themes(app: &mut App, _args: &[String]) -> CommandResult {
    let names = match app.themes.list() {
        Ok(names) => names,
        Err(ThemeError::MissingCatalog(_)) => {
            return Err(CommandError::Failed("Themes directory does not exist".into()));
        }
        Err(e) => return Err(CommandError::Failed(format!("Unable to list themes: {e}"))),
    };
    let list = std::iter::once(DEFAULT_THEME.to_string())
        .chain(names.into_iter().filter(|n| n != DEFAULT_THEME))
        .map(|n| format!("{{bold}}{}{{/bold}}", escape(&n)))
        .collect::<Vec<_>>()
        .join(", ");
    app.system(&format!("Available themes: {list}"));
    Ok(())
}

fn tag(app: &mut App, args: &[String]) -> CommandResult {
    match args {
        [] => {
            let names = TagTable::new(&mut app.state).names();
            if names.is_empty() {
                app.system("No tags have been set");
            } else {
                let list = names
                    .iter()
                    .map(|n| format!("{{bold}}{}{{/bold}}", escape(n)))
                    .collect::<Vec<_>>()
                    .join(", ");
                app.system(&format!("Tags: {list}"));
            }
            Ok(())
        }
        [name, value] => {
            TagTable::new(&mut app.state).set(name, value);
            app.system(&format!("Successfully saved tag '{{bold}}{}{{/bold}}'", escape(name)));
            Ok(())
        }
        [name] => {
            if TagTable::new(&mut app.state).delete(name) {
                app.system(&format!(
                    "Successfully deleted tag '{{bold}}{}{{/bold}}'",
                    escape(name)
                ));
                Ok(())
            } else {
                Err(CommandError::Failed("Such tag does not exist".into()))
            }
        }
        _ => Err(CommandError::Usage("tag [name] [value]".into())),
    }
}

fn tip(app: &mut App, _args: &[String]) -> CommandResult {
    let Some(tip) = TIPS.choose(&mut rand::thread_rng()) else {
        return Ok(());
    };
    let text = tip.replace("{prefix}", &app.config.command_prefix);
    app.show_header(&text, true)
        .map_err(|e| CommandError::Failed(e.to_string()))
}

fn dm(app: &mut App, args: &[String]) -> CommandResult {
    let user_id = &args[0];
    if !app.directory.has_user(user_id) {
        return Err(CommandError::Failed(
            "Such user does not exist or has not been cached".into(),
        ));
    }
    app.effects.push(Effect::SendDirect {
        user_id: user_id.clone(),
        content: args[1..].join(" "),
    });
    Ok(())
}

fn fullscreen(app: &mut App, _args: &[String]) -> CommandResult {
    app.toggle_channels();
    Ok(())
}

fn me(app: &mut App, _args: &[String]) -> CommandResult {
    match app.directory.me() {
        Some(user) => {
            let line = format!(
                "Logged in as {{bold}}{}{{/bold}} | {{bold}}{}{{/bold}}ms",
                escape(&user.tag),
                app.directory.latency_ms()
            );
            app.system(&line);
        }
        None => app.system("Not logged in"),
    }
    Ok(())
}

fn sync(app: &mut App, _args: &[String]) -> CommandResult {
    app.sync_state();
    Ok(())
}

fn pin(app: &mut App, args: &[String]) -> CommandResult {
    let Some(word) = args.first() else {
        let pins = &app.state.get().word_pins;
        if pins.is_empty() {
            app.system("No set word pins");
        } else {
            let list = pins
                .iter()
                .map(|p| format!("{{bold}}{}{{/bold}}", escape(p)))
                .collect::<Vec<_>>()
                .join(", ");
            app.system(&format!("Word pins: {list}"));
        }
        return Ok(());
    };

    let shown = escape(word);
    if app.state.get().word_pins.contains(word) {
        app.state.update(|s| s.word_pins.retain(|p| p != word));
        app.system(&format!("Removed word '{{bold}}{shown}{{/bold}}' from pins"));
    } else {
        app.state.update(|s| s.word_pins.push(word.clone()));
        app.system(&format!("Added word '{{bold}}{shown}{{/bold}}' to pins"));
    }
    Ok(())
}

fn track(app: &mut App, args: &[String]) -> CommandResult {
    let Some(id) = args.first() else {
        let tracked = &app.state.get().track_list;
        if tracked.is_empty() {
            app.system("Not tracking anyone");
        } else {
            let list = user_list(tracked.iter());
            app.system(&format!("Tracking users: {list}"));
        }
        return Ok(());
    };

    if app.directory.is_me(id) {
        return Err(CommandError::Failed("You can't track yourself, silly".into()));
    }

    let shown = escape(id);
    if app.state.get().track_list.contains(id) {
        app.state.update(|s| {
            s.track_list.remove(id);
        });
        app.system(&format!("No longer tracking @{{bold}}{shown}{{/bold}}"));
        return Ok(());
    }
    if !app.directory.has_user(id) {
        return Err(CommandError::Failed("No such user cached".into()));
    }
    if app.state.get().ignored_users.contains(id) {
        return Err(CommandError::Failed(
            "You must first stop ignoring that user".into(),
        ));
    }
    app.state.update(|s| s.track(id));
    app.system(&format!("Now tracking @{{bold}}{shown}{{/bold}}"));
    Ok(())
}

fn help(app: &mut App, _args: &[String]) -> CommandResult {
    let prefix = app.config.command_prefix.clone();
    let lines: Vec<String> = app
        .commands
        .entries()
        .iter()
        .map(|e| format!("  {{bold}}{prefix}{}{{/bold}}  {}", escape(&e.usage()), e.help))
        .collect();
    app.system("Commands available:");
    for line in lines {
        app.system(&line);
    }
    Ok(())
}

fn global(app: &mut App, _args: &[String]) -> CommandResult {
    app.state.update(|s| s.global_messages = !s.global_messages);
    if app.state.get().global_messages {
        app.system("Displaying global messages");
    } else {
        app.system("No longer displaying global messages");
    }
    Ok(())
}

fn bots(app: &mut App, _args: &[String]) -> CommandResult {
    app.state.update(|s| s.ignore_bots = !s.ignore_bots);
    if app.state.get().ignore_bots {
        app.system("No longer displaying bot messages");
    } else {
        app.system("Displaying bot messages");
    }
    Ok(())
}

fn clear(app: &mut App, _args: &[String]) -> CommandResult {
    app.output.clear();
    Ok(())
}

fn switch_channel(app: &mut App, args: &[String]) -> CommandResult {
    let Some(guild) = app.active_guild() else {
        return Err(CommandError::Failed("No active guild".into()));
    };
    let wanted = args[0].as_str();
    let found = guild
        .text_channels()
        .find(|c| c.id == wanted || c.name == wanted || format!("#{}", c.name) == wanted)
        .map(|c| c.id.clone());
    match found {
        Some(channel_id) => {
            app.set_active_channel(&channel_id);
            Ok(())
        }
        None => Err(CommandError::Failed(format!(
            "Such channel does not exist in guild '{}'",
            escape(&guild.name)
        ))),
    }
}

fn switch_guild(app: &mut App, args: &[String]) -> CommandResult {
    let guild_id = app
        .directory
        .find_guild(&args[0])
        .map(|g| g.id.clone())
        .ok_or_else(|| CommandError::Failed("Such guild does not exist".into()))?;
    app.set_active_guild(&guild_id);
    Ok(())
}

fn reset(app: &mut App, _args: &[String]) -> CommandResult {
    app.output.request_redraw(true);
    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::core::action::Effect;
    use crate::core::commands::dispatch;
    use crate::core::theme::ThemeData;
    use crate::test_support::{connected_app, test_app, user};

    fn last_line(app: &crate::core::app::App) -> String {
        app.output.last().unwrap().text()
    }

    #[test]
    fn test_mute_toggles() {
        let mut app = test_app();
        dispatch(&mut app, "mute");
        assert!(app.state.get().muted);
        assert_eq!(last_line(&app), "<System> Muted mode activated");
        dispatch(&mut app, "mute");
        assert!(!app.state.get().muted);
    }

    #[test]
    fn test_theme_not_found_keeps_current_styles() {
        let mut app = test_app();
        let before: ThemeData = app.state.get().theme_data.clone();
        dispatch(&mut app, "theme doesnotexist");
        assert_eq!(app.state.get().theme_data, before);
        assert_eq!(app.state.get().theme, "default");
        assert!(last_line(&app).contains("not found"), "got: {}", last_line(&app));
    }

    #[test]
    fn test_theme_without_args_reports_current() {
        let mut app = test_app();
        dispatch(&mut app, "theme");
        assert_eq!(last_line(&app), "<System> The current theme is 'default'");
    }

    #[test]
    fn test_tag_set_list_delete() {
        let mut app = test_app();
        dispatch(&mut app, "tag");
        assert_eq!(last_line(&app), "<System> No tags have been set");
        dispatch(&mut app, "tag name world");
        assert_eq!(app.state.get().tags.get("name").map(String::as_str), Some("world"));
        dispatch(&mut app, "tag");
        assert_eq!(last_line(&app), "<System> Tags: name");
        dispatch(&mut app, "tag name");
        assert!(app.state.get().tags.is_empty());
        dispatch(&mut app, "tag name");
        assert_eq!(last_line(&app), "<System> Such tag does not exist");
    }

    #[test]
    fn test_pin_toggles() {
        let mut app = test_app();
        dispatch(&mut app, "pin foo");
        assert_eq!(app.state.get().word_pins, vec!["foo"]);
        dispatch(&mut app, "pin foo");
        assert!(app.state.get().word_pins.is_empty());
        dispatch(&mut app, "pin");
        assert_eq!(last_line(&app), "<System> No set word pins");
    }

    #[test]
    fn test_ignore_drops_tracking() {
        let mut app = connected_app();
        app.directory.remember(user("u2", "bob", false));
        dispatch(&mut app, "track u2");
        assert!(app.state.get().track_list.contains("u2"));
        dispatch(&mut app, "ignore u2");
        assert!(!app.state.get().track_list.contains("u2"));
        assert!(app.state.get().ignored_users.contains("u2"));

        dispatch(&mut app, "track u2");
        assert_eq!(last_line(&app), "<System> You must first stop ignoring that user");
        dispatch(&mut app, "ignore u2");
        assert!(app.state.get().ignored_users.is_empty());
    }

    #[test]
    fn test_cannot_track_or_ignore_self() {
        let mut app = connected_app();
        let me = app.directory.me().unwrap().id.clone();
        dispatch(&mut app, &format!("ignore {me}"));
        assert_eq!(last_line(&app), "<System> You can't ignore yourself, silly");
        dispatch(&mut app, &format!("track {me}"));
        assert_eq!(last_line(&app), "<System> You can't track yourself, silly");
    }

    #[test]
    fn test_track_unknown_user() {
        let mut app = connected_app();
        dispatch(&mut app, "track nobody");
        assert_eq!(last_line(&app), "<System> No such user cached");
    }

    #[test]
    fn test_edit_requires_channel() {
        let mut app = test_app();
        dispatch(&mut app, "edit m1 new text");
        assert_eq!(last_line(&app), "<System> No active text channel");

        let mut app = connected_app();
        dispatch(&mut app, "edit m1 new text");
        assert!(app.effects.drain().contains(&Effect::Edit {
            channel_id: "c-general".into(),
            message_id: "m1".into(),
            content: "new text".into(),
        }));
    }

    #[test]
    fn test_dm_requires_cached_user() {
        let mut app = connected_app();
        dispatch(&mut app, "dm u9 hello there");
        assert_eq!(
            last_line(&app),
            "<System> Such user does not exist or has not been cached"
        );
        app.directory.remember(user("u9", "zed", false));
        dispatch(&mut app, "dm u9 hello there");
        assert!(app.effects.drain().contains(&Effect::SendDirect {
            user_id: "u9".into(),
            content: "hello there".into(),
        }));
    }

    #[test]
    fn test_switch_channel_by_name() {
        let mut app = connected_app();
        dispatch(&mut app, "c #random");
        assert_eq!(app.state.get().active_channel.as_deref(), Some("c-random"));
        dispatch(&mut app, "c nope");
        assert_eq!(
            last_line(&app),
            "<System> Such channel does not exist in guild 'Home'"
        );
        assert_eq!(app.state.get().active_channel.as_deref(), Some("c-random"));
    }

    #[test]
    fn test_switch_guild_unknown() {
        let mut app = connected_app();
        dispatch(&mut app, "g missing");
        assert_eq!(last_line(&app), "<System> Such guild does not exist");
    }

    #[test]
    fn test_now_and_me() {
        let mut app = test_app();
        dispatch(&mut app, "now");
        assert_eq!(last_line(&app), "<System> No active guild");
        dispatch(&mut app, "me");
        assert_eq!(last_line(&app), "<System> Not logged in");

        let mut app = connected_app();
        dispatch(&mut app, "now");
        assert_eq!(
            last_line(&app),
            "<System> Currently on guild 'Home' # 'general'"
        );
        dispatch(&mut app, "me");
        assert_eq!(last_line(&app), "<System> Logged in as me#0001 | 42ms");
    }

    #[test]
    fn test_format_changes_template() {
        let mut app = test_app();
        dispatch(&mut app, "format {sender}: {message}");
        assert_eq!(app.state.get().message_format, "{sender}: {message}");
        app.system("check");
        assert_eq!(last_line(&app), "System: check");
    }

    #[test]
    fn test_toggles_report_state() {
        let mut app = test_app();
        dispatch(&mut app, "global");
        assert!(app.state.get().global_messages);
        dispatch(&mut app, "bots");
        assert!(app.state.get().ignore_bots);
        assert_eq!(last_line(&app), "<System> No longer displaying bot messages");
        dispatch(&mut app, "doencrypt");
        assert!(app.state.get().encrypt_outgoing);
        dispatch(&mut app, "encrypt s3cret");
        assert_eq!(app.state.get().decryption_key, "s3cret");
    }

    #[test]
    fn test_tip_shows_header() {
        let mut app = test_app();
        dispatch(&mut app, "tip");
        assert!(app.header.is_visible());
        assert!(app.state.get().header_timer.is_some());
        assert!(!app.header.content().unwrap().contains("{prefix}"));
    }

    #[test]
    fn test_fullscreen_toggles_channel_list() {
        let mut app = connected_app();
        assert!(app.channels_visible);
        dispatch(&mut app, "fullscreen");
        assert!(!app.channels_visible);
    }

    #[test]
    fn test_clear_empties_output() {
        let mut app = test_app();
        app.system("one");
        dispatch(&mut app, "clear");
        assert!(app.output.is_empty());
    }

    #[test]
    fn test_help_lists_commands_in_order() {
        let mut app = test_app();
        dispatch(&mut app, "help");
        let lines: Vec<String> = app.output.lines().map(|l| l.text()).collect();
        let start = lines
            .iter()
            .position(|l| l == "<System> Commands available:")
            .unwrap();
        assert!(lines[start + 1].contains("/login <token>"));
        assert!(lines.last().unwrap().contains("/reset"));
    }

    #[test]
    fn test_save_and_forget() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = test_app();
        app.state = crate::core::state::StateStore::new(dir.path().join("state.json"));
        app.state.update(|s| s.token = Some("tok".into()));
        dispatch(&mut app, "save");
        assert!(last_line(&app).contains("Application state saved"));
        dispatch(&mut app, "forget");
        assert!(app.state.get().token.is_none());
        let raw = std::fs::read_to_string(dir.path().join("state.json")).unwrap();
        assert!(!raw.contains("\"tok\""));
    }
}
