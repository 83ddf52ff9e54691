//! # Commands
//!
//! Prefixed input (`/name arg arg`) is routed through a [`CommandRegistry`].
//! Each entry declares how many arguments it takes; the dispatcher checks
//! that before calling the handler, and every error a handler returns is
//! turned into a system line.
//!
//! ```text
//! "/tag sig bye"  →  name "tag", args ["sig", "bye"]
//!                    │ unknown name  → "Unknown command: …"
//!                    │ bad arity     → CommandError::Usage
//!                    ▼
//!                 handler(app, args) → Ok | Usage | Failed
//! ```

pub mod handlers;

use std::fmt;

use log::{debug, warn};

use crate::core::app::App;

pub type Handler = fn(&mut App, &[String]) -> Result<(), CommandError>;

#[derive(Debug, PartialEq, Eq)]
pub enum CommandError {
    /// Wrong arguments; carries the usage string.
    Usage(String),
    /// The command ran but could not do what was asked.
    Failed(String),
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandError::Usage(usage) => write!(f, "usage: {usage}"),
            CommandError::Failed(msg) => write!(f, "{msg}"),
        }
    }
}

impl std::error::Error for CommandError {}

/// Accepted argument counts. `max: None` collects free text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Arity {
    pub min: usize,
    pub max: Option<usize>,
}

impl Arity {
    pub const NONE: Arity = Arity { min: 0, max: Some(0) };

    pub const fn exactly(n: usize) -> Self {
        Arity { min: n, max: Some(n) }
    }

    pub const fn between(min: usize, max: usize) -> Self {
        Arity { min, max: Some(max) }
    }

    pub const fn at_least(min: usize) -> Self {
        Arity { min, max: None }
    }

    pub fn accepts(&self, count: usize) -> bool {
        count >= self.min && self.max.is_none_or(|max| count <= max)
    }
}

#[derive(Debug, Clone)]
pub struct CommandEntry {
    pub name: &'static str,
    /// Argument synopsis, e.g. `<user> <text>`.
    pub args: &'static str,
    pub help: &'static str,
    pub arity: Arity,
    pub handler: Handler,
}

impl CommandEntry {
    pub fn usage(&self) -> String {
        if self.args.is_empty() {
            self.name.to_string()
        } else {
            format!("{} {}", self.name, self.args)
        }
    }
}

/// Name → handler table, kept in registration order.
#[derive(Debug, Default, Clone)]
pub struct CommandRegistry {
    entries: Vec<CommandEntry>,
}

impl CommandRegistry {
    /// A registry with every built-in command.
    pub fn builtin() -> Self {
        let mut registry = Self::default();
        handlers::register_all(&mut registry);
        registry
    }

    /// Registering an existing name replaces it in place.
    pub fn register(&mut self, entry: CommandEntry) {
        match self.entries.iter_mut().find(|e| e.name == entry.name) {
            Some(existing) => *existing = entry,
            None => self.entries.push(entry),
        }
    }

    pub fn get(&self, name: &str) -> Option<&CommandEntry> {
        self.entries.iter().find(|e| e.name == name)
    }

    pub fn entries(&self) -> &[CommandEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Complete raw input to `<prefix><name> `.
    ///
    /// Only a prefixed single token of at least two characters is completed,
    /// to the first registered name it starts.
    pub fn complete(&self, input: &str, prefix: &str) -> Option<String> {
        let partial = input.strip_prefix(prefix)?;
        if partial.chars().count() < 2 || partial.contains(' ') {
            return None;
        }
        self.entries
            .iter()
            .find(|e| e.name.starts_with(partial))
            .map(|e| format!("{prefix}{} ", e.name))
    }
}

/// Run one command line (prefix already stripped).
///
/// Never fails: unknown names, usage errors and handler failures all
/// become system lines.
pub fn dispatch(app: &mut App, line: &str) {
    let mut parts = line.split_whitespace();
    let Some(name) = parts.next() else {
        return;
    };
    let args: Vec<String> = parts.map(str::to_string).collect();

    let Some(entry) = app.commands.get(name).cloned() else {
        app.system(&format!("Unknown command: {}", crate::core::markup::escape(name)));
        return;
    };

    debug!("Dispatching command '{}' with {} args", name, args.len());
    let result = if entry.arity.accepts(args.len()) {
        (entry.handler)(app, &args)
    } else {
        Err(CommandError::Usage(entry.usage()))
    };

    match result {
        Ok(()) => {}
        Err(CommandError::Usage(usage)) => {
            let prefix = app.config.command_prefix.clone();
            app.system(&format!("Usage: {{bold}}{prefix}{usage}{{/bold}}"));
        }
        Err(CommandError::Failed(message)) => {
            warn!("Command '{}' failed: {}", name, message);
            app.system(&message);
        }
    }
}
