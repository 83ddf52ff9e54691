//! # Session State
//!
//! One mutable record per process, owned by [`StateStore`].
//!
//! ```text
//! SessionState
//! ├── active_guild / active_channel   // ids only, never persisted
//! ├── global_messages, ignore_bots, ignore_empty_messages, muted, encrypt_outgoing
//! ├── message_format: "<{sender}> {message}"
//! ├── decryption_key
//! ├── track_list / ignored_users      // disjoint sets of user ids
//! ├── word_pins: Vec<String>
//! ├── tags: name → value
//! ├── theme + theme_data              // data is resolved, never persisted
//! ├── last_outgoing_message           // transient
//! ├── typing_timer / header_timer     // transient, at most one each
//! └── token
//! ```
//!
//! Changes only happen through [`StateStore::update`], which applies the
//! closure to a copy and swaps it in, notifying subscribers before and after.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use log::debug;
use serde::{Deserialize, Serialize};

use crate::core::persist::{self, StateError};
use crate::core::theme::{DEFAULT_THEME, ThemeData};
use crate::transport::Snowflake;

pub const DEFAULT_MESSAGE_FORMAT: &str = "<{sender}> {message}";
pub const DEFAULT_DECRYPTION_KEY: &str = "termcord";

/// Identifies one pending timer. Minted by the controller, never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerHandle(pub u64);

/// The most recent message the local user sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMessage {
    pub id: Snowflake,
    pub channel_id: Snowflake,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionState {
    #[serde(skip)]
    pub active_guild: Option<Snowflake>,
    #[serde(skip)]
    pub active_channel: Option<Snowflake>,
    pub global_messages: bool,
    pub ignore_bots: bool,
    pub ignore_empty_messages: bool,
    pub muted: bool,
    pub encrypt_outgoing: bool,
    pub message_format: String,
    pub decryption_key: String,
    pub track_list: BTreeSet<Snowflake>,
    pub ignored_users: BTreeSet<Snowflake>,
    pub word_pins: Vec<String>,
    pub tags: BTreeMap<String, String>,
    pub theme: String,
    #[serde(skip)]
    pub theme_data: ThemeData,
    #[serde(skip)]
    pub last_outgoing_message: Option<OutgoingMessage>,
    #[serde(skip)]
    pub typing_timer: Option<TimerHandle>,
    #[serde(skip)]
    pub header_timer: Option<TimerHandle>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            active_guild: None,
            active_channel: None,
            global_messages: false,
            ignore_bots: false,
            ignore_empty_messages: true,
            muted: false,
            encrypt_outgoing: false,
            message_format: DEFAULT_MESSAGE_FORMAT.to_string(),
            decryption_key: DEFAULT_DECRYPTION_KEY.to_string(),
            track_list: BTreeSet::new(),
            ignored_users: BTreeSet::new(),
            word_pins: Vec::new(),
            tags: BTreeMap::new(),
            theme: DEFAULT_THEME.to_string(),
            theme_data: ThemeData::builtin(),
            last_outgoing_message: None,
            typing_timer: None,
            header_timer: None,
            token: None,
        }
    }
}

impl SessionState {
    /// Start tracking `id`, dropping it from the ignore list.
    pub fn track(&mut self, id: &str) {
        self.ignored_users.remove(id);
        self.track_list.insert(id.to_string());
    }

    /// Start ignoring `id`, dropping it from the track list.
    pub fn ignore(&mut self, id: &str) {
        self.track_list.remove(id);
        self.ignored_users.insert(id.to_string());
    }

    /// Repair records that list an id as both tracked and ignored.
    /// Ignoring wins.
    fn normalize(&mut self) {
        let overlap: Vec<Snowflake> = self
            .track_list
            .intersection(&self.ignored_users)
            .cloned()
            .collect();
        for id in overlap {
            self.track_list.remove(&id);
        }
    }

    /// Fields that do not survive a save/sync cycle are carried over from `live`.
    fn adopt_live_fields(&mut self, live: &SessionState) {
        self.active_guild = live.active_guild.clone();
        self.active_channel = live.active_channel.clone();
        self.theme_data = live.theme_data.clone();
        self.last_outgoing_message = live.last_outgoing_message.clone();
        self.typing_timer = live.typing_timer;
        self.header_timer = live.header_timer;
    }
}

type WillChange = Box<dyn FnMut()>;
type Changed = Box<dyn FnMut(&SessionState, &SessionState)>;

/// Owner of the single session record.
pub struct StateStore {
    state: SessionState,
    path: PathBuf,
    will_change: Vec<WillChange>,
    changed: Vec<Changed>,
}

impl StateStore {
    pub fn new(path: PathBuf) -> Self {
        Self::with_state(path, SessionState::default())
    }

    pub fn with_state(path: PathBuf, state: SessionState) -> Self {
        Self {
            state,
            path,
            will_change: Vec::new(),
            changed: Vec::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read-only view of the current record.
    pub fn get(&self) -> &SessionState {
        &self.state
    }

    /// Owned copy of the current record.
    pub fn snapshot(&self) -> SessionState {
        self.state.clone()
    }

    pub fn on_will_change(&mut self, subscriber: impl FnMut() + 'static) {
        self.will_change.push(Box::new(subscriber));
    }

    pub fn on_changed(&mut self, subscriber: impl FnMut(&SessionState, &SessionState) + 'static) {
        self.changed.push(Box::new(subscriber));
    }

    /// Apply `change` to a copy of the record and swap it in.
    pub fn update(&mut self, change: impl FnOnce(&mut SessionState)) {
        for subscriber in &mut self.will_change {
            subscriber();
        }
        let mut next = self.state.clone();
        change(&mut next);
        let previous = std::mem::replace(&mut self.state, next);
        for subscriber in &mut self.changed {
            subscriber(&self.state, &previous);
        }
    }

    /// Merge the persisted file into the record, keeping live fields.
    ///
    /// `Ok(None)` when there is no file to sync from; `Ok(Some(bytes))` on success.
    /// On error the record is untouched.
    pub fn sync(&mut self) -> Result<Option<usize>, StateError> {
        if !self.path.exists() {
            debug!("No state file at {}", self.path.display());
            return Ok(None);
        }
        let (mut merged, bytes) = persist::merge_from_file(&self.path, &self.state)?;
        merged.adopt_live_fields(&self.state);
        merged.normalize();
        self.update(|state| *state = merged);
        Ok(Some(bytes))
    }

    /// Write the serializable part of the record. Returns bytes written.
    pub fn save(&self) -> Result<usize, StateError> {
        persist::atomic_write_json(&self.path, &self.state)
    }
}
