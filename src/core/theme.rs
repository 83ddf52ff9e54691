//! # Themes
//!
//! A theme is four style groups (messages, channels, input, header). The
//! built-in `default` theme is always available; others are JSON files in the
//! themes directory, one per theme:
//!
//! ```json
//! {
//!   "messages": { "foregroundColor": "white", "backgroundColor": "black" },
//!   "channels": { "foregroundColor": "white", "backgroundColor": "black",
//!                 "foregroundColorHover": "white", "backgroundColorHover": "gray" },
//!   "input":    { "foregroundColor": "gray",  "backgroundColor": "lightgray" },
//!   "header":   { "foregroundColor": "black", "backgroundColor": "white" }
//! }
//! ```
//!
//! A file that is missing, unreadable, unparsable or names an unknown color
//! never replaces the active theme.

use std::fmt;
use std::fs;
use std::path::PathBuf;

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::core::color::Color;
use crate::core::state::StateStore;

pub const DEFAULT_THEME: &str = "default";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegionStyle {
    pub foreground_color: String,
    pub background_color: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelStyle {
    pub foreground_color: String,
    pub background_color: String,
    pub foreground_color_hover: String,
    pub background_color_hover: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThemeData {
    pub messages: RegionStyle,
    pub channels: ChannelStyle,
    pub input: RegionStyle,
    pub header: RegionStyle,
}

impl ThemeData {
    /// The built-in default theme.
    pub fn builtin() -> Self {
        fn region(fg: &str, bg: &str) -> RegionStyle {
            RegionStyle {
                foreground_color: fg.to_string(),
                background_color: bg.to_string(),
            }
        }
        ThemeData {
            messages: region("white", "gray"),
            channels: ChannelStyle {
                foreground_color: "white".to_string(),
                background_color: "black".to_string(),
                foreground_color_hover: "white".to_string(),
                background_color_hover: "gray".to_string(),
            },
            input: region("gray", "lightgray"),
            header: region("black", "white"),
        }
    }

    /// Every color value, paired with its JSON path for error messages.
    fn colors(&self) -> [(&'static str, &str); 10] {
        [
            ("messages.foregroundColor", self.messages.foreground_color.as_str()),
            ("messages.backgroundColor", self.messages.background_color.as_str()),
            ("channels.foregroundColor", self.channels.foreground_color.as_str()),
            ("channels.backgroundColor", self.channels.background_color.as_str()),
            ("channels.foregroundColorHover", self.channels.foreground_color_hover.as_str()),
            ("channels.backgroundColorHover", self.channels.background_color_hover.as_str()),
            ("input.foregroundColor", self.input.foreground_color.as_str()),
            ("input.backgroundColor", self.input.background_color.as_str()),
            ("header.foregroundColor", self.header.foreground_color.as_str()),
            ("header.backgroundColor", self.header.background_color.as_str()),
        ]
    }

    pub fn validate(&self) -> Result<(), ThemeError> {
        for (field, value) in self.colors() {
            if Color::parse(value).is_none() {
                return Err(ThemeError::InvalidColor {
                    field,
                    value: value.to_string(),
                });
            }
        }
        Ok(())
    }
}

impl Default for ThemeData {
    fn default() -> Self {
        Self::builtin()
    }
}

#[derive(Debug)]
pub enum ThemeError {
    NotFound(String),
    MissingCatalog(PathBuf),
    Io(std::io::Error),
    Parse(serde_json::Error),
    InvalidColor { field: &'static str, value: String },
    MissingData,
}

impl fmt::Display for ThemeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ThemeError::NotFound(name) => write!(f, "theme '{name}' not found"),
            ThemeError::MissingCatalog(dir) => {
                write!(f, "themes directory {} does not exist", dir.display())
            }
            ThemeError::Io(e) => write!(f, "theme I/O error: {e}"),
            ThemeError::Parse(e) => write!(f, "theme parse error: {e}"),
            ThemeError::InvalidColor { field, value } => {
                write!(f, "invalid color '{value}' for {field}")
            }
            ThemeError::MissingData => write!(f, "no data was provided for the theme"),
        }
    }
}

impl std::error::Error for ThemeError {}

/// A theme read from the catalog, ready to apply.
#[derive(Debug, Clone)]
pub struct LoadedTheme {
    pub name: String,
    pub data: ThemeData,
    pub byte_len: usize,
}

/// File-backed theme catalog.
pub struct ThemeStore {
    dir: PathBuf,
}

impl ThemeStore {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    pub fn dir(&self) -> &PathBuf {
        &self.dir
    }

    fn path_for(&self, name: &str) -> Option<PathBuf> {
        if name.is_empty() || name.contains(['/', '\\']) || name.starts_with('.') {
            return None;
        }
        Some(self.dir.join(format!("{name}.json")))
    }

    /// Resolve a theme by name: the built-in default or a catalog entry.
    pub fn load(&self, name: &str) -> Result<LoadedTheme, ThemeError> {
        if name == DEFAULT_THEME {
            return Ok(LoadedTheme {
                name: DEFAULT_THEME.to_string(),
                data: ThemeData::builtin(),
                byte_len: 0,
            });
        }

        let path = self
            .path_for(name)
            .filter(|p| p.is_file())
            .ok_or_else(|| ThemeError::NotFound(name.to_string()))?;

        let contents = fs::read_to_string(&path).map_err(ThemeError::Io)?;
        let data: ThemeData = serde_json::from_str(&contents).map_err(ThemeError::Parse)?;
        data.validate()?;
        debug!("Loaded theme '{}' from {}", name, path.display());

        Ok(LoadedTheme {
            name: name.to_string(),
            data,
            byte_len: contents.len(),
        })
    }

    /// Store theme name and data in session state. Absent data is rejected
    /// without touching state. Returns the byte length to report.
    pub fn apply(
        &self,
        state: &mut StateStore,
        name: &str,
        data: Option<ThemeData>,
        byte_len: usize,
    ) -> Result<usize, ThemeError> {
        let data = data.ok_or(ThemeError::MissingData)?;
        state.update(|s| {
            s.theme = name.to_string();
            s.theme_data = data;
        });
        info!("Applied theme '{}' ({} bytes)", name, byte_len);
        Ok(byte_len)
    }

    /// Names of all catalog entries, sorted.
    pub fn list(&self) -> Result<Vec<String>, ThemeError> {
        if !self.dir.is_dir() {
            return Err(ThemeError::MissingCatalog(self.dir.clone()));
        }
        let mut names: Vec<String> = fs::read_dir(&self.dir)
            .map_err(ThemeError::Io)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.extension().is_some_and(|ext| ext == "json"))
            .filter_map(|path| path.file_stem().map(|s| s.to_string_lossy().into_owned()))
            .collect();
        names.sort();
        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_theme(dir: &std::path::Path, name: &str, body: &str) {
        fs::write(dir.join(format!("{name}.json")), body).unwrap();
    }

    const OCEAN: &str = r##"{
        "messages": { "foregroundColor": "white", "backgroundColor": "#001f3f" },
        "channels": { "foregroundColor": "cyan", "backgroundColor": "black",
                      "foregroundColorHover": "white", "backgroundColorHover": "blue" },
        "input": { "foregroundColor": "white", "backgroundColor": "blue" },
        "header": { "foregroundColor": "black", "backgroundColor": "cyan" }
    }"##;

    #[test]
    fn test_builtin_is_valid() {
        assert!(ThemeData::builtin().validate().is_ok());
    }

    #[test]
    fn test_default_name_needs_no_file() {
        let store = ThemeStore::new(PathBuf::from("/nonexistent"));
        let loaded = store.load(DEFAULT_THEME).unwrap();
        assert_eq!(loaded.byte_len, 0);
        assert_eq!(loaded.data, ThemeData::builtin());
    }

    #[test]
    fn test_load_catalog_entry() {
        let dir = tempfile::tempdir().unwrap();
        write_theme(dir.path(), "ocean", OCEAN);
        let store = ThemeStore::new(dir.path().to_path_buf());

        let loaded = store.load("ocean").unwrap();
        assert_eq!(loaded.name, "ocean");
        assert_eq!(loaded.byte_len, OCEAN.len());
        assert_eq!(loaded.data.header.background_color, "cyan");
    }

    #[test]
    fn test_missing_theme_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = ThemeStore::new(dir.path().to_path_buf());
        assert!(matches!(store.load("nope"), Err(ThemeError::NotFound(_))));
    }

    #[test]
    fn test_path_traversal_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = ThemeStore::new(dir.path().to_path_buf());
        assert!(matches!(
            store.load("../etc/passwd"),
            Err(ThemeError::NotFound(_))
        ));
    }

    #[test]
    fn test_unparsable_theme_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        write_theme(dir.path(), "broken", "{ not json");
        let store = ThemeStore::new(dir.path().to_path_buf());
        assert!(matches!(store.load("broken"), Err(ThemeError::Parse(_))));
    }

    #[test]
    fn test_bad_color_rejected() {
        let dir = tempfile::tempdir().unwrap();
        write_theme(dir.path(), "odd", &OCEAN.replace("\"cyan\"", "\"chartreuse-ish\""));
        let store = ThemeStore::new(dir.path().to_path_buf());
        assert!(matches!(
            store.load("odd"),
            Err(ThemeError::InvalidColor { .. })
        ));
    }

    #[test]
    fn test_apply_without_data_leaves_state() {
        let store = ThemeStore::new(PathBuf::from("/nonexistent"));
        let mut state = StateStore::new(PathBuf::from("/nonexistent/state.json"));
        let before = state.get().theme.clone();
        let result = store.apply(&mut state, "ocean", None, 10);
        assert!(matches!(result, Err(ThemeError::MissingData)));
        assert_eq!(state.get().theme, before);
    }

    #[test]
    fn test_list_sorted_stems() {
        let dir = tempfile::tempdir().unwrap();
        write_theme(dir.path(), "zen", OCEAN);
        write_theme(dir.path(), "ocean", OCEAN);
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();
        let store = ThemeStore::new(dir.path().to_path_buf());
        assert_eq!(store.list().unwrap(), vec!["ocean", "zen"]);
    }
}
