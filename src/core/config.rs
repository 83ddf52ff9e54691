//! # Configuration
//!
//! Override hierarchy: defaults → config file → env vars → CLI flags.
//!
//! Config lives at `~/.termcord/config.toml`. If missing on first run, a
//! commented-out default is generated so users can discover all options.

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::transport::rest::DEFAULT_API_BASE_URL;

// ============================================================================
// Config Structs (all fields Option<T> for sparse TOML)
// ============================================================================

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct TermcordConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub transport: TransportConfig,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct GeneralConfig {
    pub command_prefix: Option<String>,
    pub state_file: Option<PathBuf>,
    pub themes_dir: Option<PathBuf>,
    pub header_ms_per_char: Option<u64>,
    pub scrollback: Option<usize>,
    pub typing_timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct TransportConfig {
    pub api_base_url: Option<String>,
    pub poll_interval_ms: Option<u64>,
}

// ============================================================================
// Defaults
// ============================================================================

pub const DEFAULT_COMMAND_PREFIX: &str = "/";
pub const DEFAULT_HEADER_MS_PER_CHAR: u64 = 100;
pub const DEFAULT_SCROLLBACK: usize = 1000;
pub const DEFAULT_TYPING_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 2000;

/// `~/.termcord`, or the working directory when home is unknown.
fn data_dir() -> PathBuf {
    dirs::home_dir()
        .map(|h| h.join(".termcord"))
        .unwrap_or_else(|| PathBuf::from("."))
}

// ============================================================================
// Resolved Config (concrete values, no Options)
// ============================================================================

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub command_prefix: String,
    pub state_file: PathBuf,
    pub themes_dir: PathBuf,
    pub header_ms_per_char: u64,
    pub scrollback: usize,
    pub typing_timeout: Duration,
    pub api_base_url: String,
    pub poll_interval: Duration,
}

impl Default for ResolvedConfig {
    fn default() -> Self {
        resolve(&TermcordConfig::default(), &CliOverrides::default())
    }
}

/// Values taken from command-line flags. `None` means not specified.
#[derive(Debug, Default, Clone)]
pub struct CliOverrides {
    pub state_file: Option<PathBuf>,
    pub themes_dir: Option<PathBuf>,
    pub prefix: Option<String>,
}

// ============================================================================
// Error Type
// ============================================================================

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "config I/O error: {e}"),
            ConfigError::Parse(e) => write!(f, "config parse error: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {}

// ============================================================================
// Loading
// ============================================================================

/// Returns the path to `~/.termcord/config.toml`.
pub fn config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(".termcord").join("config.toml"))
}

/// Load config from `~/.termcord/config.toml`.
///
/// If the file doesn't exist, generates a commented-out default and
/// returns `TermcordConfig::default()`. If it exists but is malformed,
/// returns `ConfigError::Parse`.
pub fn load_config() -> Result<TermcordConfig, ConfigError> {
    let path = match config_path() {
        Some(p) => p,
        None => {
            warn!("Could not determine home directory, using default config");
            return Ok(TermcordConfig::default());
        }
    };
    load_config_from(&path)
}

pub fn load_config_from(path: &Path) -> Result<TermcordConfig, ConfigError> {
    if !path.exists() {
        info!("No config file found, generating default at {}", path.display());
        generate_default_config(path);
        return Ok(TermcordConfig::default());
    }

    let contents = fs::read_to_string(path).map_err(ConfigError::Io)?;
    let config: TermcordConfig = toml::from_str(&contents).map_err(ConfigError::Parse)?;
    info!("Loaded config from {}", path.display());
    debug!("Config: {:?}", config);
    Ok(config)
}

fn generate_default_config(path: &Path) {
    let default_content = r#"# termcord configuration
# All settings are optional; defaults are used for anything not specified.
# Override hierarchy: defaults → this file → env vars → CLI flags.

# [general]
# command_prefix = "/"                 # Or set TERMCORD_PREFIX
# state_file = "~/.termcord/state.json"
# themes_dir = "~/.termcord/themes"
# header_ms_per_char = 100             # Header auto-hide delay per character
# scrollback = 1000                    # Lines kept in the message pane
# typing_timeout_secs = 10

# [transport]
# api_base_url = "https://discord.com/api/v10"   # Or set TERMCORD_API_BASE_URL
# poll_interval_ms = 2000
"#;

    if let Some(parent) = path.parent()
        && let Err(e) = fs::create_dir_all(parent)
    {
        warn!("Failed to create config directory: {}", e);
        return;
    }
    if let Err(e) = fs::write(path, default_content) {
        warn!("Failed to write default config: {}", e);
    }
}

// ============================================================================
// Resolution
// ============================================================================

/// Collapse defaults → config file → env vars → CLI into concrete values.
pub fn resolve(config: &TermcordConfig, cli: &CliOverrides) -> ResolvedConfig {
    // Prefix: CLI → env → config → default
    let command_prefix = cli
        .prefix
        .clone()
        .or_else(|| std::env::var("TERMCORD_PREFIX").ok())
        .or_else(|| config.general.command_prefix.clone())
        .filter(|p| !p.is_empty())
        .unwrap_or_else(|| DEFAULT_COMMAND_PREFIX.to_string());

    let state_file = cli
        .state_file
        .clone()
        .or_else(|| config.general.state_file.clone())
        .unwrap_or_else(|| data_dir().join("state.json"));

    let themes_dir = cli
        .themes_dir
        .clone()
        .or_else(|| config.general.themes_dir.clone())
        .unwrap_or_else(|| data_dir().join("themes"));

    // API base URL: env → config → default
    let api_base_url = std::env::var("TERMCORD_API_BASE_URL")
        .ok()
        .or_else(|| config.transport.api_base_url.clone())
        .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string());

    ResolvedConfig {
        command_prefix,
        state_file: expand_home(state_file),
        themes_dir: expand_home(themes_dir),
        header_ms_per_char: config
            .general
            .header_ms_per_char
            .unwrap_or(DEFAULT_HEADER_MS_PER_CHAR),
        scrollback: config.general.scrollback.unwrap_or(DEFAULT_SCROLLBACK),
        typing_timeout: Duration::from_secs(
            config
                .general
                .typing_timeout_secs
                .unwrap_or(DEFAULT_TYPING_TIMEOUT_SECS),
        ),
        api_base_url,
        poll_interval: Duration::from_millis(
            config
                .transport
                .poll_interval_ms
                .unwrap_or(DEFAULT_POLL_INTERVAL_MS),
        ),
    }
}

/// Expand a leading `~/` to the home directory.
fn expand_home(path: PathBuf) -> PathBuf {
    match (path.strip_prefix("~"), dirs::home_dir()) {
        (Ok(rest), Some(home)) => home.join(rest),
        _ => path,
    }
}
