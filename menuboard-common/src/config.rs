//! Configuration loading
//!
//! Bootstrap configuration comes from a TOML file. Every field is optional:
//! a missing file or missing keys fall back to compiled defaults with a
//! warning, never a startup failure.
//!
//! # Settings Sources Priority
//!
//! 1. Command-line arguments
//! 2. Environment variables (`MENUBOARD_*`)
//! 3. TOML configuration file
//! 4. Built-in defaults (code constants)

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tracing::{info, warn};

use crate::{Error, Result};

/// Storage key holding the serialized collection
pub const DEFAULT_STORAGE_KEY: &str = "restaurant-menu-boards";
/// Name of the same-origin tab channel
pub const DEFAULT_CHANNEL_NAME: &str = "restaurant-menu-boards";
pub const DEFAULT_GET_ACTION: &str = "getMenu";
pub const DEFAULT_SET_ACTION: &str = "setMenu";
pub const DEFAULT_TIMEOUT_MS: u64 = 15_000;
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 15_000;
/// Polls are never scheduled more often than this
pub const MIN_POLL_INTERVAL_MS: u64 = 5_000;

pub const ENV_STORAGE_DIR: &str = "MENUBOARD_STORAGE_DIR";
pub const ENV_CONFIG_FILE: &str = "MENUBOARD_CONFIG";

/// Bootstrap configuration loaded from TOML file
#[derive(Debug, Clone, Deserialize)]
pub struct TomlConfig {
    /// Directory for the file-backed local store
    #[serde(default)]
    pub storage_dir: Option<PathBuf>,

    #[serde(default = "default_storage_key")]
    pub storage_key: String,

    #[serde(default = "default_channel_name")]
    pub channel_name: String,

    #[serde(default)]
    pub remote: RemoteSection,

    #[serde(default)]
    pub display: DisplaySection,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// `[remote]` table: the HTTP backend of record
#[derive(Debug, Clone, Deserialize)]
pub struct RemoteSection {
    /// Empty disables remote sync
    #[serde(default)]
    pub endpoint: String,

    /// Opaque shared secret sent with every request
    #[serde(default)]
    pub token: Option<String>,

    #[serde(default)]
    pub timeout_ms: Option<u64>,

    #[serde(default)]
    pub poll_interval_ms: Option<u64>,

    #[serde(default = "default_get_action")]
    pub get_action: String,

    #[serde(default = "default_set_action")]
    pub set_action: String,

    /// HTTP method used for pushes ("POST" or "PUT")
    #[serde(default = "default_method")]
    pub method: String,

    /// Extra request headers
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

/// `[display]` table, consumed by kiosk link generation
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DisplaySection {
    #[serde(default)]
    pub display_key: Option<String>,

    /// Page the kiosk display is served from
    #[serde(default)]
    pub base_url: Option<String>,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log file path (optional, logs to stderr if not specified)
    #[serde(default)]
    pub file: Option<PathBuf>,
}

fn default_storage_key() -> String {
    DEFAULT_STORAGE_KEY.to_string()
}

fn default_channel_name() -> String {
    DEFAULT_CHANNEL_NAME.to_string()
}

fn default_get_action() -> String {
    DEFAULT_GET_ACTION.to_string()
}

fn default_set_action() -> String {
    DEFAULT_SET_ACTION.to_string()
}

fn default_method() -> String {
    "POST".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            storage_dir: None,
            storage_key: default_storage_key(),
            channel_name: default_channel_name(),
            remote: RemoteSection::default(),
            display: DisplaySection::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for RemoteSection {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            token: None,
            timeout_ms: None,
            poll_interval_ms: None,
            get_action: default_get_action(),
            set_action: default_set_action(),
            method: default_method(),
            headers: BTreeMap::new(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

impl TomlConfig {
    /// Parse a TOML document
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(format!("Invalid TOML: {}", e)))
    }

    /// Load a config file that must exist
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Load a config file, degrading to defaults when it is missing
    ///
    /// A file that exists but does not parse is still an error.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => match default_config_path() {
                Some(path) => path,
                None => {
                    warn!("Could not determine config directory, using defaults");
                    return Ok(Self::default());
                }
            },
        };

        if !path.exists() {
            warn!("Config file {} not found, using defaults", path.display());
            return Ok(Self::default());
        }

        info!("Loading configuration from {}", path.display());
        Self::load(&path)
    }

    /// Validated remote settings, or `None` when no endpoint is configured
    pub fn remote_settings(&self) -> Option<RemoteSettings> {
        RemoteSettings::from_section(&self.remote)
    }
}

/// HTTP method for pushes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PushMethod {
    #[default]
    Post,
    Put,
}

/// Remote sync settings after validation and clamping
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteSettings {
    pub endpoint: String,
    pub token: Option<String>,
    pub timeout: Duration,
    pub poll_interval: Duration,
    pub get_action: String,
    pub set_action: String,
    pub method: PushMethod,
    pub headers: BTreeMap<String, String>,
}

impl RemoteSettings {
    /// Settings for `endpoint` with every other field at its default
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            token: None,
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            get_action: default_get_action(),
            set_action: default_set_action(),
            method: PushMethod::Post,
            headers: BTreeMap::new(),
        }
    }

    pub fn from_section(section: &RemoteSection) -> Option<Self> {
        let endpoint = section.endpoint.trim();
        if endpoint.is_empty() {
            return None;
        }

        let timeout_ms = match section.timeout_ms {
            Some(ms) if ms > 0 => ms,
            _ => DEFAULT_TIMEOUT_MS,
        };
        let poll_ms = section
            .poll_interval_ms
            .unwrap_or(DEFAULT_POLL_INTERVAL_MS)
            .max(MIN_POLL_INTERVAL_MS);

        let method = match section.method.trim().to_ascii_uppercase().as_str() {
            "POST" => PushMethod::Post,
            "PUT" => PushMethod::Put,
            other => {
                warn!("Unsupported push method '{}', using POST", other);
                PushMethod::Post
            }
        };

        let non_blank = |s: &str| {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        };

        Some(Self {
            endpoint: endpoint.to_string(),
            token: section.token.as_deref().and_then(non_blank),
            timeout: Duration::from_millis(timeout_ms),
            poll_interval: Duration::from_millis(poll_ms),
            get_action: non_blank(&section.get_action).unwrap_or_else(default_get_action),
            set_action: non_blank(&section.set_action).unwrap_or_else(default_set_action),
            method,
            headers: section.headers.clone(),
        })
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the poll period, clamped to the minimum
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval.max(Duration::from_millis(MIN_POLL_INTERVAL_MS));
        self
    }
}

/// Platform config file location (`~/.config/menuboard/config.toml` on Linux)
pub fn default_config_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var(ENV_CONFIG_FILE) {
        return Some(PathBuf::from(path));
    }
    dirs::config_dir().map(|d| d.join("menuboard").join("config.toml"))
}

/// OS-dependent default storage directory
pub fn default_storage_dir() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("menuboard"))
        .unwrap_or_else(|| PathBuf::from("./menuboard_data"))
}

/// Resolve the storage directory following the priority order
pub fn resolve_storage_dir(cli_arg: Option<&Path>, config: &TomlConfig) -> PathBuf {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(ENV_STORAGE_DIR) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }

    // Priority 3: TOML config file
    if let Some(path) = &config.storage_dir {
        return path.clone();
    }

    // Priority 4: OS-dependent compiled default
    default_storage_dir()
}
