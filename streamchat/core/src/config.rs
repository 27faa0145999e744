//! Client Configuration
//!
//! Settings are layered: built-in defaults, then an optional TOML file, then
//! environment variables.
//!
//! # File Format
//!
//! ```toml
//! [client]
//! base_url = "https://chat.example.com"
//! stream_path = "/api/chat/stream"
//! connect_timeout_secs = 10
//! max_input_chars = 2000
//! event_buffer = 256
//! ```
//!
//! # Environment Variables
//!
//! - `STREAMCHAT_BASE_URL`
//! - `STREAMCHAT_STREAM_PATH`
//! - `STREAMCHAT_CONNECT_TIMEOUT_SECS`
//! - `STREAMCHAT_MAX_INPUT_CHARS`
//! - `STREAMCHAT_CONFIG` (path of the TOML file)

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

/// Default backend address
pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";

/// Default streaming chat endpoint path
pub const DEFAULT_STREAM_PATH: &str = "/api/chat/stream";

/// Default limit on submitted message length, in characters
pub const DEFAULT_MAX_INPUT_CHARS: usize = 2000;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read
    #[error("failed to read config file {path}: {source}")]
    Io {
        /// File that failed
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// The file is not valid TOML for this schema
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        /// File that failed
        path: PathBuf,
        /// Underlying error
        #[source]
        source: toml::de::Error,
    },

    /// A value is out of range or malformed
    #[error("invalid value for {key}: {value}")]
    InvalidValue {
        /// Setting name
        key: &'static str,
        /// Offending value
        value: String,
    },
}

/// Where the effective configuration came from
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConfigSource {
    /// No file was found; defaults plus environment
    Defaults,
    /// Loaded from this file, then environment applied
    File(PathBuf),
}

/// Client settings
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClientConfig {
    /// Backend address, without a trailing slash
    pub base_url: String,
    /// Path of the streaming chat endpoint
    pub stream_path: String,
    /// Limit for establishing the connection; the body itself has no timeout
    pub connect_timeout: Duration,
    /// Longer submissions are ignored
    pub max_input_chars: usize,
    /// Capacity of the UI event channel created by hosts
    pub event_buffer: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            stream_path: DEFAULT_STREAM_PATH.to_string(),
            connect_timeout: Duration::from_secs(10),
            max_input_chars: DEFAULT_MAX_INPUT_CHARS,
            event_buffer: 256,
        }
    }
}

impl ClientConfig {
    /// Defaults with environment overrides applied
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.apply_env_with(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Full URL of the streaming endpoint
    #[must_use]
    pub fn stream_url(&self) -> String {
        let base = self.base_url.trim_end_matches('/');
        if self.stream_path.starts_with('/') {
            format!("{base}{}", self.stream_path)
        } else {
            format!("{base}/{}", self.stream_path)
        }
    }

    /// Override the backend address
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Apply overrides from a variable lookup
    pub fn apply_env_with<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("STREAMCHAT_BASE_URL") {
            self.base_url = url;
        }
        if let Some(path) = lookup("STREAMCHAT_STREAM_PATH") {
            self.stream_path = path;
        }
        if let Some(secs) = lookup("STREAMCHAT_CONNECT_TIMEOUT_SECS") {
            self.connect_timeout =
                Duration::from_secs(parse_number("connect_timeout_secs", &secs)?);
        }
        if let Some(chars) = lookup("STREAMCHAT_MAX_INPUT_CHARS") {
            self.max_input_chars = parse_number("max_input_chars", &chars)?;
        }
        self.validate()
    }

    fn apply_file(&mut self, file: ClientSection) {
        if let Some(url) = file.base_url {
            self.base_url = url;
        }
        if let Some(path) = file.stream_path {
            self.stream_path = path;
        }
        if let Some(secs) = file.connect_timeout_secs {
            self.connect_timeout = Duration::from_secs(secs);
        }
        if let Some(chars) = file.max_input_chars {
            self.max_input_chars = chars;
        }
        if let Some(buffer) = file.event_buffer {
            self.event_buffer = buffer;
        }
    }

    /// Check values that can be overridden after loading
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(ConfigError::InvalidValue {
                key: "base_url",
                value: self.base_url.clone(),
            });
        }
        if self.max_input_chars == 0 {
            return Err(ConfigError::InvalidValue {
                key: "max_input_chars",
                value: "0".to_string(),
            });
        }
        if self.event_buffer == 0 {
            return Err(ConfigError::InvalidValue {
                key: "event_buffer",
                value: "0".to_string(),
            });
        }
        Ok(())
    }
}

fn parse_number<T: std::str::FromStr>(key: &'static str, value: &str) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidValue {
            key,
            value: value.to_string(),
        })
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    #[serde(default)]
    client: ClientSection,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ClientSection {
    base_url: Option<String>,
    stream_path: Option<String>,
    connect_timeout_secs: Option<u64>,
    max_input_chars: Option<usize>,
    event_buffer: Option<usize>,
}

/// `$XDG_CONFIG_HOME/streamchat/config.toml` (platform equivalent elsewhere)
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("streamchat").join("config.toml"))
}

/// Load defaults, then `path`, then environment overrides
pub fn load_config_from_path(path: &Path) -> Result<ClientConfig, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let file: ConfigFile = toml::from_str(&text).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;

    let mut config = ClientConfig::default();
    config.apply_file(file.client);
    config.apply_env_with(|key| std::env::var(key).ok())?;
    Ok(config)
}

/// Load the effective configuration
///
/// Uses `STREAMCHAT_CONFIG` if set, otherwise the default path if that file
/// exists, otherwise defaults.
pub fn load_config() -> Result<(ClientConfig, ConfigSource), ConfigError> {
    let path = std::env::var("STREAMCHAT_CONFIG")
        .ok()
        .map(PathBuf::from)
        .or_else(|| default_config_path().filter(|p| p.exists()));

    match path {
        Some(path) => {
            let config = load_config_from_path(&path)?;
            tracing::debug!(path = ?path, "Loaded configuration file");
            Ok((config, ConfigSource::File(path)))
        }
        None => Ok((ClientConfig::from_env()?, ConfigSource::Defaults)),
    }
}
