//! `~/.config/dishdeck/config.toml`.
//!
//! Every key is optional. A missing or blank file means defaults; keys this
//! version does not know are logged and otherwise ignored.
use serde::Deserialize;
use std::io::ErrorKind;
use std::path::Path;
use thiserror::Error;

use crate::api::TagId;

/// Maximum config file size (1 MB).
const MAX_FILE_SIZE: u64 = 1_048_576;

const KNOWN_KEYS: &[&str] = &[
    "api_url",
    "request_timeout_secs",
    "max_retries",
    "default_tag",
];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Config file too large: {size} bytes (max 1 MB)")]
    TooLarge { size: u64 },
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Base URL of the recipe API. HTTPS unless it points at localhost.
    pub api_url: String,

    /// Per-request timeout in seconds.
    pub request_timeout_secs: u64,

    /// Retries for transient failures (timeouts, network errors, 5xx).
    pub max_retries: u32,

    /// Tag to open when no tag was active in a previous session.
    pub default_tag: Option<TagId>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: "http://localhost:8080".to_string(),
            request_timeout_secs: 20,
            max_retries: 3,
            default_tag: None,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    ///
    /// A missing, empty or whitespace-only file yields `Config::default()`.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let Some(content) = read_capped(path)? else {
            tracing::debug!(path = %path.display(), "No config file found, using defaults");
            return Ok(Self::default());
        };

        if content.trim().is_empty() {
            tracing::debug!(path = %path.display(), "Config file is empty, using defaults");
            return Ok(Self::default());
        }

        warn_unknown_keys(&content);

        let config: Config = toml::from_str(&content)?;
        tracing::info!(path = %path.display(), api_url = %config.api_url, "Loaded configuration");
        Ok(config)
    }
}

/// Read the file if it exists and is within `MAX_FILE_SIZE`.
fn read_capped(path: &Path) -> Result<Option<String>, ConfigError> {
    let size = match std::fs::metadata(path) {
        Ok(meta) => meta.len(),
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    if size > MAX_FILE_SIZE {
        return Err(ConfigError::TooLarge { size });
    }

    match std::fs::read_to_string(path) {
        Ok(content) => Ok(Some(content)),
        // Removed between the size check and the read
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn warn_unknown_keys(content: &str) {
    let Ok(table) = content.parse::<toml::Table>() else {
        return;
    };
    for key in table.keys().filter(|k| !KNOWN_KEYS.contains(&k.as_str())) {
        tracing::warn!(key = %key, "Unknown key in config file, ignoring");
    }
}
