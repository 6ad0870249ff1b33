//! Client configuration: TOML file, then environment overrides.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

/// Endpoint of the reference deployment.
pub const DEFAULT_URL: &str = "ws://127.0.0.1:8000/ws";

/// Env var naming an alternative config file.
pub const CONFIG_PATH_ENV: &str = "COMPANION_CHAT_CONFIG";

/// Configuration error.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Endpoint must be a ws:// or wss:// URL, got {0:?}")]
    InvalidUrl(String),
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    pub endpoint: EndpointConfig,
    pub log: LogConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EndpointConfig {
    /// WebSocket URL of the chat server.
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// `EnvFilter` directive, e.g. `info` or `companion_chat_core=debug`.
    pub level: String,
    /// Log destination. Terminal front ends log nowhere without one.
    pub file: Option<PathBuf>,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_URL.into(),
        }
    }
}

impl EndpointConfig {
    /// Endpoint at `url`.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    /// Check that the URL uses a WebSocket scheme.
    ///
    /// # Errors
    /// Returns [`ConfigError::InvalidUrl`] for any other scheme.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = self.url.trim();
        let rest = url
            .strip_prefix("ws://")
            .or_else(|| url.strip_prefix("wss://"));
        match rest {
            Some(host) if !host.is_empty() => Ok(()),
            _ => Err(ConfigError::InvalidUrl(self.url.clone())),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            file: None,
        }
    }
}

/// Returns `<config_dir>/companion-chat/config.toml`, if the platform has
/// a config directory.
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("companion-chat").join("config.toml"))
}

impl ChatConfig {
    /// Load from `$COMPANION_CHAT_CONFIG` or the default path, then apply
    /// env var overrides.
    ///
    /// # Errors
    /// Returns error if the file exists but cannot be read or parsed, or if
    /// the resulting endpoint is invalid.
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var_os(CONFIG_PATH_ENV)
            .map(PathBuf::from)
            .or_else(default_config_path);
        match path {
            Some(path) => Self::load_from(path),
            None => {
                let mut config = Self::default();
                config.apply_env_overrides();
                config.endpoint.validate()?;
                Ok(config)
            }
        }
    }

    /// Load from a specific path, then apply env var overrides.
    ///
    /// A missing file yields the defaults.
    ///
    /// # Errors
    /// Returns error if the file cannot be read or parsed, or if the
    /// resulting endpoint is invalid.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Self::load_from_with(path.as_ref(), |key| std::env::var(key).ok())
    }

    fn load_from_with(
        path: &Path,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
                path: path.to_path_buf(),
                source,
            })?;
            Self::from_toml(&contents)?
        } else {
            tracing::info!("no config file at {}, using defaults", path.display());
            Self::default()
        };

        config.apply_overrides(lookup);
        config.endpoint.validate()?;
        Ok(config)
    }

    /// Parse a TOML document. Unset fields keep their defaults.
    ///
    /// # Errors
    /// Returns error if the document is not valid TOML for this schema.
    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(contents)?)
    }

    /// Apply `COMPANION_CHAT_URL`, `COMPANION_CHAT_LOG` and
    /// `COMPANION_CHAT_LOG_FILE`.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(val) = lookup("COMPANION_CHAT_URL") {
            self.endpoint.url = val;
        }
        if let Some(val) = lookup("COMPANION_CHAT_LOG") {
            self.log.level = val;
        }
        if let Some(val) = lookup("COMPANION_CHAT_LOG_FILE") {
            self.log.file = Some(PathBuf::from(val));
        }
    }
}
