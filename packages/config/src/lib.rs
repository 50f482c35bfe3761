#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Configuration for the CitySecure dispatch client.
//!
//! Values are layered, later layers winning:
//!
//! 1. Built-in defaults embedded from `config/default.toml`.
//! 2. An optional TOML file (partial files are fine; only the keys present
//!    are overridden).
//! 3. Environment variables:
//!    - `CITYSECURE_API_URL` → `api.base_url`
//!    - `CITYSECURE_API_TOKEN` → `api.token`
//!    - `CITYSECURE_OPERATOR_ID` → `dispatch.operator_id`

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

/// Environment variable naming the config file to load.
pub const CONFIG_PATH_ENV: &str = "CITYSECURE_CONFIG";

const DEFAULT_TOML: &str = include_str!("../config/default.toml");

/// Errors from loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("Failed to read config file {}: {source}", path.display())]
    Io {
        /// File that was being read.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The TOML could not be parsed or did not match the expected shape.
    #[error("Invalid configuration: {0}")]
    Parse(#[from] toml::de::Error),

    /// An environment override held an unusable value.
    #[error("Invalid value for {var}: {message}")]
    Env {
        /// Variable name.
        var: &'static str,
        /// What was wrong with it.
        message: String,
    },
}

/// Full client configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Config {
    /// Backend connection settings.
    pub api: ApiConfig,
    /// Dispatch workflow settings.
    pub dispatch: DispatchConfig,
    /// Address search settings.
    pub search: SearchConfig,
}

/// Backend connection settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ApiConfig {
    /// Base URL every endpoint path is appended to.
    pub base_url: String,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
    /// Bearer token for an already authenticated session.
    #[serde(default)]
    pub token: Option<String>,
}

impl ApiConfig {
    /// Per-request timeout.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Dispatch workflow settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DispatchConfig {
    /// Delay before re-fetching an active shift that came back without a
    /// slot.
    pub shift_retry_delay_ms: u64,
    /// Operator recorded on operational shifts created by this client.
    #[serde(default)]
    pub operator_id: Option<i64>,
}

impl DispatchConfig {
    /// Delay before the single active-shift retry.
    #[must_use]
    pub const fn shift_retry_delay(&self) -> Duration {
        Duration::from_millis(self.shift_retry_delay_ms)
    }
}

/// Address search settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SearchConfig {
    /// Quiet period after the last keystroke before searching.
    pub debounce_ms: u64,
    /// Queries shorter than this (in characters) are not sent.
    pub min_query_len: usize,
}

impl SearchConfig {
    /// Quiet period as a [`Duration`].
    #[must_use]
    pub const fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

impl Config {
    /// Loads the configuration from every layer.
    ///
    /// `path` takes precedence over the `CITYSECURE_CONFIG` variable. A
    /// missing file is an error only when it was asked for explicitly.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if a file cannot be read or parsed, or an
    /// environment override is malformed.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let from_env = std::env::var(CONFIG_PATH_ENV).ok().map(PathBuf::from);
        let path = path.map(Path::to_path_buf).or(from_env);

        let overlay = match path {
            Some(path) => {
                log::debug!("Loading configuration from {}", path.display());
                Some(
                    std::fs::read_to_string(&path)
                        .map_err(|source| ConfigError::Io { path, source })?,
                )
            }
            None => None,
        };

        let mut config = Self::from_layers(overlay.as_deref())?;
        config.apply_env(|var| std::env::var(var).ok())?;
        Ok(config)
    }

    /// Builds a configuration from the embedded defaults plus an optional
    /// TOML overlay. Environment variables are not consulted.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] if either document is invalid.
    pub fn from_layers(overlay: Option<&str>) -> Result<Self, ConfigError> {
        let mut base: toml::Table = toml::from_str(DEFAULT_TOML)?;
        if let Some(overlay) = overlay {
            let overlay: toml::Table = toml::from_str(overlay)?;
            merge_tables(&mut base, overlay);
        }
        Ok(toml::Value::Table(base).try_into()?)
    }

    /// Applies environment overrides using `lookup` to read variables.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Env`] if `CITYSECURE_OPERATOR_ID` is not an
    /// integer.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("CITYSECURE_API_URL").filter(|v| !v.is_empty()) {
            self.api.base_url = url;
        }
        if let Some(token) = lookup("CITYSECURE_API_TOKEN").filter(|v| !v.is_empty()) {
            self.api.token = Some(token);
        }
        if let Some(raw) = lookup("CITYSECURE_OPERATOR_ID").filter(|v| !v.is_empty()) {
            let id = raw.trim().parse::<i64>().map_err(|e| ConfigError::Env {
                var: "CITYSECURE_OPERATOR_ID",
                message: format!("{raw:?} is not an integer ({e})"),
            })?;
            self.dispatch.operator_id = Some(id);
        }
        Ok(())
    }
}

/// Recursively merges `overlay` into `base`. Nested tables merge key by
/// key; any other value replaces the base value.
fn merge_tables(base: &mut toml::Table, overlay: toml::Table) {
    for (key, value) in overlay {
        match (base.get_mut(&key), value) {
            (Some(toml::Value::Table(existing)), toml::Value::Table(incoming)) => {
                merge_tables(existing, incoming);
            }
            (_, value) => {
                base.insert(key, value);
            }
        }
    }
}
