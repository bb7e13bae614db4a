//! Runtime configuration.
//!
//! Sources, lowest precedence first: built-in defaults, a TOML file
//! (`gwm.toml` in the working directory, or an explicit path), then
//! `GWM_*` environment variables with `__` between nested keys, e.g.
//! `GWM_BACKEND__URL` or `GWM_CACHE__POINTS_MAX_AGE_SECS`.

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

const DAY_SECS: u64 = 24 * 60 * 60;

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub backend: BackendSettings,
    pub cache: CacheSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendSettings {
    /// Base URL of the PostgREST endpoint
    pub url: String,
    pub api_key: Option<String>,
    pub timeout_secs: u64,
    /// Rows requested per page
    pub page_size: usize,
    /// Attempts per page request; 1 disables retries
    pub max_attempts: u32,
    pub retry_backoff_millis: u64,
}

impl Default for BackendSettings {
    fn default() -> Self {
        Self {
            url: "http://localhost:3000".to_string(),
            api_key: None,
            timeout_secs: 60,
            page_size: 1000,
            max_attempts: 1,
            retry_backoff_millis: 1000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    /// SQLite file for the persistent tier; in-memory when unset
    pub path: Option<PathBuf>,
    /// Byte ceiling for the persistent tier
    pub quota_bytes: Option<usize>,
    pub points_max_age_secs: u64,
    pub regions_max_age_secs: u64,
    pub history_max_age_secs: u64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            path: None,
            quota_bytes: None,
            points_max_age_secs: DAY_SECS,
            regions_max_age_secs: 7 * DAY_SECS,
            history_max_age_secs: DAY_SECS,
        }
    }
}

impl CacheSettings {
    pub fn points_max_age(&self) -> Duration {
        Duration::from_secs(self.points_max_age_secs)
    }

    pub fn regions_max_age(&self) -> Duration {
        Duration::from_secs(self.regions_max_age_secs)
    }

    pub fn history_max_age(&self) -> Duration {
        Duration::from_secs(self.history_max_age_secs)
    }
}

impl Settings {
    /// Load settings from `path` (required when given) or an optional
    /// `gwm.toml`, then apply environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let file = match path {
            Some(path) => File::from(path).required(true),
            None => File::with_name("gwm").required(false),
        };
        Config::builder()
            .add_source(file)
            .add_source(
                Environment::with_prefix("GWM")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()
    }
}
