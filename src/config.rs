//! Configuration management for the Dune client.
//!
//! Handles loading client settings from a TOML file and environment variables.

use crate::error::{DuneError, Result};
use crate::types::Performance;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use url::Url;

/// Default API root.
pub const DEFAULT_BASE_URL: &str = "https://api.dune.com/api/v1";

/// Seconds between status checks while an execution runs.
pub const POLL_FREQUENCY_SECONDS: u64 = 1;

/// Default freshness threshold for latest results.
pub const THREE_MONTHS_IN_HOURS: u64 = 2160;

/// Default timeout for a single HTTP request.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Client configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// API key sent in the `x-dune-api-key` header.
    #[serde(default)]
    pub api_key: Option<String>,

    /// API root that endpoint paths are joined onto.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Seconds between status checks.
    #[serde(default = "default_poll_frequency")]
    pub poll_frequency_secs: u64,

    /// Oldest acceptable age of latest results before a refresh.
    #[serde(default = "default_max_age_hours")]
    pub max_age_hours: u64,

    /// Execution tier used when the caller does not pick one.
    #[serde(default)]
    pub performance: Performance,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

fn default_poll_frequency() -> u64 {
    POLL_FREQUENCY_SECONDS
}

fn default_max_age_hours() -> u64 {
    THREE_MONTHS_IN_HOURS
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
            poll_frequency_secs: default_poll_frequency(),
            max_age_hours: default_max_age_hours(),
            performance: Performance::default(),
        }
    }
}

impl ClientConfig {
    /// Creates a config with the given API key and default settings.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: Some(api_key.into()),
            ..Self::default()
        }
    }

    /// Sets the API root.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Sets the request timeout.
    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    /// Sets the seconds between status checks.
    pub fn with_poll_frequency(mut self, secs: u64) -> Self {
        self.poll_frequency_secs = secs;
        self
    }

    /// Returns the default config file path for the current platform.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("dune-client")
            .join("config.toml")
    }

    /// Loads configuration from a TOML file. A missing file yields defaults.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| DuneError::config(format!("Failed to read config file: {e}")))?;

        Self::parse_toml(&content, path)
    }

    fn parse_toml(content: &str, path: &Path) -> Result<Self> {
        toml::from_str(content).map_err(|e| {
            DuneError::config(format!(
                "Configuration error in {}:\n  {}",
                path.display(),
                e
            ))
        })
    }

    /// Fills unset values from `DUNE_API_KEY` and `DUNE_API_BASE_URL`.
    pub fn apply_env_defaults(&mut self) {
        if self.api_key.is_none() {
            self.api_key = std::env::var("DUNE_API_KEY").ok();
        }
        if self.base_url == DEFAULT_BASE_URL {
            if let Ok(url) = std::env::var("DUNE_API_BASE_URL") {
                self.base_url = url;
            }
        }
    }

    /// Returns the API key or a configuration error if none is set.
    pub fn require_api_key(&self) -> Result<&str> {
        self.api_key
            .as_deref()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| {
                DuneError::config("No API key configured. Use --api-key or set DUNE_API_KEY.")
            })
    }

    /// Parses the base URL, normalized to end in `/` so paths join beneath it.
    pub fn parsed_base_url(&self) -> Result<Url> {
        let mut raw = self.base_url.clone();
        if !raw.ends_with('/') {
            raw.push('/');
        }
        let url = Url::parse(&raw)
            .map_err(|e| DuneError::config(format!("Invalid base URL '{}': {e}", self.base_url)))?;

        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(DuneError::config(format!(
                "Invalid scheme '{}'. Expected 'http' or 'https'",
                url.scheme()
            )));
        }
        Ok(url)
    }
}
