//! Config - Console Configuration
//!
//! Loaded from `config.toml` in the platform config directory, with
//! environment overrides for the backend endpoints.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::constants::{
    DEFAULT_API_URL, DEFAULT_SOCKET_URL, ENV_API_URL, ENV_SOCKET_URL,
    LIVE_MAP_POLL_INTERVAL_SECS, REQUEST_TIMEOUT_SECS,
};
use crate::error::Result;
use crate::helpers::get_or_create_config_dir;

const CONFIG_FILE: &str = "config.toml";

/// Main console configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// REST base URL, e.g. `http://localhost:3000/api`
    pub api_url: String,
    /// Push-event server origin, e.g. `http://localhost:3000`
    pub socket_url: String,
    /// Live map drift-correction poll in seconds
    pub poll_interval_secs: u64,
    /// HTTP request timeout in seconds
    pub request_timeout_secs: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            socket_url: DEFAULT_SOCKET_URL.to_string(),
            poll_interval_secs: LIVE_MAP_POLL_INTERVAL_SECS,
            request_timeout_secs: REQUEST_TIMEOUT_SECS,
        }
    }
}

impl AppConfig {
    /// Load from the platform config directory, then apply environment overrides
    pub fn load() -> Result<Self> {
        let path = get_or_create_config_dir()?.join(CONFIG_FILE);
        let mut config = Self::load_from(&path)?;
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Load from an explicit file; a missing or empty file yields defaults
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(toml::from_str(&content)?)
    }

    /// Apply endpoint overrides from a variable lookup
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup(ENV_API_URL).filter(|v| !v.is_empty()) {
            self.api_url = url;
        }
        if let Some(url) = lookup(ENV_SOCKET_URL).filter(|v| !v.is_empty()) {
            self.socket_url = url;
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.max(1))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    /// Health endpoint, served at the backend origin rather than under the API prefix
    pub fn health_url(&self) -> String {
        format!("{}/health", self.socket_url.trim_end_matches('/'))
    }
}
