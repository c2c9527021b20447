//! Persistent settings
//!
//! Stored as TOML in `<config dir>/proxydeck/config.toml`. Values given on
//! the command line (or through their environment variables) override the
//! file.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use serde::Deserialize;

use crate::core::{MAX_BLOCK_COUNT, MAX_BLOCK_MINUTES};

const APP_DIR: &str = "proxydeck";
const CONFIG_FILE: &str = "config.toml";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Management API origin, e.g. `http://127.0.0.1:8317`
    pub base_url: String,

    /// Management key sent as a bearer token
    pub management_key: String,

    pub request_timeout_secs: u64,

    /// Ceiling for the connectivity test
    pub connectivity_timeout_secs: u64,

    /// Usage statistics poll interval
    pub usage_refresh_secs: u64,

    /// Session binding poll interval
    pub session_refresh_secs: u64,

    /// Concurrent quota refreshes in a batch
    pub quota_batch_size: usize,

    /// Auth files per page for page-scoped quota refresh
    pub page_size: usize,

    pub status_bar_blocks: usize,

    pub status_block_minutes: i64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8317".to_string(),
            management_key: String::new(),
            request_timeout_secs: 30,
            connectivity_timeout_secs: 10,
            usage_refresh_secs: 300,
            session_refresh_secs: 15,
            quota_batch_size: 4,
            page_size: 9,
            status_bar_blocks: 20,
            status_block_minutes: 10,
        }
    }
}

/// Command line overrides; `None` leaves the file value in place
#[derive(Debug, Clone, Default)]
pub struct SettingsOverrides {
    pub base_url: Option<String>,
    pub management_key: Option<String>,
}

impl Settings {
    /// Default settings file location
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join(APP_DIR).join(CONFIG_FILE))
    }

    /// Load settings from `path` (or the default location)
    ///
    /// A missing file yields defaults; a malformed one is an error.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => match Self::default_path() {
                Some(p) => p,
                None => return Ok(Self::default()),
            },
        };

        if !path.exists() {
            tracing::debug!("No settings file at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read settings from {}", path.display()))?;
        let settings: Settings = toml::from_str(&content)
            .with_context(|| format!("Invalid settings file {}", path.display()))?;
        Ok(settings)
    }

    /// Apply command line overrides on top of the loaded values
    pub fn apply(mut self, overrides: &SettingsOverrides) -> Self {
        if let Some(url) = overrides.base_url.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            self.base_url = url.to_string();
        }
        if let Some(key) = overrides.management_key.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            self.management_key = key.to_string();
        }
        self
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        let url = url::Url::parse(self.base_url.trim())
            .with_context(|| format!("Invalid base_url '{}'", self.base_url))?;
        if url.scheme() != "http" && url.scheme() != "https" {
            bail!("base_url must use http or https, got '{}'", url.scheme());
        }
        if self.request_timeout_secs == 0 || self.connectivity_timeout_secs == 0 {
            bail!("Timeouts must be greater than zero");
        }
        if self.usage_refresh_secs == 0 || self.session_refresh_secs == 0 {
            bail!("Refresh intervals must be greater than zero");
        }
        if self.quota_batch_size == 0 || self.page_size == 0 {
            bail!("quota_batch_size and page_size must be greater than zero");
        }
        if !(1..=MAX_BLOCK_COUNT).contains(&self.status_bar_blocks) {
            bail!("status_bar_blocks must be between 1 and {}", MAX_BLOCK_COUNT);
        }
        if !(1..=MAX_BLOCK_MINUTES).contains(&self.status_block_minutes) {
            bail!("status_block_minutes must be between 1 and {}", MAX_BLOCK_MINUTES);
        }
        Ok(())
    }
}
