//! SDK configuration
//!
//! Loaded from `<config dir>/sonos-connect/config.json` when present, then
//! overridden from the environment. Every field has a default, so an empty
//! or missing file is valid.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use sonos_api::{TransportConfig, DEFAULT_API_URL};
use sonos_event_manager::ResyncConfig;

use crate::error::{Result, SdkError};

pub const API_URL_ENV: &str = "SONOS_CONNECT_API_URL";

const CONFIG_DIR: &str = "sonos-connect";
const CONFIG_FILE: &str = "config.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SdkConfig {
    /// Control API base URL
    pub api_url: String,

    pub request_timeout_secs: u64,

    /// Quiet period before a triggered topology/status fetch runs
    pub sync_debounce_ms: u64,

    /// Fallback topology/status fetch cadence
    pub sync_interval_secs: u64,

    /// How often each player's volume is polled
    pub volume_sync_interval_secs: u64,

    /// Run a local webhook receiver
    pub webhook_enabled: bool,

    /// Inclusive port range for the webhook receiver
    pub webhook_port_range: (u16, u16),

    /// Host advertised in the webhook URL; the local IP when unset
    pub webhook_host: Option<String>,
}

impl Default for SdkConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            request_timeout_secs: 30,
            sync_debounce_ms: 2500,
            sync_interval_secs: 60 * 60,
            volume_sync_interval_secs: 60 * 60,
            webhook_enabled: false,
            webhook_port_range: (3400, 3500),
            webhook_host: None,
        }
    }
}

impl SdkConfig {
    /// `<config dir>/sonos-connect/config.json`, if the platform has a config dir
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(CONFIG_DIR).join(CONFIG_FILE))
    }

    /// Load from the default path (if present) and apply environment overrides
    pub fn load() -> Result<Self> {
        let mut config = match Self::default_path() {
            Some(path) if path.exists() => Self::from_file(&path)?,
            _ => Self::default(),
        };
        config.apply_env_from(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| SdkError::Config(format!("failed to read {}: {}", path.display(), e)))?;
        Self::from_json(&contents)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        if json.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_json::from_str(json).map_err(|e| SdkError::Config(e.to_string()))
    }

    /// Apply overrides using `lookup` to read variables
    pub fn apply_env_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup(API_URL_ENV).filter(|url| !url.is_empty()) {
            tracing::debug!("API URL overridden from {}", API_URL_ENV);
            self.api_url = url;
        }
    }

    pub fn transport_config(&self) -> TransportConfig {
        TransportConfig {
            base_url: self.api_url.clone(),
            timeout: Duration::from_secs(self.request_timeout_secs),
            ..TransportConfig::default()
        }
    }

    pub fn resync_config(&self) -> ResyncConfig {
        ResyncConfig {
            debounce: Duration::from_millis(self.sync_debounce_ms),
            interval: Duration::from_secs(self.sync_interval_secs.max(1)),
        }
    }

    pub fn volume_sync_interval(&self) -> Duration {
        Duration::from_secs(self.volume_sync_interval_secs.max(1))
    }
}
