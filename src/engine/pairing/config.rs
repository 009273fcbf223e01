// Pairing: Configuration
// PairingConfig, default_config_path, load/save, env overrides, validation

use crate::atoms::constants::*;
use crate::atoms::error::{PairingError, PairingResult};
use log::info;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

// ── Config Struct ──────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PairingConfig {
    /// Backend base URL (default: "https://v3-wabi.cloudious.net")
    pub api_url: String,
    /// Path of the pairing-code call (default: "/pairing/connect")
    pub connect_path: String,
    /// Path of the link-status call (default: "/pairing/status")
    pub status_path: String,
    /// Bearer credential. Usually supplied by env or the sign-in flow, not the file.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    /// Seconds between scheduled status checks (default: 30)
    pub poll_interval_secs: u64,
    /// Throttle floor between effective status checks on every path (default: 5)
    pub min_check_interval_secs: u64,
    /// Per-request timeout for both pairing calls (default: 15)
    pub request_timeout_secs: u64,
}

impl Default for PairingConfig {
    fn default() -> Self {
        PairingConfig {
            api_url: DEFAULT_API_URL.into(),
            connect_path: DEFAULT_CONNECT_PATH.into(),
            status_path: DEFAULT_STATUS_PATH.into(),
            token: None,
            poll_interval_secs: DEFAULT_POLL_INTERVAL_SECS,
            min_check_interval_secs: DEFAULT_MIN_CHECK_INTERVAL_SECS,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
        }
    }
}

impl PairingConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn min_check_interval(&self) -> Duration {
        Duration::from_secs(self.min_check_interval_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Full URL of an endpoint path, tolerant of stray slashes.
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.api_url.trim_end_matches('/'), path.trim_start_matches('/'))
    }

    pub fn validate(&self) -> PairingResult<()> {
        if self.api_url.trim().is_empty() {
            return Err(PairingError::Config("api_url must not be empty".into()));
        }
        if !self.api_url.starts_with("http://") && !self.api_url.starts_with("https://") {
            return Err(PairingError::Config(format!("api_url must be http(s): {}", self.api_url)));
        }
        if self.poll_interval_secs == 0 {
            return Err(PairingError::Config("poll_interval_secs must be > 0".into()));
        }
        if self.min_check_interval_secs == 0 {
            return Err(PairingError::Config("min_check_interval_secs must be > 0".into()));
        }
        if self.request_timeout_secs == 0 {
            return Err(PairingError::Config("request_timeout_secs must be > 0".into()));
        }
        Ok(())
    }

    /// Apply `WABI_API_URL` / `WABI_TOKEN` from the process environment.
    pub fn apply_env(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    pub(crate) fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup(ENV_API_URL).filter(|v| !v.trim().is_empty()) {
            self.api_url = url;
        }
        if let Some(token) = lookup(ENV_TOKEN).filter(|v| !v.trim().is_empty()) {
            self.token = Some(token);
        }
    }
}

// ── Config Persistence ─────────────────────────────────────────────────

/// `<config dir>/wabi/pairing.toml`, if the platform has a config dir.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
}

/// Load config from `path`. A missing file yields defaults.
pub fn load_config(path: &Path) -> PairingResult<PairingConfig> {
    if !path.exists() {
        info!("[pairing] No config at {}, using defaults", path.display());
        return Ok(PairingConfig::default());
    }
    let raw = std::fs::read_to_string(path)?;
    let config: PairingConfig = toml::from_str(&raw)?;
    info!("[pairing] Loaded config from {}", path.display());
    Ok(config)
}

pub fn save_config(path: &Path, config: &PairingConfig) -> PairingResult<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let raw = toml::to_string_pretty(config)
        .map_err(|e| PairingError::Config(format!("Serialize config: {}", e)))?;
    std::fs::write(path, raw)?;
    Ok(())
}
