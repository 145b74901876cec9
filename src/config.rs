//! Configuration Management
//!
//! Loaded from `config.json` under the user config directory or an explicit
//! path (JSON or YAML), then overridden from the environment.

use crate::azure::{RegionSettings, DEFAULT_ENDPOINT};
use crate::refresh::RefreshSettings;
use crate::resource::RetryPolicy;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const ENV_SUBSCRIPTION: &str = "AZURE_SUBSCRIPTION_ID";
pub const ENV_ACCESS_TOKEN: &str = "AZURE_ACCESS_TOKEN";
pub const ENV_ENDPOINT: &str = "AZREFRESH_ARM_ENDPOINT";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

fn default_max_attempts() -> u32 {
    4
}

fn default_base_delay_ms() -> u64 {
    250
}

fn default_max_delay_ms() -> u64 {
    30_000
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

/// User configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_endpoint")]
    pub arm_endpoint: String,
    #[serde(default)]
    pub subscription_id: Option<String>,
    /// Bearer token for ARM; only ever read from file or environment
    #[serde(default, skip_serializing)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default = "default_concurrency")]
    pub collector_concurrency: usize,
    #[serde(default = "default_depth")]
    pub max_expansion_depth: u32,
    #[serde(default = "default_queue_attempts")]
    pub queue_max_attempts: u32,
    #[serde(default = "default_timeout")]
    pub request_timeout_secs: u64,
    #[serde(default)]
    pub regions: RegionSettings,
    /// Snapshot file for the store and queue
    #[serde(default)]
    pub store_path: Option<PathBuf>,
}

fn default_endpoint() -> String {
    DEFAULT_ENDPOINT.to_string()
}

fn default_concurrency() -> usize {
    8
}

fn default_depth() -> u32 {
    8
}

fn default_queue_attempts() -> u32 {
    3
}

fn default_timeout() -> u64 {
    30
}

impl Default for Config {
    fn default() -> Self {
        Self {
            arm_endpoint: default_endpoint(),
            subscription_id: None,
            access_token: None,
            retry: RetryConfig::default(),
            collector_concurrency: default_concurrency(),
            max_expansion_depth: default_depth(),
            queue_max_attempts: default_queue_attempts(),
            request_timeout_secs: default_timeout(),
            regions: RegionSettings::default(),
            store_path: None,
        }
    }
}

fn config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("azrefresh"))
}

impl Config {
    /// Get the default config file path
    pub fn config_path() -> Option<PathBuf> {
        config_dir().map(|p| p.join("config.json"))
    }

    /// Load from `path`, or the default location when `None`. A missing
    /// default file yields defaults; a missing explicit file is an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => match Self::config_path().filter(|p| p.exists()) {
                Some(path) => Self::from_file(&path)?,
                None => Self::default(),
            },
        };
        config.apply_env(|name| std::env::var(name).ok());
        Ok(config)
    }

    fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let is_yaml = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("yaml") || e.eq_ignore_ascii_case("yml"));

        if is_yaml {
            serde_yaml::from_str(&content)
                .with_context(|| format!("Failed to parse YAML config {}", path.display()))
        } else {
            serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse JSON config {}", path.display()))
        }
    }

    /// Apply environment overrides through `lookup`
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(subscription) = lookup(ENV_SUBSCRIPTION).filter(|v| !v.is_empty()) {
            self.subscription_id = Some(subscription);
        }
        if let Some(token) = lookup(ENV_ACCESS_TOKEN).filter(|v| !v.is_empty()) {
            self.access_token = Some(token);
        }
        if let Some(endpoint) = lookup(ENV_ENDPOINT).filter(|v| !v.is_empty()) {
            self.arm_endpoint = endpoint;
        }
    }

    /// Save configuration to disk
    pub fn save(&self) -> Result<()> {
        let Some(path) = Self::config_path() else {
            return Ok(());
        };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(&path, content)?;

        Ok(())
    }

    /// Snapshot path (config > default location)
    pub fn effective_store_path(&self) -> PathBuf {
        self.store_path
            .clone()
            .or_else(|| config_dir().map(|p| p.join("inventory.json")))
            .unwrap_or_else(|| PathBuf::from("azrefresh-inventory.json"))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    pub fn refresh_settings(&self) -> RefreshSettings {
        RefreshSettings {
            retry: RetryPolicy {
                max_attempts: self.retry.max_attempts.clamp(1, RetryPolicy::MAX_ATTEMPTS),
                base_delay: Duration::from_millis(self.retry.base_delay_ms),
                max_delay: Duration::from_millis(self.retry.max_delay_ms.max(self.retry.base_delay_ms)),
            },
            collector_concurrency: self.collector_concurrency.max(1),
            max_expansion_depth: self.max_expansion_depth,
        }
    }
}
