use std::path::Path;
use std::time::Duration;
use serde::Deserialize;
use anyhow::{Context, Result};
use crate::entitlement::{EntitlementOverride, Environment};

const MIN_DEBOUNCE_MS: u64 = 150;
const MAX_DEBOUNCE_MS: u64 = 250;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub session: SessionConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    /// Base URL of the plan-status, upgrade and subscribe endpoints
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_dataset_url")]
    pub dataset_url: String,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    #[serde(default = "default_debounce")]
    pub debounce_ms: u64,
    #[serde(default)]
    pub environment: Environment,
    /// Local premium override; ignored in production
    #[serde(default)]
    pub premium_override: Option<String>,
}

fn default_base_url() -> String {
    "http://127.0.0.1:3000/api".to_string()
}

fn default_dataset_url() -> String {
    "http://127.0.0.1:3000/data/service-tags.json".to_string()
}

fn default_timeout() -> u64 {
    30
}

fn default_debounce() -> u64 {
    200
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            dataset_url: default_dataset_url(),
            timeout_secs: default_timeout(),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce(),
            environment: Environment::default(),
            premium_override: None,
        }
    }
}

impl ApiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl SessionConfig {
    /// Search debounce window, clamped to 150-250 ms.
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms.clamp(MIN_DEBOUNCE_MS, MAX_DEBOUNCE_MS))
    }

    /// The configured override, if set and valid. Invalid values are logged and dropped.
    pub fn premium_override(&self) -> Option<EntitlementOverride> {
        let raw = self.premium_override.as_deref()?;
        match raw.parse() {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!("Ignoring premium_override: {}", e);
                None
            }
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::from_toml(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)?;
        Ok(config)
    }
}
