//! Configuration Loader
//!
//! Resolves the relay configuration from defaults, a JSON file, and
//! environment overrides.

use crate::config::relay::RelayConfig;
use crate::error::{RelayError, Result};
use std::path::{Path, PathBuf};

/// Env var naming an explicit config file
pub const CONFIG_PATH_ENV: &str = "CHAT_RELAY_CONFIG";

/// Env var overriding the completion endpoint
pub const ENDPOINT_ENV: &str = "CHAT_RELAY_ENDPOINT";

/// Env var holding comma-separated API keys
pub const API_KEYS_ENV: &str = "CHAT_RELAY_API_KEYS";

/// Configuration loader with support for multiple sources
pub struct ConfigLoader {
    config: RelayConfig,
    source: Option<PathBuf>,
}

impl ConfigLoader {
    /// Load from the first config file found in the default locations,
    /// then apply environment overrides
    pub fn new() -> Result<Self> {
        // A missing .env is the common case
        let _ = dotenvy::dotenv();

        let mut loader = Self {
            config: RelayConfig::default(),
            source: None,
        };

        if let Some(path) = Self::get_config_paths().into_iter().find(|p| p.exists()) {
            loader.load_from_file(&path)?;
        }

        loader.apply_env_overrides(|name| std::env::var(name).ok());
        Ok(loader)
    }

    /// Create a loader with a specific config file
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let mut loader = Self {
            config: RelayConfig::default(),
            source: None,
        };

        loader.load_from_file(path)?;
        loader.apply_env_overrides(|name| std::env::var(name).ok());

        Ok(loader)
    }

    /// Get list of config paths to check, highest priority first
    fn get_config_paths() -> Vec<PathBuf> {
        let mut paths = Vec::new();

        if let Ok(custom_path) = std::env::var(CONFIG_PATH_ENV) {
            paths.push(PathBuf::from(custom_path));
        }

        paths.push(PathBuf::from("chat-relay.json"));

        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("chat-relay").join("config.json"));
        }

        if let Some(home_dir) = dirs::home_dir() {
            paths.push(home_dir.join(".chat-relay").join("config.json"));
        }

        paths
    }

    /// Load configuration from a specific file
    fn load_from_file(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            RelayError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;

        self.config = serde_json::from_str(&content).map_err(|e| {
            RelayError::Config(format!("Failed to parse {}: {}", path.display(), e))
        })?;
        self.source = Some(path.to_path_buf());

        tracing::debug!(path = %path.display(), "Loaded relay configuration");
        Ok(())
    }

    /// Apply endpoint and key overrides. Keys from `CHAT_RELAY_API_KEYS`
    /// replace both `api_keys` and `api_keys_env` from the file.
    fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(endpoint) = lookup(ENDPOINT_ENV).filter(|e| !e.trim().is_empty()) {
            self.config.endpoint = endpoint.trim().to_string();
        }

        if let Some(raw) = lookup(API_KEYS_ENV) {
            let keys: Vec<String> = raw
                .split(',')
                .map(str::trim)
                .filter(|k| !k.is_empty())
                .map(str::to_string)
                .collect();
            if !keys.is_empty() {
                self.config.api_keys = keys;
                self.config.api_keys_env.clear();
            }
        }
    }

    /// Get the loaded configuration
    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    /// File the configuration was read from, if any
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    /// Take ownership of the configuration
    pub fn into_config(self) -> RelayConfig {
        self.config
    }
}
