//! Relay Configuration
//!
//! Defines the configuration schema for the relay.

use crate::api::DEFAULT_HISTORY_LIMIT;
use crate::error::{RelayError, Result};
use crate::router::DEFAULT_MODELS;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Completion endpoint used when none is configured
pub const DEFAULT_ENDPOINT: &str = "https://samuraiapi.in/v1/chat/completions";

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RelayConfig {
    /// Full URL of the chat completion endpoint
    pub endpoint: String,

    /// Raw API keys, in rotation order
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub api_keys: Vec<String>,

    /// Environment variables holding additional keys
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub api_keys_env: Vec<String>,

    /// Advertised models; the first is the default
    pub models: Vec<String>,

    /// Per-attempt request timeout in seconds
    pub timeout_secs: u64,

    /// Sampling temperature sent with every request
    pub temperature: f32,

    /// Maximum tokens to generate
    pub max_tokens: u32,

    /// Stored messages sent as context for persisted chats
    pub history_limit: usize,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            api_keys: Vec::new(),
            api_keys_env: Vec::new(),
            models: DEFAULT_MODELS.iter().map(|m| m.to_string()).collect(),
            timeout_secs: 30,
            temperature: 0.7,
            max_tokens: 2048,
            history_limit: DEFAULT_HISTORY_LIMIT,
        }
    }
}

impl RelayConfig {
    /// Config with the given keys and everything else defaulted
    pub fn with_keys(keys: Vec<String>) -> Self {
        Self {
            api_keys: keys,
            ..Default::default()
        }
    }

    /// Per-attempt timeout
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// All API keys: raw keys first, then keys read from `api_keys_env`
    pub fn resolve_api_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .api_keys
            .iter()
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .collect();

        for env_var in &self.api_keys_env {
            match std::env::var(env_var) {
                Ok(key) if !key.trim().is_empty() => keys.push(key.trim().to_string()),
                _ => tracing::debug!(env_var = %env_var, "API key variable not set"),
            }
        }

        keys
    }

    /// Check values that would make the relay unusable
    pub fn validate(&self) -> Result<()> {
        if self.endpoint.trim().is_empty() {
            return Err(RelayError::Config("endpoint must not be empty".to_string()));
        }
        if self.models.is_empty() {
            return Err(RelayError::Config(
                "model list must contain at least one model".to_string(),
            ));
        }
        if self.timeout_secs == 0 {
            return Err(RelayError::Config(
                "timeout_secs must be greater than zero".to_string(),
            ));
        }
        if self.history_limit == 0 {
            return Err(RelayError::Config(
                "history_limit must be greater than zero".to_string(),
            ));
        }
        if self.resolve_api_keys().is_empty() {
            return Err(RelayError::NoKeysConfigured);
        }
        Ok(())
    }
}
