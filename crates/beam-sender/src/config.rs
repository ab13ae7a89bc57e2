//! Sender configuration, loaded from TOML.

use std::path::Path;
use std::time::Duration;

use beam_common::ConfigError;
use serde::{Deserialize, Serialize};
use tracing::info;

pub const DEFAULT_RELAY_URL: &str = "ws://127.0.0.1:8080/ws/sender";
pub const DEFAULT_RETRY_DELAY_MS: u64 = 1000;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 15;

/// Settings for the signaling client.
///
/// Every field has a default, so an empty file is a valid config.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SenderConfig {
    /// Full URL of the relay's sender endpoint.
    pub relay_url: String,
    /// Fixed delay between a dropped connection and the next attempt.
    pub retry_delay_ms: u64,
    /// Upper bound on a single connect attempt.
    pub connect_timeout_secs: u64,
    /// Buffered signaling events; events beyond this are dropped.
    pub event_capacity: usize,
    /// Buffered commands (authorize, stop) for the signaling task.
    pub command_capacity: usize,
}

impl Default for SenderConfig {
    fn default() -> Self {
        Self {
            relay_url: DEFAULT_RELAY_URL.to_string(),
            retry_delay_ms: DEFAULT_RETRY_DELAY_MS,
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
            event_capacity: 64,
            command_capacity: 16,
        }
    }
}

impl SenderConfig {
    /// Config pointing at `relay_url` with every other field defaulted.
    pub fn with_url(relay_url: impl Into<String>) -> Self {
        Self {
            relay_url: relay_url.into(),
            ..Self::default()
        }
    }

    /// Parse and validate a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)
            .map_err(|e| ConfigError::ParseError(format!("failed to parse TOML: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a TOML file. Unlike a missing field, a missing file is an
    /// error.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.to_path_buf()));
        }

        let content = std::fs::read_to_string(path).map_err(|e| {
            ConfigError::ParseError(format!("failed to read {}: {e}", path.display()))
        })?;
        let config = Self::from_toml_str(&content)?;

        info!("loaded sender config from {}", path.display());
        Ok(config)
    }

    /// Collect every problem at once rather than stopping at the first.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors = Vec::new();

        if !(self.relay_url.starts_with("ws://") || self.relay_url.starts_with("wss://")) {
            errors.push(format!(
                "relay_url must start with ws:// or wss://, got {:?}",
                self.relay_url
            ));
        }
        if self.retry_delay_ms == 0 {
            errors.push("retry_delay_ms must be greater than zero".to_string());
        }
        if self.connect_timeout_secs == 0 {
            errors.push("connect_timeout_secs must be greater than zero".to_string());
        }
        if self.event_capacity == 0 {
            errors.push("event_capacity must be greater than zero".to_string());
        }
        if self.command_capacity == 0 {
            errors.push("command_capacity must be greater than zero".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::ValidationError(errors.join("; ")))
        }
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}
