//! # Configuration Management
//!
//! Centralized configuration for the host and its listeners.
//!
//! ## Configuration Sources
//! - TOML files via `from_file()`
//! - Direct instantiation with defaults
//! - Environment-variable overrides via `from_env()`
//!
//! Validation is collected, not fail-fast: `validate()` returns every
//! problem found so a misconfigured deployment reports all of them at once.

use crate::core::serialization::SerializationFormat;
use crate::error::{Result, SwitchboardError};
use crate::net::listener::TransportKind;
use crate::utils::timeout;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::time::Duration;
use tracing::Level;

/// Top-level configuration: host scheduling, listeners, logging.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct SwitchboardConfig {
    /// Host lifecycle and scheduling settings
    #[serde(default)]
    pub host: HostConfig,

    /// One entry per listener; a host may run several transports at once
    #[serde(default)]
    pub listeners: Vec<ListenerSpec>,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl SwitchboardConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut file = File::open(path)
            .map_err(|e| SwitchboardError::ConfigError(format!("Failed to open config file: {e}")))?;

        let mut contents = String::new();
        file.read_to_string(&mut contents)
            .map_err(|e| SwitchboardError::ConfigError(format!("Failed to read config file: {e}")))?;

        Self::from_toml(&contents)
    }

    /// Load configuration from a TOML string
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str::<Self>(content)
            .map_err(|e| SwitchboardError::ConfigError(format!("Failed to parse TOML: {e}")))
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(timeout) = std::env::var("SWITCHBOARD_REQUEST_TIMEOUT_MS") {
            if let Ok(val) = timeout.parse::<u64>() {
                config.host.request_timeout = Duration::from_millis(val);
            }
        }

        if let Ok(grace) = std::env::var("SWITCHBOARD_SHUTDOWN_GRACE_MS") {
            if let Ok(val) = grace.parse::<u64>() {
                config.host.shutdown_grace = Duration::from_millis(val);
            }
        }

        Ok(config)
    }

    /// Apply overrides to the default configuration
    pub fn default_with_overrides<F>(mutator: F) -> Self
    where
        F: FnOnce(&mut Self),
    {
        let mut config = Self::default();
        mutator(&mut config);
        config
    }

    /// Validate the configuration for common issues and misconfigurations.
    ///
    /// Returns a list of validation errors. Empty list means valid.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        errors.extend(self.host.validate());
        for listener in &self.listeners {
            errors.extend(listener.validate());
        }
        errors.extend(self.logging.validate());
        errors
    }

    /// Validate and return Result - convenience method
    pub fn validate_strict(&self) -> Result<()> {
        let errors = self.validate();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(SwitchboardError::ConfigError(format!(
                "Configuration validation failed:\n  - {}",
                errors.join("\n  - ")
            )))
        }
    }
}

/// Host lifecycle and scheduling settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HostConfig {
    /// Default deadline for request/response routing
    #[serde(with = "duration_serde")]
    pub request_timeout: Duration,

    /// Control-loop polling interval while running
    #[serde(with = "duration_serde")]
    pub poll_interval: Duration,

    /// Watchdog grace period for the stopping phase
    #[serde(with = "duration_serde")]
    pub shutdown_grace: Duration,

    /// Pause after teardown so in-flight async cleanup can drain
    #[serde(with = "duration_serde")]
    pub teardown_linger: Duration,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            request_timeout: timeout::DEFAULT_REQUEST_TIMEOUT,
            poll_interval: Duration::from_millis(100),
            shutdown_grace: timeout::SHUTDOWN_GRACE,
            teardown_linger: Duration::from_secs(1),
        }
    }
}

impl HostConfig {
    /// Validate host configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.request_timeout.as_millis() < 10 {
            errors.push("Request timeout too short (minimum: 10ms)".to_string());
        } else if self.request_timeout.as_secs() > 300 {
            errors.push("Request timeout too long (maximum: 300s)".to_string());
        }

        if self.poll_interval.as_millis() < 10 {
            errors.push("Poll interval too short (minimum: 10ms)".to_string());
        } else if self.poll_interval.as_secs() > 10 {
            errors.push("Poll interval too long (maximum: 10s)".to_string());
        }

        if self.shutdown_grace.as_secs() < 1 {
            errors.push("Shutdown grace too short (minimum: 1s)".to_string());
        }

        if self.teardown_linger > self.shutdown_grace {
            errors.push("Teardown linger cannot exceed shutdown grace".to_string());
        }

        errors
    }
}

/// One listener: transport kind, bind address, session policy, codec choice.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ListenerSpec {
    /// Transport kind (tcp, kcp, ws)
    pub kind: TransportKind,

    /// Bind address (e.g., "0.0.0.0:9000")
    pub address: String,

    /// Maximum concurrent sessions; connections beyond it are dropped
    pub max_sessions: usize,

    /// Idle timeout for session reads
    #[serde(with = "duration_serde")]
    pub idle_timeout: Duration,

    /// Payload serialization format for this listener
    #[serde(default)]
    pub format: SerializationFormat,

    /// Whether the listener decodes with the directional pair tables
    /// (request/response protocols) instead of the shared space
    #[serde(default)]
    pub paired: bool,
}

impl Default for ListenerSpec {
    fn default() -> Self {
        Self {
            kind: TransportKind::Tcp,
            address: String::from("127.0.0.1:9000"),
            max_sessions: 1000,
            idle_timeout: timeout::IDLE_TIMEOUT,
            format: SerializationFormat::default(),
            paired: false,
        }
    }
}

impl ListenerSpec {
    /// Validate listener configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.address.is_empty() {
            errors.push("Listener address cannot be empty".to_string());
        } else if self.address.parse::<std::net::SocketAddr>().is_err() {
            errors.push(format!(
                "Invalid listener address format: '{}' (expected format: '0.0.0.0:9000')",
                self.address
            ));
        }

        if self.max_sessions == 0 {
            errors.push("Max sessions must be greater than 0".to_string());
        } else if self.max_sessions > 100_000 {
            errors.push(format!(
                "Max sessions very high: {} (ensure system resources can support this)",
                self.max_sessions
            ));
        }

        if self.idle_timeout.as_millis() < 100 {
            errors.push("Idle timeout too short (minimum: 100ms)".to_string());
        } else if self.idle_timeout.as_secs() > 3600 {
            errors.push("Idle timeout too long (maximum: 1 hour)".to_string());
        }

        errors
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Application name for logs
    pub app_name: String,

    /// Log level
    #[serde(with = "log_level_serde")]
    pub log_level: Level,

    /// Whether to use JSON formatting for logs
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            app_name: String::from("switchboard"),
            log_level: Level::INFO,
            json_format: false,
        }
    }
}

impl LoggingConfig {
    /// Validate logging configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.app_name.is_empty() {
            errors.push("Application name cannot be empty".to_string());
        } else if self.app_name.len() > 64 {
            errors.push(format!(
                "Application name too long: {} characters (maximum: 64)",
                self.app_name.len()
            ));
        }

        errors
    }
}

/// Helper module for Duration serialization/deserialization
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let millis = duration.as_millis() as u64;
        millis.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> std::result::Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

/// Helper module for tracing::Level serialization/deserialization
mod log_level_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::str::FromStr;
    use tracing::Level;

    pub fn serialize<S>(level: &Level, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let level_str = match *level {
            Level::TRACE => "trace",
            Level::DEBUG => "debug",
            Level::INFO => "info",
            Level::WARN => "warn",
            Level::ERROR => "error",
        };
        level_str.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> std::result::Result<Level, D::Error>
    where
        D: Deserializer<'de>,
    {
        let level_str = String::deserialize(deserializer)?;
        Level::from_str(&level_str)
            .map_err(|_| serde::de::Error::custom(format!("Invalid log level: {level_str}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = SwitchboardConfig::default();
        assert!(config.validate().is_empty());
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn toml_roundtrip() {
        let toml = r#"
            [host]
            request_timeout = 1000
            poll_interval = 100
            shutdown_grace = 60000
            teardown_linger = 1000

            [[listeners]]
            kind = "ws"
            address = "127.0.0.1:9100"
            max_sessions = 64
            idle_timeout = 30000
            format = "json"
            paired = true

            [logging]
            app_name = "gateway"
            log_level = "debug"
            json_format = false
        "#;
        let config = SwitchboardConfig::from_toml(toml).unwrap();
        assert_eq!(config.listeners.len(), 1);
        assert_eq!(config.listeners[0].kind, TransportKind::Ws);
        assert!(config.listeners[0].paired);
        assert_eq!(config.logging.log_level, Level::DEBUG);
        assert!(config.validate().is_empty());
    }

    #[test]
    fn bad_address_reported() {
        let spec = ListenerSpec {
            address: "not-an-address".to_string(),
            ..ListenerSpec::default()
        };
        let errors = spec.validate();
        assert!(errors.iter().any(|e| e.contains("address")));
    }
}
