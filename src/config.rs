//! # Configuration Management
//!
//! Centralized configuration for kivaloo wire clients.
//!
//! Holds the endpoints of the block-store (LBS) and key-value (KVLDS)
//! services, transport limits and logging settings.
//!
//! ## Configuration Sources
//! - TOML files via `from_file()`
//! - Direct instantiation with defaults
//! - Environment overrides via `from_env()`

use crate::error::{ProtocolError, Result};
use crate::utils::timeout;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::Level;

/// Max allowed payload size (16 MB)
pub const MAX_PAYLOAD_SIZE: usize = 16 * 1024 * 1024;

/// Default socket of the block-store service
pub const DEFAULT_LBS_SOCKET: &str = "/tmp/kivaloo-test/kivaloo-lbs-sock";

/// Default socket of the key-value service
pub const DEFAULT_KVLDS_SOCKET: &str = "/tmp/kivaloo-test/kivaloo-kvlds-sock";

/// Top-level client configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ClientConfig {
    /// Block-store endpoint
    #[serde(default = "EndpointConfig::lbs")]
    pub lbs: EndpointConfig,

    /// Key-value store endpoint
    #[serde(default = "EndpointConfig::kvlds")]
    pub kvlds: EndpointConfig,

    /// Transport configuration
    #[serde(default)]
    pub transport: TransportConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            lbs: EndpointConfig::lbs(),
            kvlds: EndpointConfig::kvlds(),
            transport: TransportConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl ClientConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut file = File::open(path)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to open config file: {e}")))?;

        let mut contents = String::new();
        file.read_to_string(&mut contents)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to read config file: {e}")))?;

        Self::from_toml(&contents)
    }

    /// Load configuration from TOML string
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str::<Self>(content)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to parse TOML: {e}")))
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(path) = std::env::var("KIVALOO_LBS_SOCKET") {
            config.lbs.socket_path = PathBuf::from(path);
        }

        if let Ok(path) = std::env::var("KIVALOO_KVLDS_SOCKET") {
            config.kvlds.socket_path = PathBuf::from(path);
        }

        if let Ok(size) = std::env::var("KIVALOO_MAX_PAYLOAD") {
            config.transport.max_payload_size = size.parse::<usize>().map_err(|e| {
                ProtocolError::ConfigError(format!("Invalid KIVALOO_MAX_PAYLOAD '{size}': {e}"))
            })?;
        }

        if let Ok(ms) = std::env::var("KIVALOO_RESPONSE_TIMEOUT_MS") {
            let val = ms.parse::<u64>().map_err(|e| {
                ProtocolError::ConfigError(format!(
                    "Invalid KIVALOO_RESPONSE_TIMEOUT_MS '{ms}': {e}"
                ))
            })?;
            config.transport.response_timeout = Some(Duration::from_millis(val));
        }

        Ok(config)
    }

    /// Generate example configuration file content
    pub fn example_config() -> String {
        toml::to_string_pretty(&Self::default())
            .unwrap_or_else(|_| String::from("# Failed to generate example config"))
    }

    /// Validate the configuration for common issues and misconfigurations
    ///
    /// Returns a list of validation errors. Empty list means configuration is valid.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        errors.extend(self.lbs.validate("lbs"));
        errors.extend(self.kvlds.validate("kvlds"));
        errors.extend(self.transport.validate());
        errors.extend(self.logging.validate());
        errors
    }

    /// Validate and return Result - convenience method
    pub fn validate_strict(&self) -> Result<()> {
        let errors = self.validate();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(ProtocolError::ConfigError(format!(
                "Configuration validation failed:\n  - {}",
                errors.join("\n  - ")
            )))
        }
    }
}

/// Where a backend service listens
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EndpointConfig {
    /// Unix socket path of the service
    pub socket_path: PathBuf,

    /// Timeout for the connection attempt
    #[serde(with = "duration_serde")]
    pub connect_timeout: Duration,
}

impl EndpointConfig {
    fn lbs() -> Self {
        Self {
            socket_path: PathBuf::from(DEFAULT_LBS_SOCKET),
            connect_timeout: timeout::DEFAULT_CONNECT_TIMEOUT,
        }
    }

    fn kvlds() -> Self {
        Self {
            socket_path: PathBuf::from(DEFAULT_KVLDS_SOCKET),
            connect_timeout: timeout::DEFAULT_CONNECT_TIMEOUT,
        }
    }

    /// Validate endpoint configuration
    pub fn validate(&self, name: &str) -> Vec<String> {
        let mut errors = Vec::new();

        if self.socket_path.as_os_str().is_empty() {
            errors.push(format!("{name} socket path cannot be empty"));
        }

        if self.connect_timeout.as_millis() < 10 {
            errors.push(format!("{name} connect timeout too short (minimum: 10ms)"));
        } else if self.connect_timeout.as_secs() > 300 {
            errors.push(format!("{name} connect timeout too long (maximum: 300s)"));
        }

        errors
    }
}

/// Transport configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TransportConfig {
    /// Maximum allowed payload size in bytes, in either direction
    pub max_payload_size: usize,

    /// How long a request waits for its reply; `None` waits forever.
    /// A session whose wait times out is closed.
    #[serde(default, with = "option_duration_serde", skip_serializing_if = "Option::is_none")]
    pub response_timeout: Option<Duration>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            max_payload_size: MAX_PAYLOAD_SIZE,
            response_timeout: None,
        }
    }
}

impl TransportConfig {
    /// Validate transport configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.max_payload_size == 0 {
            errors.push("Max payload size cannot be 0".to_string());
        } else if self.max_payload_size > u32::MAX as usize {
            errors.push(format!(
                "Max payload size too large: {} bytes (frame length field is 32 bits)",
                self.max_payload_size
            ));
        }

        if let Some(t) = self.response_timeout {
            if t.as_millis() < 10 {
                errors.push("Response timeout too short (minimum: 10ms)".to_string());
            }
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
            app_name: String::from("kivaloo-wire"),
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

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let millis = duration.as_millis() as u64;
        millis.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

/// Optional Duration as milliseconds; absent means `None`
mod option_duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match duration {
            Some(d) => serializer.serialize_u64(d.as_millis() as u64),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = Option::<u64>::deserialize(deserializer)?;
        Ok(millis.map(Duration::from_millis))
    }
}

/// Helper module for tracing::Level serialization/deserialization
mod log_level_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::str::FromStr;
    use tracing::Level;

    pub fn serialize<S>(level: &Level, serializer: S) -> Result<S::Ok, S::Error>
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

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Level, D::Error>
    where
        D: Deserializer<'de>,
    {
        let level_str = String::deserialize(deserializer)?;
        Level::from_str(&level_str)
            .map_err(|_| serde::de::Error::custom(format!("Invalid log level: {level_str}")))
    }
}
