//! # Configuration Settings
//!
//! Defines the configuration structure for Bud: the store registry, the
//! backing media the stores read from, encryption and logging.

use crate::errors::{BudError, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use validator::Validate;

/// Environment variable prefix for settings overrides
pub const ENV_PREFIX: &str = "BUD";

/// Separator between nested keys in environment variables
pub const ENV_SEPARATOR: &str = "__";

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate, Default)]
#[serde(default)]
pub struct Settings {
    /// Default names
    pub defaults: DefaultsSettings,

    /// Config stores, keyed by store name
    pub stores: HashMap<String, StoreSettings>,

    /// Named database connections available to table-backed stores
    pub connections: HashMap<String, ConnectionSettings>,

    /// Named disks available to filesystem-backed stores
    pub disks: HashMap<String, DiskSettings>,

    /// Encryption configuration
    pub encryption: EncryptionSettings,

    /// Logging configuration
    #[validate(nested)]
    pub logging: LoggingSettings,
}

impl Settings {
    /// Load settings from an optional file, overlaid by `BUD__*` environment
    /// variables, and validate them.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }

        let settings: Settings = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator(ENV_SEPARATOR)
                    .separator(ENV_SEPARATOR),
            )
            .build()?
            .try_deserialize()?;

        settings.validate()?;
        Ok(settings)
    }

    /// Parse settings from TOML text without consulting the environment
    pub fn from_toml(contents: &str) -> Result<Self> {
        let settings: Settings = config::Config::builder()
            .add_source(config::File::from_str(contents, config::FileFormat::Toml))
            .build()?
            .try_deserialize()?;

        settings.validate()?;
        Ok(settings)
    }

    /// Validate the entire configuration
    pub fn validate(&self) -> Result<()> {
        Validate::validate(self).map_err(BudError::from)?;

        for (name, connection) in &self.connections {
            Validate::validate(connection).map_err(BudError::from)?;
            connection.validate_custom(name)?;
        }

        Ok(())
    }

    /// The slice of settings the store manager consumes
    pub fn stores_settings(&self) -> StoresSettings {
        StoresSettings { default: self.defaults.config.clone(), stores: self.stores.clone() }
    }
}

/// Default names
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct DefaultsSettings {
    /// Name of the default config store
    pub config: Option<String>,
}

/// Store registry settings handed to the store manager
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StoresSettings {
    /// Name of the default store
    pub default: Option<String>,

    /// Store settings keyed by store name
    pub stores: HashMap<String, StoreSettings>,
}

impl StoresSettings {
    pub fn new(default: Option<&str>) -> Self {
        Self { default: default.map(str::to_string), stores: HashMap::new() }
    }

    /// Add a store, replacing any existing settings under the same name
    pub fn with_store(mut self, name: impl Into<String>, store: StoreSettings) -> Self {
        self.stores.insert(name.into(), store);
        self
    }

    pub fn store(&self, name: &str) -> Option<&StoreSettings> {
        self.stores.get(name)
    }
}

/// Settings for a single config store
///
/// Everything except `driver` is a free-form option interpreted by the
/// store's creator.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct StoreSettings {
    /// Driver used to create the store, falls back to the store name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub driver: Option<String>,

    /// Driver-specific options
    #[serde(flatten)]
    pub options: Map<String, Value>,
}

impl StoreSettings {
    pub fn new(driver: Option<&str>) -> Self {
        Self { driver: driver.map(str::to_string), options: Map::new() }
    }

    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }

    /// A string option, treating null and empty strings as unset
    pub fn option_str(&self, key: &str) -> Option<&str> {
        self.options.get(key).and_then(Value::as_str).filter(|value| !value.is_empty())
    }
}

/// Database connection configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct ConnectionSettings {
    /// Database connection URL
    #[validate(length(min = 1, message = "Database URL cannot be empty"))]
    pub url: String,

    /// Maximum number of connections in the pool
    #[validate(range(min = 1, max = 100, message = "Max connections must be between 1 and 100"))]
    pub max_connections: u32,

    /// Minimum number of connections in the pool
    #[validate(range(min = 0, max = 50, message = "Min connections must be between 0 and 50"))]
    pub min_connections: u32,

    /// Connection timeout in seconds
    #[validate(range(
        min = 1,
        max = 60,
        message = "Connect timeout must be between 1 and 60 seconds"
    ))]
    pub connect_timeout_seconds: u64,

    /// Idle timeout in seconds (0 = no timeout)
    pub idle_timeout_seconds: u64,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            url: "sqlite://./data/bud.db".to_string(),
            max_connections: 5,
            min_connections: 0,
            connect_timeout_seconds: 10,
            idle_timeout_seconds: 600,
        }
    }
}

impl ConnectionSettings {
    /// Get connection timeout as Duration
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_seconds)
    }

    /// Get idle timeout as Duration (None if 0)
    pub fn idle_timeout(&self) -> Option<Duration> {
        if self.idle_timeout_seconds == 0 {
            None
        } else {
            Some(Duration::from_secs(self.idle_timeout_seconds))
        }
    }

    fn validate_custom(&self, name: &str) -> Result<()> {
        if !self.url.starts_with("sqlite:") {
            return Err(BudError::validation_field(
                format!("Connection '{}' must use a 'sqlite:' URL", name),
                "url",
            ));
        }

        if self.min_connections > self.max_connections {
            return Err(BudError::validation_field(
                format!("Connection '{}' has min_connections above max_connections", name),
                "min_connections",
            ));
        }

        Ok(())
    }
}

/// Local disk configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiskSettings {
    /// Root directory blobs are stored under
    pub root: PathBuf,
}

/// Encryption configuration
#[derive(Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct EncryptionSettings {
    /// Base64-encoded 32-byte key
    pub key: Option<String>,
}

impl fmt::Debug for EncryptionSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncryptionSettings")
            .field("key", &self.key.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct LoggingSettings {
    /// Default log level, overridden by `RUST_LOG`
    #[validate(length(min = 1, message = "Log level cannot be empty"))]
    pub level: String,

    /// Emit JSON formatted logs
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self { level: "info".to_string(), json: false }
    }
}
