//! # Configuration Management
//!
//! Layered settings: an optional TOML/YAML/JSON file, overridden by `BUD__*`
//! environment variables (a `.env` file is honoured by the binary).

pub mod settings;

pub use settings::{
    ConnectionSettings, DefaultsSettings, DiskSettings, EncryptionSettings, LoggingSettings,
    Settings, StoreSettings, StoresSettings,
};

use crate::errors::Result;
use std::path::Path;

/// Load settings from a file path, tolerating a missing file
pub fn load_config(path: &str) -> Result<Settings> {
    let path = Path::new(path);
    if path.exists() {
        Settings::load(Some(path))
    } else {
        tracing::debug!(path = %path.display(), "Config file not found, using environment only");
        Settings::load(None)
    }
}
