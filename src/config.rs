//! # Configuration Management Module
//!
//! Persistent application settings stored in platform-appropriate locations.
//! Handles loading, saving, and providing defaults for configuration options.
//!
//! ## Settings
//! - `output_root`: directory that receives recording folders
//! - `device_name_prefix`: discovery allow-list prefix for device names
//! - `scan_timeout_ms`: how long a scan may run before stopping on its own
//!
//! ## Storage Location
//! - macOS: ~/Library/Application Support/pulselab/config.toml
//! - Linux: ~/.config/pulselab/config.toml
//! - Windows: %APPDATA%\pulselab\config.toml

use crate::error::ConfigError;
use crate::scanner::ScanPolicy;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    pub output_root: PathBuf,
    pub device_name_prefix: String,
    pub scan_timeout_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            output_root: dirs::document_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("PulseLab"),
            device_name_prefix: crate::scanner::DEFAULT_NAME_PREFIX.to_string(),
            scan_timeout_ms: crate::scanner::DEFAULT_SCAN_TIMEOUT.as_millis() as u64,
        }
    }
}

impl Config {
    /// Get the path to the config file
    fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("pulselab")
            .join("config.toml")
    }

    /// Load config from the platform location, or create a default there if
    /// it doesn't exist
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::config_path())
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        match fs::read_to_string(path) {
            Ok(contents) => {
                let config = toml::from_str(&contents).map_err(ConfigError::ParseFailed)?;
                Ok(config)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                // File doesn't exist, create default
                let config = Self::default();
                config.save_to(path)?;
                Ok(config)
            }
            Err(e) => Err(ConfigError::ReadFailed(e)),
        }
    }

    /// Save config to the platform location
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::config_path())
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        // Create parent directory if it doesn't exist
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(ConfigError::WriteFailed)?;
        }

        let toml_string = toml::to_string_pretty(self).map_err(ConfigError::SerializeFailed)?;
        fs::write(path, toml_string).map_err(ConfigError::WriteFailed)?;

        Ok(())
    }

    /// Scan policy derived from these settings for `target_count` devices.
    pub fn scan_policy(&self, target_count: usize) -> ScanPolicy {
        ScanPolicy {
            name_prefix: self.device_name_prefix.clone(),
            target_count,
            timeout: Duration::from_millis(self.scan_timeout_ms),
        }
    }
}
