//! Configuration management for bikewatch.
//!
//! This module provides configuration loading and validation using figment,
//! supporting TOML config files, environment variables, and defaults.

use std::path::PathBuf;

use chrono_tz::Tz;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Default data directory name.
const DATA_DIR_NAME: &str = "bikewatch";

/// Default database file name.
const DATABASE_FILE_NAME: &str = "bikewatch.db";

/// Application configuration.
///
/// Configuration is loaded from (in order of precedence, highest first):
/// 1. Environment variables (prefixed with `BIKEWATCH_`)
/// 2. TOML config file at `~/.config/bikewatch/config.toml`
/// 3. Default values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Storage configuration.
    pub storage: StorageConfig,
    /// Recovery reporting configuration.
    pub recovery: RecoveryConfig,
    /// Notification delivery configuration.
    pub notifications: NotificationConfig,
    /// Alert image configuration.
    pub alert_images: AlertImageConfig,
}

/// Storage-related configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Path to the database file.
    /// Defaults to `~/.local/share/bikewatch/bikewatch.db`
    pub database_path: Option<PathBuf>,
}

/// Recovery-related configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecoveryConfig {
    /// IANA zone used for recovery timestamps submitted without a timezone.
    pub default_timezone: String,
}

/// Notification-related configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
    /// Deliver notifications at all. When off, effects are logged and dropped.
    pub enabled: bool,
    /// Addresses that receive promoted alert recovery notices.
    pub admin_recipients: Vec<String>,
    /// Capacity of the in-process effect queue.
    pub queue_capacity: usize,
}

/// Alert image configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertImageConfig {
    /// Directory prefix for generated alert images.
    pub output_dir: String,
    /// Source photo extensions accepted for rendering (lowercase, no dot).
    pub allowed_extensions: Vec<String>,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            default_timezone: "UTC".to_string(),
        }
    }
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            admin_recipients: vec!["contact@bikewatch.local".to_string()],
            queue_capacity: 64,
        }
    }
}

impl Default for AlertImageConfig {
    fn default() -> Self {
        Self {
            output_dir: "alert_images".to_string(),
            allowed_extensions: default_image_extensions(),
        }
    }
}

/// Default image extensions accepted as alert image sources.
fn default_image_extensions() -> Vec<String> {
    ["jpg", "jpeg", "png", "gif", "webp"]
        .iter()
        .map(|ext| (*ext).to_string())
        .collect()
}

impl Config {
    /// Load configuration from all sources.
    ///
    /// Configuration is loaded in this order (later sources override earlier):
    /// 1. Default values
    /// 2. TOML config file (if exists)
    /// 3. Environment variables (prefixed with `BIKEWATCH_`)
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load configuration with an optional custom config path.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load_from(config_path: Option<PathBuf>) -> Result<Self> {
        let config_file = config_path.unwrap_or_else(Self::default_config_path);

        let figment = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(&config_file).nested())
            .merge(Env::prefixed("BIKEWATCH_").split("__"));

        let config: Config = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Get the default configuration file path.
    #[must_use]
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join(DATA_DIR_NAME)
            .join(CONFIG_FILE_NAME)
    }

    /// Get the default data directory path.
    #[must_use]
    pub fn default_data_dir() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from(".local/share"))
            .join(DATA_DIR_NAME)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid.
    pub fn validate(&self) -> Result<()> {
        if self.recovery.default_timezone.parse::<Tz>().is_err() {
            return Err(Error::ConfigValidation {
                message: format!(
                    "unknown default_timezone: {}",
                    self.recovery.default_timezone
                ),
            });
        }

        if self.notifications.queue_capacity == 0 {
            return Err(Error::ConfigValidation {
                message: "queue_capacity must be greater than 0".to_string(),
            });
        }

        if self.alert_images.allowed_extensions.is_empty() {
            return Err(Error::ConfigValidation {
                message: "allowed_extensions must not be empty".to_string(),
            });
        }

        if self.alert_images.output_dir.trim().is_empty() {
            return Err(Error::ConfigValidation {
                message: "output_dir must not be empty".to_string(),
            });
        }

        Ok(())
    }

    /// Get the database path, resolving defaults if not set.
    #[must_use]
    pub fn database_path(&self) -> PathBuf {
        self.storage
            .database_path
            .clone()
            .unwrap_or_else(|| Self::default_data_dir().join(DATABASE_FILE_NAME))
    }

    /// Get the default recovery timezone.
    ///
    /// Falls back to UTC if the configured name does not parse; `validate`
    /// rejects such configs, so this only matters for hand-built values.
    #[must_use]
    pub fn default_timezone(&self) -> Tz {
        self.recovery.default_timezone.parse().unwrap_or(Tz::UTC)
    }
}
