//! Configuration file handling for ~/.geobeacon/config.ini.
//!
//! Loads and saves user configuration with sensible defaults.
//! Settings structs live in [`super::settings`], constants in [`super::defaults`],
//! parsing in [`super::parser`], and serialization in [`super::writer`].

use ini::Ini;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use super::defaults::{CONFIG_DIR_NAME, CONFIG_FILE_NAME};
use super::settings::ConfigFile;
use crate::tracking::TrackingConfig;
use crate::upload::UploadConfig;

/// Configuration file errors.
#[derive(Debug, Error)]
pub enum ConfigFileError {
    /// Failed to read config file
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] ini::Error),

    /// Failed to write config file
    #[error("Failed to write config file: {0}")]
    WriteError(String),

    /// Invalid configuration value
    #[error("Invalid configuration: {section}.{key} = '{value}' - {reason}")]
    InvalidValue {
        section: String,
        key: String,
        value: String,
        reason: String,
    },

    /// Failed to create config directory
    #[error("Failed to create config directory: {0}")]
    DirectoryError(std::io::Error),
}

impl ConfigFile {
    /// Load configuration from the default path (~/.geobeacon/config.ini).
    ///
    /// If the file doesn't exist, returns defaults.
    pub fn load() -> Result<Self, ConfigFileError> {
        let path = config_file_path();
        Self::load_from(&path)
    }

    /// Load configuration from a specific path.
    ///
    /// If the file doesn't exist, returns defaults.
    pub fn load_from(path: &Path) -> Result<Self, ConfigFileError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let ini = Ini::load_from_file(path)?;
        super::parser::parse_ini(&ini)
    }

    /// Save configuration to the default path (~/.geobeacon/config.ini).
    pub fn save(&self) -> Result<(), ConfigFileError> {
        let path = config_file_path();
        self.save_to(&path)
    }

    /// Save configuration to a specific path.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigFileError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(ConfigFileError::DirectoryError)?;
        }

        let content = super::writer::to_config_string(self);
        std::fs::write(path, content).map_err(|e| ConfigFileError::WriteError(e.to_string()))
    }

    /// Create the default config file if it doesn't exist.
    ///
    /// Returns the path to the config file.
    pub fn ensure_exists() -> Result<PathBuf, ConfigFileError> {
        let path = config_file_path();
        Self::ensure_exists_at(&path)?;
        Ok(path)
    }

    /// Create a default config file at `path` if nothing is there yet.
    ///
    /// Returns `true` when a file was written.
    pub fn ensure_exists_at(path: &Path) -> Result<bool, ConfigFileError> {
        if path.exists() {
            return Ok(false);
        }
        Self::default().save_to(path)?;
        Ok(true)
    }

    /// Runtime tracking configuration built from the `[tracking]` and
    /// `[endpoint]` sections.
    pub fn tracking_config(&self) -> TrackingConfig {
        let tracking = &self.tracking;
        TrackingConfig {
            upload_path: self.endpoint.path.clone(),
            ..TrackingConfig::default()
        }
        .with_upload_interval(Duration::from_secs(tracking.upload_interval_secs))
        .with_background_budget(Duration::from_secs(tracking.background_budget_secs))
        .with_distance_filter(tracking.distance_filter_m)
        .with_max_sample_age(Duration::from_secs(tracking.max_sample_age_secs))
        .with_upload_retry_count(tracking.upload_retry_count)
    }

    /// Runtime upload client configuration built from `[endpoint]`.
    pub fn upload_config(&self) -> UploadConfig {
        let endpoint = &self.endpoint;
        UploadConfig::new(endpoint.base_url.clone())
            .with_credentials(endpoint.username.clone(), endpoint.password.clone())
            .with_timeout(Duration::from_secs(endpoint.timeout_secs))
    }
}

/// Get the path to the config directory (~/.geobeacon).
pub fn config_directory() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(CONFIG_DIR_NAME)
}

/// Get the path to the config file (~/.geobeacon/config.ini).
pub fn config_file_path() -> PathBuf {
    config_directory().join(CONFIG_FILE_NAME)
}
