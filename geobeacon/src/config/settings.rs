//! Settings structs for all configuration sections.
//!
//! Each struct represents one `[section]` of the INI config file.
//! These are pure data types with no parsing or serialization logic.

use std::path::PathBuf;

/// Complete application configuration loaded from config.ini.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigFile {
    /// Upload endpoint settings
    pub endpoint: EndpointSettings,
    /// Tracking thresholds and timers
    pub tracking: TrackingSettings,
    /// Logging settings
    pub logging: LoggingSettings,
}

/// Upload endpoint configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct EndpointSettings {
    /// Base URL the upload path is joined onto.
    pub base_url: String,
    /// Path of the location resource, relative to `base_url`.
    pub path: String,
    /// Basic auth username. Empty disables authentication.
    pub username: String,
    /// Basic auth password.
    pub password: String,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
}

/// Tracking configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackingSettings {
    /// Seconds between periodic upload checks. Must be positive.
    pub upload_interval_secs: u64,
    /// Background budget in seconds. Zero disables the budget check.
    pub background_budget_secs: u64,
    /// Minimum movement in meters before a new position is uploaded.
    pub distance_filter_m: f64,
    /// Maximum age of an accepted sample, in seconds.
    pub max_sample_age_secs: u64,
    /// Extra upload attempts after the first failure.
    pub upload_retry_count: u32,
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct LoggingSettings {
    /// Log file path
    pub file: PathBuf,
}
