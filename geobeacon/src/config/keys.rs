//! Configuration key access and validation.
//!
//! This module provides a type-safe interface for getting and setting
//! configuration values by key name, as used by `geobeacon config get/set`.
//! Each key validates its value through a small [`ValueSpecification`].

use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

use super::defaults::{MAX_TRACKING_PERIOD_SECS, MAX_UPLOAD_RETRY_COUNT};
use super::parser::expand_tilde;
use super::settings::ConfigFile;

/// Errors that can occur when getting or setting configuration values.
#[derive(Debug, Error)]
pub enum ConfigKeyError {
    /// Unknown configuration key.
    #[error("Unknown configuration key '{0}'")]
    UnknownKey(String),

    /// Validation failed for the value.
    #[error("Invalid value for {key}: {reason}")]
    ValidationFailed { key: String, reason: String },
}

/// Supported configuration keys.
///
/// Each key maps to a specific field in [`ConfigFile`] and knows how to
/// get and set its value with proper validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigKey {
    // Endpoint settings
    EndpointBaseUrl,
    EndpointPath,
    EndpointUsername,
    EndpointPassword,
    EndpointTimeoutSecs,

    // Tracking settings
    TrackingUploadIntervalSecs,
    TrackingBackgroundBudgetSecs,
    TrackingDistanceFilterM,
    TrackingMaxSampleAgeSecs,
    TrackingUploadRetryCount,

    // Logging settings
    LoggingFile,
}

impl FromStr for ConfigKey {
    type Err = ConfigKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.to_lowercase();
        ConfigKey::all()
            .iter()
            .copied()
            .find(|key| key.name() == lower)
            .ok_or_else(|| ConfigKeyError::UnknownKey(s.to_string()))
    }
}

impl ConfigKey {
    /// Get the canonical key name (e.g., "tracking.distance_filter_m").
    pub fn name(&self) -> &'static str {
        match self {
            ConfigKey::EndpointBaseUrl => "endpoint.base_url",
            ConfigKey::EndpointPath => "endpoint.path",
            ConfigKey::EndpointUsername => "endpoint.username",
            ConfigKey::EndpointPassword => "endpoint.password",
            ConfigKey::EndpointTimeoutSecs => "endpoint.timeout_secs",
            ConfigKey::TrackingUploadIntervalSecs => "tracking.upload_interval_secs",
            ConfigKey::TrackingBackgroundBudgetSecs => "tracking.background_budget_secs",
            ConfigKey::TrackingDistanceFilterM => "tracking.distance_filter_m",
            ConfigKey::TrackingMaxSampleAgeSecs => "tracking.max_sample_age_secs",
            ConfigKey::TrackingUploadRetryCount => "tracking.upload_retry_count",
            ConfigKey::LoggingFile => "logging.file",
        }
    }

    /// Get the section name (e.g., "tracking").
    pub fn section(&self) -> &'static str {
        self.name().split('.').next().unwrap_or("")
    }

    /// Get the key name within the section (e.g., "distance_filter_m").
    pub fn key_name(&self) -> &'static str {
        self.name().split('.').nth(1).unwrap_or(self.name())
    }

    /// Whether `config list` should mask this value.
    pub fn is_secret(&self) -> bool {
        matches!(self, ConfigKey::EndpointPassword)
    }

    /// Get the value from a config file as a string.
    pub fn get(&self, config: &ConfigFile) -> String {
        match self {
            ConfigKey::EndpointBaseUrl => config.endpoint.base_url.clone(),
            ConfigKey::EndpointPath => config.endpoint.path.clone(),
            ConfigKey::EndpointUsername => config.endpoint.username.clone(),
            ConfigKey::EndpointPassword => config.endpoint.password.clone(),
            ConfigKey::EndpointTimeoutSecs => config.endpoint.timeout_secs.to_string(),
            ConfigKey::TrackingUploadIntervalSecs => {
                config.tracking.upload_interval_secs.to_string()
            }
            ConfigKey::TrackingBackgroundBudgetSecs => {
                config.tracking.background_budget_secs.to_string()
            }
            ConfigKey::TrackingDistanceFilterM => config.tracking.distance_filter_m.to_string(),
            ConfigKey::TrackingMaxSampleAgeSecs => config.tracking.max_sample_age_secs.to_string(),
            ConfigKey::TrackingUploadRetryCount => config.tracking.upload_retry_count.to_string(),
            ConfigKey::LoggingFile => path_to_display(&config.logging.file),
        }
    }

    /// Set the value in a config file.
    ///
    /// Validates the value according to the key's specification before setting.
    pub fn set(&self, config: &mut ConfigFile, value: &str) -> Result<(), ConfigKeyError> {
        self.validate(value)?;
        self.apply(config, value.trim())
    }

    fn apply(&self, config: &mut ConfigFile, value: &str) -> Result<(), ConfigKeyError> {
        match self {
            ConfigKey::EndpointBaseUrl => config.endpoint.base_url = value.to_string(),
            ConfigKey::EndpointPath => config.endpoint.path = value.to_string(),
            ConfigKey::EndpointUsername => config.endpoint.username = value.to_string(),
            ConfigKey::EndpointPassword => config.endpoint.password = value.to_string(),
            ConfigKey::EndpointTimeoutSecs => config.endpoint.timeout_secs = self.parse(value)?,
            ConfigKey::TrackingUploadIntervalSecs => {
                config.tracking.upload_interval_secs = self.parse(value)?
            }
            ConfigKey::TrackingBackgroundBudgetSecs => {
                config.tracking.background_budget_secs = self.parse(value)?
            }
            ConfigKey::TrackingDistanceFilterM => {
                config.tracking.distance_filter_m = self.parse(value)?
            }
            ConfigKey::TrackingMaxSampleAgeSecs => {
                config.tracking.max_sample_age_secs = self.parse(value)?
            }
            ConfigKey::TrackingUploadRetryCount => {
                config.tracking.upload_retry_count = self.parse(value)?
            }
            ConfigKey::LoggingFile => config.logging.file = expand_tilde(value),
        }
        Ok(())
    }

    fn parse<T: FromStr>(&self, value: &str) -> Result<T, ConfigKeyError> {
        value
            .parse::<T>()
            .map_err(|_| ConfigKeyError::ValidationFailed {
                key: self.name().to_string(),
                reason: format!("'{}' could not be parsed", value),
            })
    }

    /// Validate a value according to this key's specification.
    pub fn validate(&self, value: &str) -> Result<(), ConfigKeyError> {
        self.specification()
            .is_satisfied_by(value.trim())
            .map_err(|reason| ConfigKeyError::ValidationFailed {
                key: self.name().to_string(),
                reason,
            })
    }

    fn specification(&self) -> Box<dyn ValueSpecification> {
        match self {
            ConfigKey::EndpointBaseUrl => Box::new(UrlSpec),
            ConfigKey::EndpointPath => Box::new(NonEmptySpec("must not be empty")),
            ConfigKey::EndpointUsername => Box::new(AnyStringSpec),
            ConfigKey::EndpointPassword => Box::new(AnyStringSpec),
            ConfigKey::EndpointTimeoutSecs => Box::new(PositiveIntegerSpec),
            ConfigKey::TrackingUploadIntervalSecs => Box::new(PeriodSpec),
            ConfigKey::TrackingBackgroundBudgetSecs => Box::new(NonNegativeIntegerSpec),
            ConfigKey::TrackingDistanceFilterM => Box::new(NonNegativeNumberSpec),
            ConfigKey::TrackingMaxSampleAgeSecs => Box::new(PeriodSpec),
            ConfigKey::TrackingUploadRetryCount => Box::new(RetryCountSpec),
            ConfigKey::LoggingFile => Box::new(NonEmptySpec("must be a valid path")),
        }
    }

    /// Get all supported configuration keys.
    pub fn all() -> &'static [ConfigKey] {
        &[
            ConfigKey::EndpointBaseUrl,
            ConfigKey::EndpointPath,
            ConfigKey::EndpointUsername,
            ConfigKey::EndpointPassword,
            ConfigKey::EndpointTimeoutSecs,
            ConfigKey::TrackingUploadIntervalSecs,
            ConfigKey::TrackingBackgroundBudgetSecs,
            ConfigKey::TrackingDistanceFilterM,
            ConfigKey::TrackingMaxSampleAgeSecs,
            ConfigKey::TrackingUploadRetryCount,
            ConfigKey::LoggingFile,
        ]
    }
}

// ============================================================================
// Value Specifications
// ============================================================================

/// A validation rule for a raw config value.
trait ValueSpecification {
    /// Check if the value satisfies this specification.
    /// Returns Ok(()) if valid, Err(reason) if invalid.
    fn is_satisfied_by(&self, value: &str) -> Result<(), String>;
}

struct AnyStringSpec;

impl ValueSpecification for AnyStringSpec {
    fn is_satisfied_by(&self, _value: &str) -> Result<(), String> {
        Ok(())
    }
}

struct NonEmptySpec(&'static str);

impl ValueSpecification for NonEmptySpec {
    fn is_satisfied_by(&self, value: &str) -> Result<(), String> {
        if value.is_empty() {
            Err(self.0.to_string())
        } else {
            Ok(())
        }
    }
}

struct UrlSpec;

impl ValueSpecification for UrlSpec {
    fn is_satisfied_by(&self, value: &str) -> Result<(), String> {
        if value.starts_with("http://") || value.starts_with("https://") {
            Ok(())
        } else {
            Err("must be a URL starting with 'http://' or 'https://'".to_string())
        }
    }
}

struct PositiveIntegerSpec;

impl ValueSpecification for PositiveIntegerSpec {
    fn is_satisfied_by(&self, value: &str) -> Result<(), String> {
        match value.parse::<u64>() {
            Ok(n) if n > 0 => Ok(()),
            _ => Err("must be a positive integer".to_string()),
        }
    }
}

/// Positive seconds, at most one day.
struct PeriodSpec;

impl ValueSpecification for PeriodSpec {
    fn is_satisfied_by(&self, value: &str) -> Result<(), String> {
        match value.parse::<u64>() {
            Ok(n) if n > 0 && n <= MAX_TRACKING_PERIOD_SECS => Ok(()),
            _ => Err(format!(
                "must be a positive integer no greater than {}",
                MAX_TRACKING_PERIOD_SECS
            )),
        }
    }
}

struct NonNegativeIntegerSpec;

impl ValueSpecification for NonNegativeIntegerSpec {
    fn is_satisfied_by(&self, value: &str) -> Result<(), String> {
        value
            .parse::<u64>()
            .map(|_| ())
            .map_err(|_| "must be zero or a positive integer".to_string())
    }
}

struct RetryCountSpec;

impl ValueSpecification for RetryCountSpec {
    fn is_satisfied_by(&self, value: &str) -> Result<(), String> {
        match value.parse::<u32>() {
            Ok(n) if n <= MAX_UPLOAD_RETRY_COUNT => Ok(()),
            _ => Err(format!(
                "must be an integer from 0 to {}",
                MAX_UPLOAD_RETRY_COUNT
            )),
        }
    }
}

struct NonNegativeNumberSpec;

impl ValueSpecification for NonNegativeNumberSpec {
    fn is_satisfied_by(&self, value: &str) -> Result<(), String> {
        match value.parse::<f64>() {
            Ok(n) if n.is_finite() && n >= 0.0 => Ok(()),
            _ => Err("must be a non-negative number".to_string()),
        }
    }
}

/// Convert path to display string, collapsing home dir to ~.
fn path_to_display(path: &Path) -> String {
    if let Some(home) = dirs::home_dir() {
        if let Ok(stripped) = path.strip_prefix(&home) {
            return format!("~/{}", stripped.display());
        }
    }
    path.display().to_string()
}
