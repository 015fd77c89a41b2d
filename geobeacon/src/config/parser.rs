//! INI parsing logic for converting `Ini` → `ConfigFile`.
//!
//! This module contains the `parse_ini()` function and its helpers.
//! It is the single place where INI key names are mapped to struct fields.

use ini::Ini;
use std::path::PathBuf;
use std::str::FromStr;

use super::defaults::{MAX_TRACKING_PERIOD_SECS, MAX_UPLOAD_RETRY_COUNT};
use super::file::ConfigFileError;
use super::settings::ConfigFile;

/// Parse an `Ini` object into a `ConfigFile`.
///
/// Starts from `ConfigFile::default()` and overlays any values found in the INI.
pub(super) fn parse_ini(ini: &Ini) -> Result<ConfigFile, ConfigFileError> {
    let mut config = ConfigFile::default();

    // [endpoint] section
    if let Some(section) = ini.section(Some("endpoint")) {
        if let Some(v) = section.get("base_url") {
            let v = v.trim();
            if !v.starts_with("http://") && !v.starts_with("https://") {
                return Err(invalid(
                    "endpoint",
                    "base_url",
                    v,
                    "must be a URL starting with 'http://' or 'https://'",
                ));
            }
            config.endpoint.base_url = v.to_string();
        }
        if let Some(v) = section.get("path") {
            let v = v.trim();
            if !v.is_empty() {
                config.endpoint.path = v.to_string();
            }
        }
        if let Some(v) = section.get("username") {
            config.endpoint.username = v.trim().to_string();
        }
        if let Some(v) = section.get("password") {
            config.endpoint.password = v.to_string();
        }
        if let Some(v) = section.get("timeout_secs") {
            config.endpoint.timeout_secs = parse_positive("endpoint", "timeout_secs", v)?;
        }
    }

    // [tracking] section
    if let Some(section) = ini.section(Some("tracking")) {
        if let Some(v) = section.get("upload_interval_secs") {
            config.tracking.upload_interval_secs =
                parse_period("tracking", "upload_interval_secs", v)?;
        }
        if let Some(v) = section.get("background_budget_secs") {
            config.tracking.background_budget_secs =
                parse_number("tracking", "background_budget_secs", v, "a non-negative integer")?;
        }
        if let Some(v) = section.get("distance_filter_m") {
            let meters: f64 =
                parse_number("tracking", "distance_filter_m", v, "a non-negative number")?;
            if !meters.is_finite() || meters < 0.0 {
                return Err(invalid(
                    "tracking",
                    "distance_filter_m",
                    v,
                    "expected a non-negative number",
                ));
            }
            config.tracking.distance_filter_m = meters;
        }
        if let Some(v) = section.get("max_sample_age_secs") {
            config.tracking.max_sample_age_secs =
                parse_period("tracking", "max_sample_age_secs", v)?;
        }
        if let Some(v) = section.get("upload_retry_count") {
            let retries: u32 =
                parse_number("tracking", "upload_retry_count", v, "a non-negative integer")?;
            if retries > MAX_UPLOAD_RETRY_COUNT {
                return Err(invalid(
                    "tracking",
                    "upload_retry_count",
                    v,
                    &format!("must be at most {}", MAX_UPLOAD_RETRY_COUNT),
                ));
            }
            config.tracking.upload_retry_count = retries;
        }
    }

    // [logging] section
    if let Some(section) = ini.section(Some("logging")) {
        if let Some(v) = section.get("file") {
            let v = v.trim();
            if !v.is_empty() {
                config.logging.file = expand_tilde(v);
            }
        }
    }

    Ok(config)
}

fn invalid(section: &str, key: &str, value: &str, reason: &str) -> ConfigFileError {
    ConfigFileError::InvalidValue {
        section: section.to_string(),
        key: key.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

fn parse_number<T: FromStr>(
    section: &str,
    key: &str,
    value: &str,
    expected: &str,
) -> Result<T, ConfigFileError> {
    value
        .trim()
        .parse::<T>()
        .map_err(|_| invalid(section, key, value, &format!("expected {}", expected)))
}

fn parse_positive(section: &str, key: &str, value: &str) -> Result<u64, ConfigFileError> {
    let n: u64 = parse_number(section, key, value, "a positive integer")?;
    if n == 0 {
        return Err(invalid(section, key, value, "must be greater than zero"));
    }
    Ok(n)
}

/// A positive number of seconds no longer than one day.
fn parse_period(section: &str, key: &str, value: &str) -> Result<u64, ConfigFileError> {
    let secs = parse_positive(section, key, value)?;
    if secs > MAX_TRACKING_PERIOD_SECS {
        return Err(invalid(
            section,
            key,
            value,
            &format!("must be at most {} seconds", MAX_TRACKING_PERIOD_SECS),
        ));
    }
    Ok(secs)
}

/// Expand ~ to home directory in paths.
pub(super) fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}
