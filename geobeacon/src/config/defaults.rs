//! Default values and constants for all configuration settings.
//!
//! Tracking and endpoint defaults come from the runtime config structs so
//! the INI file and the library agree on them.

use std::path::PathBuf;

use super::settings::*;
use crate::tracking::{
    DEFAULT_BACKGROUND_BUDGET, DEFAULT_DISTANCE_FILTER_M, DEFAULT_MAX_SAMPLE_AGE,
    DEFAULT_UPLOAD_INTERVAL, DEFAULT_UPLOAD_PATH, DEFAULT_UPLOAD_RETRY_COUNT,
};
use crate::upload::{DEFAULT_BASE_URL, DEFAULT_TIMEOUT_SECS};

/// Name of the config directory under the home directory.
pub const CONFIG_DIR_NAME: &str = ".geobeacon";

/// Name of the config file inside the config directory.
pub const CONFIG_FILE_NAME: &str = "config.ini";

/// Name of the default log file inside the config directory.
pub const DEFAULT_LOG_FILE_NAME: &str = "geobeacon.log";

/// Default upload interval in seconds.
pub const DEFAULT_UPLOAD_INTERVAL_SECS: u64 = DEFAULT_UPLOAD_INTERVAL.as_secs();

/// Default background budget in seconds.
pub const DEFAULT_BACKGROUND_BUDGET_SECS: u64 = DEFAULT_BACKGROUND_BUDGET.as_secs();

/// Default maximum sample age in seconds.
pub const DEFAULT_MAX_SAMPLE_AGE_SECS: u64 = DEFAULT_MAX_SAMPLE_AGE.as_secs();

/// Upper bound for the upload interval and the maximum sample age (one day).
pub const MAX_TRACKING_PERIOD_SECS: u64 = 86_400;

/// Upper bound for extra upload attempts.
pub const MAX_UPLOAD_RETRY_COUNT: u32 = 10;

impl Default for EndpointSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            path: DEFAULT_UPLOAD_PATH.to_string(),
            username: String::new(),
            password: String::new(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl Default for TrackingSettings {
    fn default() -> Self {
        Self {
            upload_interval_secs: DEFAULT_UPLOAD_INTERVAL_SECS,
            background_budget_secs: DEFAULT_BACKGROUND_BUDGET_SECS,
            distance_filter_m: DEFAULT_DISTANCE_FILTER_M,
            max_sample_age_secs: DEFAULT_MAX_SAMPLE_AGE_SECS,
            upload_retry_count: DEFAULT_UPLOAD_RETRY_COUNT,
        }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            file: default_log_path(),
        }
    }
}

/// Default log file path (~/.geobeacon/geobeacon.log).
pub fn default_log_path() -> PathBuf {
    super::file::config_directory().join(DEFAULT_LOG_FILE_NAME)
}
