//! INI serialization logic for converting `ConfigFile` → INI string.
//!
//! This module contains the `to_config_string()` function that produces
//! the commented INI representation written to `config.ini`.

use std::path::Path;

use super::settings::ConfigFile;

/// Convert a `ConfigFile` to a commented INI string for saving.
pub(super) fn to_config_string(config: &ConfigFile) -> String {
    format!(
        r#"[endpoint]
; Base URL of the location service. The upload path is joined onto it,
; so keep the trailing slash (e.g., https://tracker.example.com/api/)
base_url = {}
; Resource the position is POSTed to, relative to base_url (default: location)
path = {}
; HTTP basic auth credentials. Leave username empty to send no auth header.
username = {}
password = {}
; Timeout in seconds for a single upload request (default: 30)
timeout_secs = {}

[tracking]
; Seconds between periodic upload checks while tracking, at most 86400 (default: 120)
upload_interval_secs = {}
; Seconds of background operation before the high-accuracy subscription is
; restarted; 0 disables the check (default: 120)
background_budget_secs = {}
; Minimum movement in meters before a new position is uploaded (default: 100)
distance_filter_m = {}
; Samples older than this many seconds are ignored, at most 86400 (default: 5)
max_sample_age_secs = {}
; Extra attempts after a failed upload, 0 to 10 (default: 2)
upload_retry_count = {}

[logging]
; Log file path. The file is truncated at the start of each session.
file = {}
"#,
        config.endpoint.base_url,
        config.endpoint.path,
        config.endpoint.username,
        config.endpoint.password,
        config.endpoint.timeout_secs,
        config.tracking.upload_interval_secs,
        config.tracking.background_budget_secs,
        config.tracking.distance_filter_m,
        config.tracking.max_sample_age_secs,
        config.tracking.upload_retry_count,
        path_to_string(&config.logging.file),
    )
}

/// Convert path to string, collapsing the home dir to ~.
fn path_to_string(path: &Path) -> String {
    if let Some(home) = dirs::home_dir() {
        if let Ok(stripped) = path.strip_prefix(&home) {
            return format!("~/{}", stripped.display());
        }
    }
    path.display().to_string()
}
