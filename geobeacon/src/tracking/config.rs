//! Tracking coordinator configuration.

use std::time::Duration;

use super::position::DEFAULT_MAX_SAMPLE_AGE;

/// Default upload cadence (2 minutes).
pub const DEFAULT_UPLOAD_INTERVAL: Duration = Duration::from_secs(120);

/// Default background polling budget (2 minutes).
pub const DEFAULT_BACKGROUND_BUDGET: Duration = Duration::from_secs(120);

/// Default minimum travel before a new upload (meters).
pub const DEFAULT_DISTANCE_FILTER_M: f64 = 100.0;

/// Default number of extra upload attempts.
pub const DEFAULT_UPLOAD_RETRY_COUNT: u32 = 2;

/// Default endpoint path for position uploads.
pub const DEFAULT_UPLOAD_PATH: &str = "location";

/// Tunables for [`TrackingCoordinator`](super::TrackingCoordinator).
#[derive(Debug, Clone, PartialEq)]
pub struct TrackingConfig {
    /// Period of the repeating upload timer, and the staleness threshold
    /// after which an upload is forced regardless of distance. Also the delay
    /// before background polling is restarted.
    pub upload_interval: Duration,

    /// Maximum time spent polling in the background. Zero disables the limit.
    pub background_budget: Duration,

    /// Minimum distance from the last sent position before uploading again.
    pub distance_filter_m: f64,

    /// Samples at least this old are rejected.
    pub max_sample_age: Duration,

    /// Extra attempts the upload client may make per upload.
    pub upload_retry_count: u32,

    /// Endpoint path positions are posted to.
    pub upload_path: String,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            upload_interval: DEFAULT_UPLOAD_INTERVAL,
            background_budget: DEFAULT_BACKGROUND_BUDGET,
            distance_filter_m: DEFAULT_DISTANCE_FILTER_M,
            max_sample_age: DEFAULT_MAX_SAMPLE_AGE,
            upload_retry_count: DEFAULT_UPLOAD_RETRY_COUNT,
            upload_path: DEFAULT_UPLOAD_PATH.to_string(),
        }
    }
}

impl TrackingConfig {
    pub fn with_upload_interval(mut self, interval: Duration) -> Self {
        self.upload_interval = interval;
        self
    }

    pub fn with_background_budget(mut self, budget: Duration) -> Self {
        self.background_budget = budget;
        self
    }

    pub fn with_distance_filter(mut self, meters: f64) -> Self {
        self.distance_filter_m = meters;
        self
    }

    pub fn with_max_sample_age(mut self, age: Duration) -> Self {
        self.max_sample_age = age;
        self
    }

    pub fn with_upload_retry_count(mut self, count: u32) -> Self {
        self.upload_retry_count = count;
        self
    }

    /// Delay before background polling restarts after a first sample.
    pub fn background_restart_delay(&self) -> Duration {
        self.upload_interval
    }
}
