//! User configuration stored in `~/.geobeacon/config.ini`.
//!
//! The INI file carries three sections:
//!
//! - `[endpoint]` - where and how positions are uploaded
//! - `[tracking]` - upload interval, distance filter and background budget
//! - `[logging]` - log file location
//!
//! [`ConfigFile`] is the parsed form; [`ConfigFile::tracking_config`] and
//! [`ConfigFile::upload_config`] turn it into the runtime structs the
//! tracking and upload modules consume.
//!
//! # Example
//!
//! ```no_run
//! use geobeacon::config::ConfigFile;
//!
//! let config = ConfigFile::load()?;
//! let tracking = config.tracking_config();
//! assert!(tracking.upload_interval.as_secs() > 0);
//! # Ok::<(), geobeacon::config::ConfigFileError>(())
//! ```

mod defaults;
mod file;
mod keys;
mod parser;
mod settings;
mod writer;

pub use defaults::{
    default_log_path, CONFIG_DIR_NAME, CONFIG_FILE_NAME, DEFAULT_BACKGROUND_BUDGET_SECS,
    DEFAULT_LOG_FILE_NAME, DEFAULT_MAX_SAMPLE_AGE_SECS, DEFAULT_UPLOAD_INTERVAL_SECS,
    MAX_TRACKING_PERIOD_SECS, MAX_UPLOAD_RETRY_COUNT,
};
pub use file::{config_directory, config_file_path, ConfigFileError};
pub use keys::{ConfigKey, ConfigKeyError};
pub use settings::{ConfigFile, EndpointSettings, LoggingSettings, TrackingSettings};
