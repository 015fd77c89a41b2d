//! CLI error handling with user-friendly messages.
//!
//! Centralizes error handling for the CLI, providing consistent formatting
//! and appropriate exit codes.

use std::fmt;
use std::process;

use geobeacon::config::ConfigFileError;
use geobeacon::replay::ReplayError;
use geobeacon::tracking::TrackingError;
use geobeacon::upload::UploadError;

/// CLI-specific errors with user-friendly messages.
#[derive(Debug)]
pub enum CliError {
    /// Failed to initialize logging
    LoggingInit(String),
    /// Configuration error
    Config(String),
    /// Failed to load the recorded track
    Track(ReplayError),
    /// Failed to create the upload client
    UploadClient(UploadError),
    /// Tracking runtime error
    Tracking(TrackingError),
    /// Failed to start the async runtime
    Runtime(std::io::Error),
}

impl CliError {
    /// Exit the process with an appropriate error message and code.
    pub fn exit(&self) -> ! {
        eprintln!("Error: {}", self);

        // Print additional help for specific errors
        match self {
            CliError::Track(ReplayError::Parse { .. }) => {
                eprintln!();
                eprintln!("Tracks are CSV with one fix per line:");
                eprintln!("  offset_secs,lat,lon,accuracy[,heading]");
                eprintln!("Offsets are seconds from the start and must not decrease.");
            }
            CliError::UploadClient(UploadError::InvalidUrl(_)) => {
                eprintln!();
                eprintln!("Check the endpoint with: geobeacon config get endpoint.base_url");
                eprintln!("Or use --dry-run to replay without uploading.");
            }
            _ => {}
        }

        process::exit(1)
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::LoggingInit(msg) => write!(f, "Failed to initialize logging: {}", msg),
            CliError::Config(msg) => write!(f, "Configuration error: {}", msg),
            CliError::Track(e) => write!(f, "Failed to load track: {}", e),
            CliError::UploadClient(e) => write!(f, "Failed to create upload client: {}", e),
            CliError::Tracking(e) => write!(f, "Tracking error: {}", e),
            CliError::Runtime(e) => write!(f, "Failed to start runtime: {}", e),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::Track(e) => Some(e),
            CliError::UploadClient(e) => Some(e),
            CliError::Tracking(e) => Some(e),
            CliError::Runtime(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ConfigFileError> for CliError {
    fn from(e: ConfigFileError) -> Self {
        CliError::Config(e.to_string())
    }
}

impl From<ReplayError> for CliError {
    fn from(e: ReplayError) -> Self {
        CliError::Track(e)
    }
}

impl From<UploadError> for CliError {
    fn from(e: UploadError) -> Self {
        CliError::UploadClient(e)
    }
}

impl From<TrackingError> for CliError {
    fn from(e: TrackingError) -> Self {
        CliError::Tracking(e)
    }
}
