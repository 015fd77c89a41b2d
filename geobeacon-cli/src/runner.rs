//! CLI runner for common setup.
//!
//! Encapsulates config loading and logging initialization so command
//! handlers start from a ready environment.

use geobeacon::config::ConfigFile;
use geobeacon::logging::{init_logging, split_log_path, LoggingGuard};
use tracing::info;

use crate::error::CliError;

/// Runner that manages CLI lifecycle and common operations.
pub struct CliRunner {
    /// Logging guard - keeps logging active while runner exists
    logging_guard: LoggingGuard,
    /// Loaded configuration file
    config: ConfigFile,
}

impl CliRunner {
    /// Create a new CLI runner with optional debug logging.
    ///
    /// Console logging is only enabled in debug mode; otherwise the console
    /// is left to the command's own output and logs go to the file.
    ///
    /// # Arguments
    ///
    /// * `debug_mode` - When true, enables debug-level logging regardless of RUST_LOG
    pub fn with_debug(debug_mode: bool) -> Result<Self, CliError> {
        // Load config file (or use defaults if not present)
        let config = ConfigFile::load()?;

        let (log_dir, log_file) = split_log_path(&config.logging.file);
        let logging_guard = init_logging(&log_dir, &log_file, debug_mode, debug_mode)
            .map_err(|e| CliError::LoggingInit(e.to_string()))?;

        Ok(Self {
            logging_guard,
            config,
        })
    }

    /// Get the loaded configuration.
    pub fn config(&self) -> &ConfigFile {
        &self.config
    }

    /// Path of the active log file.
    pub fn log_path(&self) -> &std::path::Path {
        self.logging_guard.log_path()
    }

    /// Log startup information for a command.
    pub fn log_startup(&self, command: &str) {
        info!("geobeacon v{}", geobeacon::VERSION);
        info!(
            log_file = %self.log_path().display(),
            "geobeacon CLI: {} command",
            command
        );
    }
}
