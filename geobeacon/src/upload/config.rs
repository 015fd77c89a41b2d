//! Endpoint configuration for the upload client.

use std::time::Duration;

/// Placeholder endpoint used until one is configured.
pub const DEFAULT_BASE_URL: &str = "http://localhost:8080/api/";

/// Default request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Connection settings for [`HttpUploadClient`](super::HttpUploadClient).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadConfig {
    /// Base URL the upload path is joined onto.
    pub base_url: String,

    /// Basic-auth username. Empty disables authentication.
    pub username: String,

    /// Basic-auth password.
    pub password: String,

    /// Per-request timeout.
    pub timeout: Duration,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            username: String::new(),
            password: String::new(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

impl UploadConfig {
    /// Create a config for `base_url` with defaults elsewhere.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Default::default()
        }
    }

    /// Set basic-auth credentials.
    pub fn with_credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = username.into();
        self.password = password.into();
        self
    }

    /// Set the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Returns true if basic auth should be sent.
    pub fn has_credentials(&self) -> bool {
        !self.username.is_empty()
    }
}
