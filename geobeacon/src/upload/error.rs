//! Upload error types.

use thiserror::Error;

/// Errors produced by an upload attempt.
///
/// Cloneable so a single outcome can be fanned out to several observers;
/// transport errors are therefore carried as rendered messages.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UploadError {
    /// The request could not be sent or the response could not be read.
    #[error("HTTP request failed: {message}")]
    Http { message: String, timeout: bool },

    /// The endpoint answered with a non-success status.
    #[error("HTTP {status} from endpoint: {body}")]
    Status { status: u16, body: String },

    /// Base URL and path do not form a valid URL.
    #[error("Invalid upload URL '{0}'")]
    InvalidUrl(String),

    /// The HTTP client could not be constructed.
    #[error("Failed to create HTTP client: {0}")]
    ClientBuild(String),
}

impl UploadError {
    /// Returns true if another attempt might succeed.
    ///
    /// Transport failures, server errors and rate limiting are retryable.
    /// Client errors and local failures are not.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Http { .. } => true,
            Self::Status { status, .. } => *status >= 500 || *status == 429,
            Self::InvalidUrl(_) | Self::ClientBuild(_) => false,
        }
    }

    pub(crate) fn from_reqwest(e: &reqwest::Error) -> Self {
        Self::Http {
            message: e.to_string(),
            timeout: e.is_timeout(),
        }
    }
}
