//! Upload request body and result.

use serde::{Deserialize, Serialize};

use super::error::UploadError;
use crate::tracking::Position;

/// JSON body posted to the location endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LocationBody {
    pub lat: f64,
    pub lng: f64,
}

impl LocationBody {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }
}

impl From<&Position> for LocationBody {
    fn from(position: &Position) -> Self {
        Self::new(position.latitude, position.longitude)
    }
}

/// Result of one upload call, after the client's own retries.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadOutcome {
    /// Whether the endpoint acknowledged the position.
    pub success: bool,

    /// Response body, if any was returned on success.
    pub payload: Option<Vec<u8>>,

    /// Failure reason, present when `success` is false.
    pub error: Option<UploadError>,
}

impl UploadOutcome {
    /// A successful upload.
    pub fn succeeded(payload: Option<Vec<u8>>) -> Self {
        Self {
            success: true,
            payload,
            error: None,
        }
    }

    /// A failed upload.
    pub fn failed(error: UploadError) -> Self {
        Self {
            success: false,
            payload: None,
            error: Some(error),
        }
    }

    /// Payload decoded as UTF-8, lossily.
    pub fn payload_text(&self) -> Option<String> {
        self.payload
            .as_ref()
            .map(|p| String::from_utf8_lossy(p).into_owned())
    }
}
