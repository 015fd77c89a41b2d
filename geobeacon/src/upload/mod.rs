//! Remote position upload.
//!
//! The tracking coordinator decides *when* to upload; this module does the
//! posting. [`UploadClient`] is the seam: [`HttpUploadClient`] talks to the
//! real endpoint with bounded retry, [`DryRunUploadClient`] acknowledges
//! locally.
//!
//! # Wire format
//!
//! `POST {base_url}/location` with body `{"lat": <f64>, "lng": <f64>}` and,
//! when a username is configured, HTTP basic auth.

mod client;
mod config;
mod error;
mod types;

pub use client::{DryRunUploadClient, HttpUploadClient, UploadClient};
pub use config::{UploadConfig, DEFAULT_BASE_URL, DEFAULT_TIMEOUT_SECS};
pub use error::UploadError;
pub use types::{LocationBody, UploadOutcome};
