//! geobeacon - Position tracking with throttled uploads
//!
//! This library merges position samples from a platform location service
//! into a single best-fit position and uploads it to a remote endpoint,
//! throttled by distance moved and by a periodic timer. While the host
//! application is in the background it keeps tracking within a bounded
//! execution budget and falls back to significant-change monitoring.
//!
//! # High-Level API
//!
//! The [`tracking`] module provides the runtime:
//!
//! ```ignore
//! use geobeacon::config::ConfigFile;
//! use geobeacon::tracking::TrackingService;
//! use geobeacon::upload::HttpUploadClient;
//!
//! let config = ConfigFile::load()?;
//! let client = HttpUploadClient::new(config.upload_config())?;
//!
//! let (handle, task) = TrackingService::builder(config.tracking_config())
//!     .source(Box::new(source), platform_events)
//!     .spawn(Arc::new(client))?;
//! handle.start()?;
//! ```

pub mod config;
pub mod geo;
pub mod logging;
pub mod replay;
pub mod tracking;
pub mod upload;

/// Version of the geobeacon library and CLI.
///
/// This is synchronized across all components in the workspace.
/// The version is defined in `Cargo.toml` and injected at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
