//! Recorded-track location source.
//!
//! Lets the tracking runtime run without a device: a CSV track is replayed
//! in tokio time onto whatever subscriptions the coordinator holds.

mod source;
mod track;

pub use source::{ReplayFeed, ReplayLocationSource, SIGNIFICANT_CHANGE_DISTANCE_M};
pub use track::{load_track, parse_track, ReplayError, TrackPoint};
