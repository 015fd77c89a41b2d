//! Raw sample types and the validity predicates applied to them.
//!
//! - [`Position`] - A single location fix as delivered by a location source
//! - [`HeadingSample`] - A single compass reading
//!
//! Validation is deliberately simple: a position is trusted if it reports a
//! positive horizontal accuracy and is younger than the configured maximum
//! age. There is no accuracy-weighted fusion; the most recent trusted fix
//! wins.

use std::time::{Duration, Instant};

use crate::geo::distance_m;

/// Default maximum age for a position fix to be trusted (5 seconds).
pub const DEFAULT_MAX_SAMPLE_AGE: Duration = Duration::from_secs(5);

/// A single position fix.
///
/// Immutable once captured. `timestamp` is when the fix was measured, on the
/// same monotonic timeline as the coordinator's [`Clock`](super::Clock).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Position {
    /// Latitude in degrees (-90 to 90).
    pub latitude: f64,

    /// Longitude in degrees (-180 to 180).
    pub longitude: f64,

    /// Radius of uncertainty in meters. Zero or negative means invalid.
    pub horizontal_accuracy: f64,

    /// When this fix was measured.
    pub timestamp: Instant,
}

impl Position {
    /// Create a new position fix.
    pub fn new(latitude: f64, longitude: f64, horizontal_accuracy: f64, timestamp: Instant) -> Self {
        Self {
            latitude,
            longitude,
            horizontal_accuracy,
            timestamp,
        }
    }

    /// Position as (lat, lon).
    #[inline]
    pub fn coordinate(&self) -> (f64, f64) {
        (self.latitude, self.longitude)
    }

    /// Age of this fix relative to `now`.
    ///
    /// Fixes stamped in the future have an age of zero.
    pub fn age(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.timestamp)
    }

    /// Returns true if this fix is accurate and fresh enough to trust.
    pub fn is_valid_at(&self, now: Instant, max_age: Duration) -> bool {
        self.horizontal_accuracy > 0.0 && self.age(now) < max_age
    }

    /// Great-circle distance to another fix in meters.
    pub fn distance_to(&self, other: &Position) -> f64 {
        distance_m(self.coordinate(), other.coordinate())
    }
}

/// A single compass reading.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeadingSample {
    /// Heading relative to true north in degrees. Zero or negative when
    /// true north could not be determined.
    pub true_heading: f64,

    /// Heading relative to magnetic north in degrees.
    pub magnetic_heading: f64,

    /// Maximum deviation in degrees. Zero or negative means invalid.
    pub heading_accuracy: f64,
}

impl HeadingSample {
    /// Create a new heading sample.
    pub fn new(true_heading: f64, magnetic_heading: f64, heading_accuracy: f64) -> Self {
        Self {
            true_heading,
            magnetic_heading,
            heading_accuracy,
        }
    }

    /// Returns true if the reading carries a usable accuracy.
    #[inline]
    pub fn is_valid(&self) -> bool {
        self.heading_accuracy > 0.0
    }

    /// True heading when available, otherwise magnetic heading.
    pub fn effective_heading(&self) -> f64 {
        if self.true_heading > 0.0 {
            self.true_heading
        } else {
            self.magnetic_heading
        }
    }
}
