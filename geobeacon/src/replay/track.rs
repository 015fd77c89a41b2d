//! Recorded track parsing.
//!
//! Tracks are plain CSV, one fix per line:
//!
//! ```text
//! # offset_secs,lat,lon,accuracy[,heading]
//! 0,51.4700,-0.4543,5
//! 30,51.4712,-0.4521,8,42.5
//! ```
//!
//! Blank lines and `#` comments are skipped, as is a leading header row.
//! Offsets are seconds from the start of the replay and must not decrease.

use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;

/// Errors loading a recorded track.
#[derive(Debug, Error)]
pub enum ReplayError {
    #[error("Failed to read track {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid track at line {line}: {reason}")]
    Parse { line: usize, reason: String },

    #[error("Track contains no points")]
    Empty,
}

/// One recorded fix.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackPoint {
    /// Time from the start of the replay.
    pub offset: Duration,
    pub latitude: f64,
    pub longitude: f64,
    /// Horizontal accuracy in meters, replayed as-is (zero or negative
    /// produces a sample the coordinator rejects).
    pub accuracy: f64,
    /// Heading in degrees, if recorded.
    pub heading: Option<f64>,
}

/// Load and parse a track file.
pub fn load_track(path: &Path) -> Result<Vec<TrackPoint>, ReplayError> {
    let text = std::fs::read_to_string(path).map_err(|source| ReplayError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_track(&text)
}

/// Parse track text.
pub fn parse_track(text: &str) -> Result<Vec<TrackPoint>, ReplayError> {
    let mut points: Vec<TrackPoint> = Vec::new();
    let mut seen_row = false;

    for (index, raw) in text.lines().enumerate() {
        let line_no = index + 1;
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let first_row = !seen_row;
        seen_row = true;

        let fields: Vec<&str> = line.split(',').map(str::trim).collect();
        if first_row && is_header(&fields) {
            continue;
        }

        let point = parse_row(&fields).map_err(|reason| ReplayError::Parse {
            line: line_no,
            reason,
        })?;

        if let Some(prev) = points.last() {
            if point.offset < prev.offset {
                return Err(ReplayError::Parse {
                    line: line_no,
                    reason: format!(
                        "offset {}s is earlier than previous {}s",
                        point.offset.as_secs_f64(),
                        prev.offset.as_secs_f64()
                    ),
                });
            }
        }

        points.push(point);
    }

    if points.is_empty() {
        return Err(ReplayError::Empty);
    }
    Ok(points)
}

fn is_header(fields: &[&str]) -> bool {
    fields
        .first()
        .and_then(|f| f.chars().next())
        .is_some_and(|c| c.is_ascii_alphabetic())
}

fn parse_row(fields: &[&str]) -> Result<TrackPoint, String> {
    if !(4..=5).contains(&fields.len()) {
        return Err(format!("expected 4 or 5 fields, found {}", fields.len()));
    }

    let number = |name: &str, value: &str| -> Result<f64, String> {
        value
            .parse::<f64>()
            .map_err(|_| format!("{} '{}' is not a number", name, value))
    };

    let offset = number("offset", fields[0])?;
    if !offset.is_finite() || offset < 0.0 {
        return Err(format!("offset '{}' must be a non-negative number", fields[0]));
    }

    let latitude = number("latitude", fields[1])?;
    if !(-90.0..=90.0).contains(&latitude) {
        return Err(format!("latitude {} out of range", latitude));
    }

    let longitude = number("longitude", fields[2])?;
    if !(-180.0..=180.0).contains(&longitude) {
        return Err(format!("longitude {} out of range", longitude));
    }

    let accuracy = number("accuracy", fields[3])?;

    let heading = match fields.get(4) {
        Some(value) if !value.is_empty() => Some(number("heading", value)?),
        _ => None,
    };

    Ok(TrackPoint {
        offset: Duration::from_secs_f64(offset),
        latitude,
        longitude,
        accuracy,
        heading,
    })
}
