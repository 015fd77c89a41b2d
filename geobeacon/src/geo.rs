//! Great-circle helpers for the distance filter.
//!
//! Distances are computed with the haversine formula on a spherical Earth,
//! which is accurate to well under a meter at the 100m scale the upload
//! filter works at.

/// Mean Earth radius in meters.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

const DEG_TO_RAD: f64 = std::f64::consts::PI / 180.0;

/// Calculate the great-circle distance between two positions.
///
/// # Arguments
///
/// * `from` - First position as (latitude, longitude) in degrees
/// * `to` - Second position as (latitude, longitude) in degrees
///
/// # Returns
///
/// Distance in meters.
///
/// # Example
///
/// ```
/// use geobeacon::geo::distance_m;
///
/// // 0.0014° of latitude is roughly 156m
/// let dist = distance_m((10.0, 20.0), (10.0014, 20.0));
/// assert!((dist - 155.7).abs() < 1.0);
/// ```
pub fn distance_m(from: (f64, f64), to: (f64, f64)) -> f64 {
    let (lat1, lon1) = from;
    let (lat2, lon2) = to;

    let lat1_rad = lat1 * DEG_TO_RAD;
    let lat2_rad = lat2 * DEG_TO_RAD;
    let delta_lat = (lat2 - lat1) * DEG_TO_RAD;
    let delta_lon = (lon2 - lon1) * DEG_TO_RAD;

    let a = (delta_lat / 2.0).sin().powi(2)
        + lat1_rad.cos() * lat2_rad.cos() * (delta_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().min(1.0).asin();

    EARTH_RADIUS_M * c
}
