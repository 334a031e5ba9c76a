//! Geographic primitives: coordinate validation and great-circle distance.
//!
//! Every radius comparison in rozgar goes through [`haversine_m`]. Callers
//! must not substitute planar distance; the cell grid in `geoindex` only
//! pre-filters candidates and re-checks with the exact formula.

use crate::error::{Result, RozgarError};
use serde::{Deserialize, Serialize};

/// Mean Earth radius in meters, per the spherical haversine model.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// A validated WGS84 coordinate pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct Point {
    /// Latitude in degrees, [-90, 90].
    pub latitude: f64,
    /// Longitude in degrees, [-180, 180].
    pub longitude: f64,
}

impl Point {
    /// Validate and construct a point.
    ///
    /// Rejects non-finite values and out-of-range degrees with
    /// [`RozgarError::InvalidCoordinate`].
    pub fn new(latitude: f64, longitude: f64) -> Result<Self> {
        if !latitude.is_finite() || !longitude.is_finite() {
            return Err(RozgarError::InvalidCoordinate(format!(
                "non-finite coordinates ({latitude}, {longitude})"
            )));
        }
        if !(-90.0..=90.0).contains(&latitude) {
            return Err(RozgarError::InvalidCoordinate(format!(
                "latitude {latitude} out of range [-90, 90]"
            )));
        }
        if !(-180.0..=180.0).contains(&longitude) {
            return Err(RozgarError::InvalidCoordinate(format!(
                "longitude {longitude} out of range [-180, 180]"
            )));
        }
        Ok(Self {
            latitude,
            longitude,
        })
    }

    /// Distance in meters from this point to `other`.
    pub fn distance_m(&self, other: &Point) -> f64 {
        haversine_m(self.latitude, self.longitude, other.latitude, other.longitude)
    }
}

/// Great-circle distance in meters between two coordinate pairs.
///
/// Spherical haversine on a sphere of radius [`EARTH_RADIUS_M`]. This is the
/// authoritative distance semantics for the whole service.
pub fn haversine_m(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let d_phi = (lat2 - lat1).to_radians();
    let d_lambda = (lon2 - lon1).to_radians();

    let a = (d_phi / 2.0).sin().powi(2)
        + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_M * c
}
