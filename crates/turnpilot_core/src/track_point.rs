//! # Track Points
//!
//! A single 3-D sample on a road: latitude, longitude, altitude.
//!
//! ## Equality
//!
//! Coordinates are rounded to 5 decimal places when the point is built
//! (roughly 1 m at the equator) and compared with a tolerance, so two samples
//! of the same physical spot compare equal even when the game reports them
//! with slightly different precision.
//!
//! ## Proximity
//!
//! ```text
//! |Δlon| > 0.00013 ──► not close (cheap reject, no trigonometry)
//! otherwise        ──► haversine distance < 15 m
//! ```

use std::fmt;

use geo::{Bearing, Distance, Haversine, Point};

/// Decimal places kept for latitude and longitude.
const COORDINATE_PRECISION: f64 = 100_000.0;

/// Absolute tolerance used by [`TrackPoint`] equality.
pub const EQUALITY_TOLERANCE: f64 = 0.0001;

/// Longitude difference above which two points are never close.
const LONGITUDE_REJECT: f64 = 0.00013;

/// Distance in meters under which two points are considered close.
pub const CLOSE_DISTANCE_METERS: f64 = 15.0;

/// A position on the map.
#[derive(Clone, Copy, Debug)]
pub struct TrackPoint {
    latitude: f64,
    longitude: f64,
    altitude: f64,
    index: Option<usize>,
}

impl TrackPoint {
    /// Creates a point, rounding latitude and longitude to 5 decimals.
    #[must_use]
    pub fn new(latitude: f64, longitude: f64, altitude: f64) -> Self {
        Self {
            latitude: round_coordinate(latitude),
            longitude: round_coordinate(longitude),
            altitude,
            index: None,
        }
    }

    /// The "no position known" sentinel. Never close to anything.
    #[must_use]
    pub const fn unknown() -> Self {
        Self {
            latitude: f64::NAN,
            longitude: f64::NAN,
            altitude: f64::NAN,
            index: None,
        }
    }

    /// Returns the same point tagged with its index inside a segment.
    #[must_use]
    pub fn with_index(mut self, index: usize) -> Self {
        self.index = Some(index);
        self
    }

    /// Latitude in degrees.
    #[inline]
    #[must_use]
    pub const fn latitude(&self) -> f64 {
        self.latitude
    }

    /// Longitude in degrees.
    #[inline]
    #[must_use]
    pub const fn longitude(&self) -> f64 {
        self.longitude
    }

    /// Altitude in meters.
    #[inline]
    #[must_use]
    pub const fn altitude(&self) -> f64 {
        self.altitude
    }

    /// Index of this point inside its segment, if it belongs to one.
    #[inline]
    #[must_use]
    pub const fn index(&self) -> Option<usize> {
        self.index
    }

    /// Returns true for the [`TrackPoint::unknown`] sentinel.
    #[must_use]
    pub fn is_unknown(&self) -> bool {
        self.latitude.is_nan() || self.longitude.is_nan()
    }

    /// Great-circle distance to `other` in meters.
    #[must_use]
    pub fn distance_to(&self, other: &TrackPoint) -> f64 {
        Haversine.distance(self.as_geo(), other.as_geo())
    }

    /// Initial bearing towards `other` in degrees, in `[0, 360)`.
    #[must_use]
    pub fn bearing_to(&self, other: &TrackPoint) -> f64 {
        Haversine
            .bearing(self.as_geo(), other.as_geo())
            .rem_euclid(360.0)
    }

    /// Returns true when `other` is within [`CLOSE_DISTANCE_METERS`].
    #[must_use]
    pub fn is_close_to(&self, other: &TrackPoint) -> bool {
        // NaN comparisons are false, which also rejects the unknown sentinel.
        if !((self.longitude - other.longitude).abs() <= LONGITUDE_REJECT) {
            return false;
        }

        self.distance_to(other) < CLOSE_DISTANCE_METERS
    }

    fn as_geo(&self) -> Point<f64> {
        Point::new(self.longitude, self.latitude)
    }
}

impl PartialEq for TrackPoint {
    fn eq(&self, other: &Self) -> bool {
        (self.latitude - other.latitude).abs() < EQUALITY_TOLERANCE
            && (self.longitude - other.longitude).abs() < EQUALITY_TOLERANCE
            && (self.altitude - other.altitude).abs() < EQUALITY_TOLERANCE
    }
}

impl fmt::Display for TrackPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({:.5}, {:.5}, {:.1})",
            self.latitude, self.longitude, self.altitude
        )
    }
}

fn round_coordinate(value: f64) -> f64 {
    (value * COORDINATE_PRECISION).round() / COORDINATE_PRECISION
}
