//! Core data structures shared by the engine and candidate sources.
//!
//! - [`Location`] - Query coordinate pair
//! - [`BBox`] - Inclusive axis-aligned bounding box in degrees
//! - [`FeatureId`] - Row id of a feature
//! - [`FeatureCandidate`] - One row returned by a spatial index probe

use geo_types::Point;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Feature row id (`fid` in GeoPackage tables).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FeatureId(pub i64);

impl fmt::Display for FeatureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A coordinate pair in decimal degrees.
///
/// Datasets are stored with longitude on the x axis and latitude on the y axis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    /// Latitude in decimal degrees (-90 to 90)
    pub latitude: f64,
    /// Longitude in decimal degrees (-180 to 180)
    pub longitude: f64,
}

impl Location {
    /// Constructs a new Location from coordinates.
    ///
    /// # Examples
    ///
    /// ```
    /// use tinygpkg::Location;
    ///
    /// let loc = Location::new(48.8566, 2.3522);
    /// assert_eq!(loc.latitude, 48.8566);
    /// assert_eq!(loc.longitude, 2.3522);
    /// ```
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// The location as an x/y point (x = longitude, y = latitude).
    pub fn to_point(&self) -> Point<f64> {
        Point::new(self.longitude, self.latitude)
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.latitude, self.longitude)
    }
}

/// Axis-aligned bounding box, bounds inclusive on all sides.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BBox {
    pub min_x: f64,
    pub max_x: f64,
    pub min_y: f64,
    pub max_y: f64,
}

impl BBox {
    pub fn new(min_x: f64, max_x: f64, min_y: f64, max_y: f64) -> Self {
        Self {
            min_x,
            max_x,
            min_y,
            max_y,
        }
    }

    /// Degenerate box whose min and max both equal the location.
    ///
    /// ```
    /// use tinygpkg::{BBox, Location};
    ///
    /// let b = BBox::from_location(Location::new(46.0, 14.5));
    /// assert_eq!(b, BBox::new(14.5, 14.5, 46.0, 46.0));
    /// ```
    pub fn from_location(location: Location) -> Self {
        Self::new(
            location.longitude,
            location.longitude,
            location.latitude,
            location.latitude,
        )
    }

    /// Check if this bbox intersects another, touching edges included.
    pub fn intersects(&self, other: &BBox) -> bool {
        self.min_x <= other.max_x
            && self.max_x >= other.min_x
            && self.min_y <= other.max_y
            && self.max_y >= other.min_y
    }
}

/// One feature row produced by a [`CandidateSource`](crate::CandidateSource).
///
/// `blob` borrows from the source's current row and is only valid for the
/// duration of the visit.
#[derive(Debug)]
pub struct FeatureCandidate<'a> {
    pub id: FeatureId,
    pub blob: &'a [u8],
    /// One value per requested column, in request order.
    pub attributes: Vec<String>,
}
