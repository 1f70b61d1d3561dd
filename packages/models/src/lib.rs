#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Shared domain types for rooftop rainwater-harvesting estimates.
//!
//! Every stage of the estimation pipeline (geocoding, footprint lookup,
//! area estimation, forecasting, yield conversion) speaks in these types.
//! They carry no identity and are created fresh for each query.

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// A WGS84 coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    /// Latitude in decimal degrees.
    pub latitude: f64,
    /// Longitude in decimal degrees.
    pub longitude: f64,
}

impl Coordinate {
    /// Creates a coordinate from latitude and longitude.
    #[must_use]
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Whether both components are finite numbers within the valid
    /// latitude/longitude ranges.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }
}

/// A geographic bounding box in WGS84 coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    /// Western longitude boundary.
    pub west: f64,
    /// Southern latitude boundary.
    pub south: f64,
    /// Eastern longitude boundary.
    pub east: f64,
    /// Northern latitude boundary.
    pub north: f64,
}

impl BoundingBox {
    /// Creates a new bounding box from the given coordinates.
    #[must_use]
    pub const fn new(west: f64, south: f64, east: f64, north: f64) -> Self {
        Self {
            west,
            south,
            east,
            north,
        }
    }

    /// Greater London, the serviced city.
    #[must_use]
    pub const fn greater_london() -> Self {
        Self::new(-0.5104, 51.2868, 0.3340, 51.6919)
    }

    /// Whether the coordinate lies inside (or on the edge of) this box.
    #[must_use]
    pub fn contains(&self, coordinate: &Coordinate) -> bool {
        (self.south..=self.north).contains(&coordinate.latitude)
            && (self.west..=self.east).contains(&coordinate.longitude)
    }
}

impl Default for BoundingBox {
    fn default() -> Self {
        Self::greater_london()
    }
}

/// A building footprint: the outline of a roof as recorded in the
/// footprint dataset.
///
/// The ring is stored open (no duplicated closing vertex), in whatever
/// winding order the source used.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Footprint {
    /// Identifier from the source dataset.
    pub id: String,
    /// Ordered ring vertices.
    pub ring: Vec<Coordinate>,
}

/// Rooftop area derived from a located footprint.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RooftopArea {
    /// Planar footprint area in square meters.
    pub raw_m2: f64,
    /// Collectible area after the effective-collection coefficient.
    pub effective_m2: f64,
}

/// Predicted rainfall and collection for a single forecast period.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RainfallPeriodRecord {
    /// Period label (calendar year).
    pub period: i32,
    /// Predicted rainfall depth in millimeters.
    pub predicted_rainfall_mm: f64,
    /// Predicted collection volume in liters. Absent when no rooftop
    /// area could be established for the query.
    pub predicted_collection_liters: Option<f64>,
}

/// Failure reasons surfaced to callers.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
pub enum ErrorKind {
    /// The address could not be matched to any location.
    #[serde(rename = "ResolutionError")]
    #[strum(serialize = "ResolutionError")]
    Resolution,
    /// The matched location is outside the serviced city.
    #[serde(rename = "OutOfServiceAreaError")]
    #[strum(serialize = "OutOfServiceAreaError")]
    OutOfServiceArea,
    /// No building footprint at or near the location.
    #[serde(rename = "NoFootprintFoundError")]
    #[strum(serialize = "NoFootprintFoundError")]
    NoFootprintFound,
    /// The located footprint has no usable area.
    #[serde(rename = "DegenerateGeometryError")]
    #[strum(serialize = "DegenerateGeometryError")]
    DegenerateGeometry,
    /// The rainfall model cannot predict for the location.
    #[serde(rename = "ForecastUnavailableError")]
    #[strum(serialize = "ForecastUnavailableError")]
    ForecastUnavailable,
    /// An input was out of its valid range.
    #[serde(rename = "InvalidParameterError")]
    #[strum(serialize = "InvalidParameterError")]
    InvalidParameter,
}

impl ErrorKind {
    /// Whether the failure is about the requested address itself (bad
    /// input, unknown place, or no building there) rather than a dataset
    /// or model fault on the service side.
    #[must_use]
    pub const fn is_client_error(self) -> bool {
        matches!(
            self,
            Self::InvalidParameter
                | Self::Resolution
                | Self::OutOfServiceArea
                | Self::NoFootprintFound
        )
    }
}

/// A stage failure that was tolerated because the other branch of the
/// pipeline still produced a result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    /// Failure reason.
    pub kind: ErrorKind,
    /// Human-readable detail.
    pub message: String,
}

/// The aggregate returned for one address query.
///
/// Either part may be absent when its branch of the pipeline failed; the
/// corresponding failure is listed in `issues`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImpactResult {
    /// Rooftop area, when a footprint was located.
    pub building_area: Option<RooftopArea>,
    /// Per-period forecast in period order, when forecasting succeeded.
    pub predicted_rainfall: Option<Vec<RainfallPeriodRecord>>,
    /// Failures of the branch that did not contribute.
    pub issues: Vec<Issue>,
}

impl ImpactResult {
    /// Whether one of the two parts is missing.
    #[must_use]
    pub const fn is_partial(&self) -> bool {
        self.building_area.is_none() || self.predicted_rainfall.is_none()
    }
}
