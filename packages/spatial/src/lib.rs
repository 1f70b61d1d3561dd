#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Rooftop footprint lookup and area estimation.
//!
//! Loads building footprint polygons once at startup (from a `GeoJSON`
//! `FeatureCollection` or a `DuckDB` table), builds an R-tree over their
//! bounding boxes, and answers "which roof is at this coordinate"
//! queries. Rooftop area is measured in a local metric projection, never
//! in raw degrees.

pub mod area;
pub mod index;
pub mod projection;

pub use area::{AreaEstimator, DEFAULT_EFFECTIVE_COLLECTION};
pub use index::{DEFAULT_TOLERANCE_M, FootprintIndex, FootprintStats};

use rooftop_rain_models::ErrorKind;
use thiserror::Error;

/// Per-query spatial failures.
#[derive(Debug, Error)]
pub enum SpatialError {
    /// Nothing in the dataset contains or lies near the coordinate.
    #[error("No footprint within {tolerance_m} m of ({latitude}, {longitude})")]
    NoFootprintFound {
        /// Queried latitude.
        latitude: f64,
        /// Queried longitude.
        longitude: f64,
        /// Search radius used.
        tolerance_m: f64,
    },

    /// The footprint cannot be measured.
    #[error("Footprint {id} is degenerate: {message}")]
    DegenerateGeometry {
        /// Footprint id.
        id: String,
        /// What is wrong with it.
        message: String,
    },

    /// A coefficient or radius was out of range.
    #[error("Invalid parameter: {message}")]
    InvalidParameter {
        /// What is wrong with it.
        message: String,
    },
}

impl SpatialError {
    /// Maps this error onto the reported failure taxonomy.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::NoFootprintFound { .. } => ErrorKind::NoFootprintFound,
            Self::DegenerateGeometry { .. } => ErrorKind::DegenerateGeometry,
            Self::InvalidParameter { .. } => ErrorKind::InvalidParameter,
        }
    }
}

/// Failures while loading the footprint dataset.
#[derive(Debug, Error)]
pub enum LoadError {
    /// Reading the dataset file failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The file is not valid `GeoJSON`.
    #[error("GeoJSON error: {0}")]
    GeoJson(#[from] Box<geojson::Error>),

    /// Querying the footprint table failed.
    #[error("DuckDB error: {0}")]
    DuckDb(#[from] duckdb::Error),
}

impl From<geojson::Error> for LoadError {
    fn from(e: geojson::Error) -> Self {
        Self::GeoJson(Box::new(e))
    }
}
