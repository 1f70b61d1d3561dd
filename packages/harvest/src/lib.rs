#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Rooftop rainwater-harvesting estimates for a street address.
//!
//! The [`pipeline::Pipeline`] resolves the address, then runs two
//! branches concurrently: footprint lookup and area estimation, and
//! rainfall forecasting. The [`aggregate`] step combines them into an
//! [`ImpactResult`](rooftop_rain_models::ImpactResult), converting depth
//! to volume with the [`yield_calc`] model when both are available.

pub mod aggregate;
pub mod config;
pub mod pipeline;
pub mod yield_calc;

pub use config::HarvestConfig;
pub use pipeline::Pipeline;

use rooftop_rain_forecast::{ForecastError, HistoryError};
use rooftop_rain_geocoder::GeocodeError;
use rooftop_rain_models::ErrorKind;
use rooftop_rain_spatial::{LoadError, SpatialError};
use thiserror::Error;

/// Per-request failures.
#[derive(Debug, Error)]
pub enum HarvestError {
    /// Address resolution failed.
    #[error(transparent)]
    Geocode(#[from] GeocodeError),

    /// Footprint lookup or area estimation failed.
    #[error(transparent)]
    Spatial(#[from] SpatialError),

    /// Forecasting failed.
    #[error(transparent)]
    Forecast(#[from] ForecastError),

    /// A yield input was out of range.
    #[error("Invalid parameter: {message}")]
    InvalidParameter {
        /// What is wrong with it.
        message: String,
    },
}

impl HarvestError {
    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidParameter {
            message: message.into(),
        }
    }

    /// Maps this error onto the reported failure taxonomy.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Geocode(e) => e.kind(),
            Self::Spatial(e) => e.kind(),
            Self::Forecast(e) => e.kind(),
            Self::InvalidParameter { .. } => ErrorKind::InvalidParameter,
        }
    }
}

/// Startup failures: configuration and dataset loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Reading the configuration file failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The configuration file is not valid TOML for this schema.
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// A configuration value is out of range.
    #[error("Invalid configuration: {message}")]
    Invalid {
        /// What is wrong with it.
        message: String,
    },

    /// The footprint dataset could not be loaded.
    #[error("Footprint dataset: {0}")]
    Footprints(#[from] LoadError),

    /// Opening the footprint database failed.
    #[error("DuckDB error: {0}")]
    DuckDb(#[from] duckdb::Error),

    /// The weather record could not be loaded.
    #[error("Weather record: {0}")]
    Weather(#[from] HistoryError),

    /// The geocoding client could not be built.
    #[error("Geocoder: {0}")]
    Geocoder(#[from] GeocodeError),

    /// A coefficient was rejected by its stage.
    #[error("Spatial: {0}")]
    Spatial(#[from] SpatialError),
}

impl ConfigError {
    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid {
            message: message.into(),
        }
    }
}
