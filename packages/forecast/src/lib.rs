#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Annual rainfall forecasting for the serviced city.
//!
//! A [`RainfallForecaster`] turns a coordinate and a horizon into an
//! ordered list of per-year rainfall depths. The shipped implementation,
//! [`forecaster::HistoricalForecaster`], fits a [`model::TrendModel`] to
//! the city's historical daily weather record once at startup and answers
//! every query from that fitted model.

pub mod forecaster;
pub mod history;
pub mod model;

use rooftop_rain_models::{Coordinate, ErrorKind};
use thiserror::Error;

/// Default number of forecast years.
pub const DEFAULT_HORIZON: usize = 20;

/// Default ceiling on any single year, as a multiple of the wettest
/// observed year.
pub const DEFAULT_CEILING_MULTIPLIER: f64 = 5.0;

/// Failures while reading the historical weather record.
#[derive(Debug, Error)]
pub enum HistoryError {
    /// Opening the file failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A row could not be parsed.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// A date was not in `YYYYMMDD` form.
    #[error("Invalid date '{value}' on line {line}")]
    Date {
        /// 1-based line number, counting the header.
        line: usize,
        /// The offending value.
        value: String,
    },

    /// The record contains no usable days.
    #[error("Weather record is empty")]
    Empty,
}

/// Per-query forecast failures.
#[derive(Debug, Error)]
pub enum ForecastError {
    /// The model was not trained for this location.
    #[error("No rainfall model covers ({latitude}, {longitude})")]
    OutsideDomain {
        /// Queried latitude.
        latitude: f64,
        /// Queried longitude.
        longitude: f64,
    },

    /// A zero-length forecast was requested.
    #[error("Forecast horizon must be at least 1, got {horizon}")]
    InvalidHorizon {
        /// The requested horizon.
        horizon: usize,
    },

    /// The forecaster did not answer in time.
    #[error("Forecast did not complete within {seconds}s")]
    Timeout {
        /// Configured timeout.
        seconds: u64,
    },
}

impl ForecastError {
    /// Maps this error onto the reported failure taxonomy.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidHorizon { .. } => ErrorKind::InvalidParameter,
            Self::OutsideDomain { .. } | Self::Timeout { .. } => ErrorKind::ForecastUnavailable,
        }
    }
}

/// Predicted rainfall depth for one period.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PeriodForecast {
    /// Calendar year.
    pub period: i32,
    /// Predicted depth in millimeters, never negative.
    pub rainfall_mm: f64,
}

/// Predicts per-period rainfall depth at a location.
#[async_trait::async_trait]
pub trait RainfallForecaster: Send + Sync {
    /// Forecasts `horizon` consecutive periods at `at`, ordered by period.
    ///
    /// # Errors
    ///
    /// Returns [`ForecastError::InvalidHorizon`] when `horizon` is zero and
    /// [`ForecastError::OutsideDomain`] when the location is not covered.
    async fn forecast(
        &self,
        at: &Coordinate,
        horizon: usize,
    ) -> Result<Vec<PeriodForecast>, ForecastError>;

    /// Identifies the fitted model so results can be traced to it.
    fn version(&self) -> &str;
}
