//! Pipeline configuration loaded from `rooftop_rain.toml`.
//!
//! Every section and every field has a default, so an empty or missing
//! file yields a working London configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use rooftop_rain_forecast::{DEFAULT_CEILING_MULTIPLIER, DEFAULT_HORIZON};
use rooftop_rain_models::BoundingBox;
use rooftop_rain_spatial::{DEFAULT_EFFECTIVE_COLLECTION, DEFAULT_TOLERANCE_M};
use serde::{Deserialize, Serialize};

use crate::ConfigError;
use crate::yield_calc::DEFAULT_RUNOFF_COEFFICIENT;

/// Default configuration file name, looked up in the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "rooftop_rain.toml";

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarvestConfig {
    /// Bounding box of the serviced city.
    pub service_area: BoundingBox,
    /// Footprint dataset.
    pub footprints: FootprintConfig,
    /// Rainfall model.
    pub forecast: ForecastConfig,
    /// Area and yield coefficients.
    pub coefficients: CoefficientConfig,
    /// Stage timeouts.
    pub timeouts: TimeoutConfig,
}

/// Where footprints are stored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FootprintFormat {
    /// A `GeoJSON` `FeatureCollection` file.
    #[default]
    GeoJson,
    /// A `DuckDB` database with a `footprints` table.
    DuckDb,
}

/// `[footprints]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FootprintConfig {
    /// Dataset path.
    pub path: PathBuf,
    /// Dataset format.
    pub format: FootprintFormat,
    /// Search radius around the resolved coordinate, meters.
    pub tolerance_m: f64,
}

impl Default for FootprintConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("data/footprints.geojson"),
            format: FootprintFormat::default(),
            tolerance_m: DEFAULT_TOLERANCE_M,
        }
    }
}

/// `[forecast]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForecastConfig {
    /// Historical daily weather CSV.
    pub weather_csv: PathBuf,
    /// Number of forecast years.
    pub horizon: usize,
    /// Ceiling on any year as a multiple of the wettest observed year.
    pub ceiling_multiplier: f64,
    /// Label reported with every forecast.
    pub model_version: String,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            weather_csv: PathBuf::from("data/london_weather.csv"),
            horizon: DEFAULT_HORIZON,
            ceiling_multiplier: DEFAULT_CEILING_MULTIPLIER,
            model_version: "trend-ar1-v1".to_string(),
        }
    }
}

/// `[coefficients]`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoefficientConfig {
    /// Share of the footprint that collects rain.
    pub effective_collection: f64,
    /// Share of rain on the collecting surface that reaches storage.
    pub runoff: f64,
}

impl Default for CoefficientConfig {
    fn default() -> Self {
        Self {
            effective_collection: DEFAULT_EFFECTIVE_COLLECTION,
            runoff: DEFAULT_RUNOFF_COEFFICIENT,
        }
    }
}

/// `[timeouts]`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Per-provider geocoding timeout, seconds.
    pub geocode_secs: u64,
    /// Forecast timeout, seconds.
    pub forecast_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            geocode_secs: 10,
            forecast_secs: 10,
        }
    }
}

impl TimeoutConfig {
    /// Geocoding timeout as a [`Duration`].
    #[must_use]
    pub const fn geocode(&self) -> Duration {
        Duration::from_secs(self.geocode_secs)
    }

    /// Forecast timeout as a [`Duration`].
    #[must_use]
    pub const fn forecast(&self) -> Duration {
        Duration::from_secs(self.forecast_secs)
    }
}

impl HarvestConfig {
    /// Parses a configuration from TOML text and validates it.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the text is not valid TOML for this
    /// schema or a value is out of range.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads the configuration at `path`, falling back to defaults when the
    /// file does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file exists but cannot be read,
    /// parsed or validated.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            log::info!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&text)?;
        log::info!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Checks every value is in its valid range.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first bad value.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let area = &self.service_area;
        if !(area.west < area.east && area.south < area.north) {
            return Err(ConfigError::invalid("service_area must have west < east and south < north"));
        }
        if !(self.footprints.tolerance_m.is_finite() && self.footprints.tolerance_m >= 0.0) {
            return Err(ConfigError::invalid("footprints.tolerance_m must be >= 0"));
        }
        if self.forecast.horizon == 0 {
            return Err(ConfigError::invalid("forecast.horizon must be at least 1"));
        }
        if !(self.forecast.ceiling_multiplier.is_finite() && self.forecast.ceiling_multiplier > 0.0) {
            return Err(ConfigError::invalid("forecast.ceiling_multiplier must be > 0"));
        }
        for (name, value) in [
            ("coefficients.effective_collection", self.coefficients.effective_collection),
            ("coefficients.runoff", self.coefficients.runoff),
        ] {
            if !(value > 0.0 && value <= 1.0) {
                return Err(ConfigError::invalid(format!("{name} must be in (0, 1], got {value}")));
            }
        }
        if self.timeouts.geocode_secs == 0 || self.timeouts.forecast_secs == 0 {
            return Err(ConfigError::invalid("timeouts must be at least 1 second"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_yields_defaults() {
        let config = HarvestConfig::from_toml_str("").unwrap();
        assert_eq!(config, HarvestConfig::default());
        assert_eq!(config.service_area, BoundingBox::greater_london());
        assert_eq!(config.forecast.horizon, 20);
        assert!((config.footprints.tolerance_m - 25.0).abs() < f64::EPSILON);
        assert!((config.coefficients.effective_collection - 0.85).abs() < f64::EPSILON);
        assert!((config.coefficients.runoff - 0.8).abs() < f64::EPSILON);
        assert!((config.forecast.ceiling_multiplier - 5.0).abs() < f64::EPSILON);
        assert_eq!(config.timeouts.geocode(), Duration::from_secs(10));
    }

    #[test]
    fn shipped_config_matches_defaults() {
        let config =
            HarvestConfig::from_toml_str(include_str!("../../../rooftop_rain.toml")).unwrap();
        assert_eq!(config, HarvestConfig::default());
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config = HarvestConfig::from_toml_str(
            r#"
            [footprints]
            path = "data/roofs.duckdb"
            format = "duckdb"

            [coefficients]
            runoff = 0.9
            "#,
        )
        .unwrap();
        assert_eq!(config.footprints.format, FootprintFormat::DuckDb);
        assert_eq!(config.footprints.path, PathBuf::from("data/roofs.duckdb"));
        assert!((config.footprints.tolerance_m - 25.0).abs() < f64::EPSILON);
        assert!((config.coefficients.runoff - 0.9).abs() < f64::EPSILON);
        assert!((config.coefficients.effective_collection - 0.85).abs() < f64::EPSILON);
    }

    #[test]
    fn rejects_out_of_range_coefficients() {
        let err = HarvestConfig::from_toml_str("[coefficients]\nrunoff = 1.5\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
        assert!(HarvestConfig::from_toml_str("[forecast]\nhorizon = 0\n").is_err());
    }

    #[test]
    fn rejects_unknown_format() {
        let err = HarvestConfig::from_toml_str("[footprints]\nformat = \"shapefile\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::Toml(_)));
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let config = HarvestConfig::load(Path::new("does/not/exist.toml")).unwrap();
        assert_eq!(config, HarvestConfig::default());
    }
}
