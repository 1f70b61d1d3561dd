//! Address in, harvest estimate out.
//!
//! ```text
//!             ┌─> locate footprint ─> estimate area ──┐
//! geocode ──> ┤                                       ├─> combine
//!             └─> forecast rainfall (with timeout) ───┘
//! ```
//!
//! Geocoding must succeed before anything else runs. The two branches
//! run concurrently and either may fail without failing the request.

use std::sync::Arc;
use std::time::Duration;

use rooftop_rain_forecast::RainfallForecaster;
use rooftop_rain_forecast::forecaster::HistoricalForecaster;
use rooftop_rain_forecast::{ForecastError, PeriodForecast};
use rooftop_rain_geocoder::Geocoder;
use rooftop_rain_geocoder::resolver::ProviderResolver;
use rooftop_rain_models::{Coordinate, ImpactResult, RooftopArea};
use rooftop_rain_spatial::{AreaEstimator, FootprintIndex};

use crate::config::{FootprintFormat, HarvestConfig};
use crate::{ConfigError, HarvestError, aggregate};

/// One bounded retry per geocoding provider on transient failures.
const GEOCODE_RETRIES: u32 = 1;

/// Loads the configured footprint dataset into a spatial index.
///
/// # Errors
///
/// Returns [`ConfigError`] if the dataset cannot be opened or read.
pub fn load_footprints(config: &HarvestConfig) -> Result<FootprintIndex, ConfigError> {
    let path = &config.footprints.path;
    log::info!("Loading footprints from {}...", path.display());
    let index = match config.footprints.format {
        FootprintFormat::GeoJson => FootprintIndex::load_geojson(path)?,
        FootprintFormat::DuckDb => {
            let conn = duckdb::Connection::open_with_flags(
                path,
                duckdb::Config::default().access_mode(duckdb::AccessMode::ReadOnly)?,
            )?;
            FootprintIndex::load_duckdb(&conn)?
        }
    };
    if index.is_empty() {
        log::warn!("Footprint dataset {} is empty", path.display());
    }
    Ok(index)
}

/// Fits the rainfall model to the configured weather record.
///
/// # Errors
///
/// Returns [`ConfigError::Weather`] if the record cannot be loaded.
pub fn load_forecaster(config: &HarvestConfig) -> Result<HistoricalForecaster, ConfigError> {
    let forecast = &config.forecast;
    log::info!("Loading weather record from {}...", forecast.weather_csv.display());
    Ok(HistoricalForecaster::load(
        &forecast.weather_csv,
        config.service_area,
        forecast.ceiling_multiplier,
        forecast.model_version.clone(),
    )?)
}

/// The estimation pipeline and the read-only datasets it shares across
/// requests.
pub struct Pipeline {
    geocoder: Arc<dyn Geocoder>,
    index: Arc<FootprintIndex>,
    estimator: AreaEstimator,
    forecaster: Arc<dyn RainfallForecaster>,
    tolerance_m: f64,
    horizon: usize,
    runoff: f64,
    forecast_timeout: Duration,
}

impl Pipeline {
    /// Assembles a pipeline from already-loaded parts.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if a configured value is out of range.
    pub fn new(
        geocoder: Arc<dyn Geocoder>,
        index: Arc<FootprintIndex>,
        forecaster: Arc<dyn RainfallForecaster>,
        config: &HarvestConfig,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            geocoder,
            index,
            estimator: AreaEstimator::new(config.coefficients.effective_collection)?,
            forecaster,
            tolerance_m: config.footprints.tolerance_m,
            horizon: config.forecast.horizon,
            runoff: config.coefficients.runoff,
            forecast_timeout: config.timeouts.forecast(),
        })
    }

    /// Loads every dataset named by `config` and builds the live geocoder.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if any dataset fails to load.
    pub fn from_config(config: &HarvestConfig) -> Result<Self, ConfigError> {
        let geocoder = ProviderResolver::new(
            config.service_area,
            config.timeouts.geocode(),
            GEOCODE_RETRIES,
        )?;
        let index = load_footprints(config)?;
        let forecaster = load_forecaster(config)?;
        Self::new(
            Arc::new(geocoder),
            Arc::new(index),
            Arc::new(forecaster),
            config,
        )
    }

    /// The shared footprint index.
    #[must_use]
    pub fn footprints(&self) -> &FootprintIndex {
        &self.index
    }

    /// Version of the rainfall model in use.
    #[must_use]
    pub fn model_version(&self) -> &str {
        self.forecaster.version()
    }

    /// Produces the harvest estimate for `address`.
    ///
    /// # Errors
    ///
    /// Returns [`HarvestError::Geocode`] if the address cannot be resolved
    /// inside the service area, or the area branch's error when both
    /// branches fail.
    pub async fn estimate(&self, address: &str) -> Result<ImpactResult, HarvestError> {
        let resolved = self.geocoder.resolve(address).await?;
        let at = resolved.coordinate;
        log::debug!(
            "'{address}' resolved by {:?} to ({}, {})",
            resolved.provider,
            at.latitude,
            at.longitude
        );

        let (area, forecast) = tokio::join!(async { self.area_at(&at) }, self.forecast_at(&at));

        if let Err(e) = &area {
            log::warn!("Area unavailable for '{address}': {e}");
        }
        if let Err(e) = &forecast {
            log::warn!("Forecast unavailable for '{address}': {e}");
        }

        aggregate::combine(area, forecast, self.runoff)
    }

    fn area_at(&self, at: &Coordinate) -> Result<RooftopArea, HarvestError> {
        let footprint = self.index.locate(at, self.tolerance_m)?;
        log::debug!("located footprint {}", footprint.id);
        Ok(self.estimator.estimate(footprint)?)
    }

    async fn forecast_at(&self, at: &Coordinate) -> Result<Vec<PeriodForecast>, HarvestError> {
        let forecast = tokio::time::timeout(
            self.forecast_timeout,
            self.forecaster.forecast(at, self.horizon),
        )
        .await
        .map_err(|_| ForecastError::Timeout {
            seconds: self.forecast_timeout.as_secs(),
        })??;
        Ok(forecast)
    }
}

#[cfg(test)]
mod tests {
    use rooftop_rain_geocoder::{GeocodeError, GeocodedAddress, GeocodingProvider, MatchQuality};
    use rooftop_rain_models::{ErrorKind, Footprint};
    use rooftop_rain_spatial::projection::EARTH_RADIUS_M;

    use super::*;

    const HOME: Coordinate = Coordinate::new(51.5007, -0.1246);

    struct StubGeocoder(Option<Coordinate>);

    #[async_trait::async_trait]
    impl Geocoder for StubGeocoder {
        async fn resolve(&self, address: &str) -> Result<GeocodedAddress, GeocodeError> {
            self.0
                .map(|coordinate| GeocodedAddress {
                    coordinate,
                    matched_address: Some(address.to_string()),
                    provider: GeocodingProvider::Nominatim,
                    match_quality: MatchQuality::Exact,
                })
                .ok_or_else(|| GeocodeError::NoMatch {
                    address: address.to_string(),
                })
        }
    }

    struct StubForecaster {
        periods: Vec<PeriodForecast>,
        delay: Duration,
    }

    #[async_trait::async_trait]
    impl RainfallForecaster for StubForecaster {
        async fn forecast(
            &self,
            _at: &Coordinate,
            horizon: usize,
        ) -> Result<Vec<PeriodForecast>, ForecastError> {
            tokio::time::sleep(self.delay).await;
            Ok(self.periods.iter().take(horizon).copied().collect())
        }

        fn version(&self) -> &str {
            "stub"
        }
    }

    /// A `w` × `h` meter rectangle centred on `c`.
    fn rectangle(id: &str, c: Coordinate, w: f64, h: f64) -> Footprint {
        let dlat = (h / 2.0 / EARTH_RADIUS_M).to_degrees();
        let dlon = (w / 2.0 / EARTH_RADIUS_M).to_degrees() / c.latitude.to_radians().cos();
        Footprint {
            id: id.to_string(),
            ring: vec![
                Coordinate::new(c.latitude - dlat, c.longitude - dlon),
                Coordinate::new(c.latitude - dlat, c.longitude + dlon),
                Coordinate::new(c.latitude + dlat, c.longitude + dlon),
                Coordinate::new(c.latitude + dlat, c.longitude - dlon),
            ],
        }
    }

    fn config(effective_collection: f64) -> HarvestConfig {
        let mut config = HarvestConfig::default();
        config.coefficients.effective_collection = effective_collection;
        config.coefficients.runoff = 0.8;
        config.timeouts.forecast_secs = 1;
        config
    }

    fn pipeline(
        geocoded: Option<Coordinate>,
        footprints: Vec<Footprint>,
        delay: Duration,
        config: &HarvestConfig,
    ) -> Pipeline {
        Pipeline::new(
            Arc::new(StubGeocoder(geocoded)),
            Arc::new(FootprintIndex::from_footprints(footprints)),
            Arc::new(StubForecaster {
                periods: vec![PeriodForecast {
                    period: 2025,
                    rainfall_mm: 50.0,
                }],
                delay,
            }),
            config,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn full_estimate_for_a_located_roof() {
        let p = pipeline(
            Some(HOME),
            vec![rectangle("roof", HOME, 12.0, 10.0)],
            Duration::ZERO,
            &config(1.0),
        );
        let result = p.estimate("10 Downing Street, London").await.unwrap();

        let area = result.building_area.unwrap();
        assert!((area.effective_m2 - 120.0).abs() < 1e-3, "got {}", area.effective_m2);

        let records = result.predicted_rainfall.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].period, 2025);
        assert!((records[0].predicted_rainfall_mm - 50.0).abs() < f64::EPSILON);
        let liters = records[0].predicted_collection_liters.unwrap();
        assert!((liters - 4800.0).abs() < 0.1, "got {liters}");
        assert!(result.issues.is_empty());
    }

    #[tokio::test]
    async fn unresolvable_address_fails_the_request() {
        let p = pipeline(
            None,
            vec![rectangle("roof", HOME, 12.0, 10.0)],
            Duration::ZERO,
            &config(1.0),
        );
        let err = p.estimate("Nowhere").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Resolution);
    }

    #[tokio::test]
    async fn no_footprint_still_reports_rainfall() {
        let far = Coordinate::new(HOME.latitude + 0.01, HOME.longitude);
        let p = pipeline(
            Some(HOME),
            vec![rectangle("elsewhere", far, 12.0, 10.0)],
            Duration::ZERO,
            &config(1.0),
        );
        let result = p.estimate("10 Downing Street, London").await.unwrap();

        assert!(result.building_area.is_none());
        let records = result.predicted_rainfall.unwrap();
        assert!((records[0].predicted_rainfall_mm - 50.0).abs() < f64::EPSILON);
        assert!(records[0].predicted_collection_liters.is_none());
        assert_eq!(result.issues[0].kind, ErrorKind::NoFootprintFound);
    }

    #[tokio::test]
    async fn slow_forecast_times_out_but_area_is_kept() {
        let p = pipeline(
            Some(HOME),
            vec![rectangle("roof", HOME, 12.0, 10.0)],
            Duration::from_secs(5),
            &config(0.85),
        );
        let result = p.estimate("10 Downing Street, London").await.unwrap();

        let area = result.building_area.unwrap();
        assert!((area.effective_m2 - 102.0).abs() < 1e-3);
        assert!(result.predicted_rainfall.is_none());
        assert_eq!(result.issues[0].kind, ErrorKind::ForecastUnavailable);
    }

    #[tokio::test]
    async fn both_branches_failing_reports_the_area_error() {
        let p = pipeline(Some(HOME), Vec::new(), Duration::from_secs(5), &config(1.0));
        let err = p.estimate("10 Downing Street, London").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NoFootprintFound);
    }

    #[tokio::test]
    async fn repeated_estimates_are_identical() {
        let p = pipeline(
            Some(HOME),
            vec![rectangle("roof", HOME, 12.0, 10.0)],
            Duration::ZERO,
            &config(0.85),
        );
        let a = p.estimate("10 Downing Street, London").await.unwrap();
        let b = p.estimate("10 Downing Street, London").await.unwrap();
        assert_eq!(a, b);
        assert_eq!(p.model_version(), "stub");
        assert_eq!(p.footprints().len(), 1);
    }

    #[test]
    fn rejects_invalid_coefficients() {
        let mut bad = config(1.0);
        bad.coefficients.runoff = 0.0;
        let result = Pipeline::new(
            Arc::new(StubGeocoder(None)),
            Arc::new(FootprintIndex::from_footprints(Vec::new())),
            Arc::new(StubForecaster {
                periods: Vec::new(),
                delay: Duration::ZERO,
            }),
            &bad,
        );
        assert!(matches!(result, Err(ConfigError::Invalid { .. })));
    }
    #[test]
    fn loads_footprints_from_duckdb_file() {
        let path = std::env::temp_dir().join(format!(
            "rooftop_rain_footprints_{}.duckdb",
            std::process::id()
        ));
        let _ = std::fs::remove_file(&path);
        {
            let conn = duckdb::Connection::open(&path).unwrap();
            conn.execute_batch(
                r#"
                CREATE TABLE footprints (id VARCHAR, geojson VARCHAR);
                INSERT INTO footprints VALUES
                    ('roof', '{"type":"Polygon","coordinates":[[[-0.1247,51.5006],[-0.1245,51.5006],[-0.1245,51.5008],[-0.1247,51.5008],[-0.1247,51.5006]]]}'),
                    ('broken', 'not geojson');
                "#,
            )
            .unwrap();
        }

        let mut config = HarvestConfig::default();
        config.footprints.format = FootprintFormat::DuckDb;
        config.footprints.path.clone_from(&path);
        let index = load_footprints(&config).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(index.len(), 1);
        assert_eq!(index.locate(&HOME, 5.0).unwrap().id, "roof");
    }

    #[test]
    fn missing_duckdb_file_is_a_config_error() {
        let mut config = HarvestConfig::default();
        config.footprints.format = FootprintFormat::DuckDb;
        config.footprints.path = std::env::temp_dir().join("rooftop_rain_no_such_dir/footprints.duckdb");
        assert!(load_footprints(&config).is_err());
    }
}
