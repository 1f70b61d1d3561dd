//! Forecaster backed by a model fitted to the city's weather record.

use std::path::Path;

use rooftop_rain_models::{BoundingBox, Coordinate};

use crate::history::{self, AnnualTotal, HistoricalSummary};
use crate::model::TrendModel;
use crate::{
    DEFAULT_CEILING_MULTIPLIER, ForecastError, HistoryError, PeriodForecast, RainfallForecaster,
};

/// A frozen [`TrendModel`] scoped to one spatial domain.
///
/// The record is city-wide, so every coordinate inside the domain gets the
/// same series.
#[derive(Debug, Clone)]
pub struct HistoricalForecaster {
    model: TrendModel,
    summary: HistoricalSummary,
    domain: BoundingBox,
    ceiling_mm: f64,
    version: String,
}

impl HistoricalForecaster {
    /// Fits a forecaster to annual totals.
    ///
    /// # Errors
    ///
    /// Returns [`HistoryError::Empty`] if `annual` is empty.
    pub fn from_annual(
        annual: Vec<AnnualTotal>,
        domain: BoundingBox,
        ceiling_multiplier: f64,
        version: impl Into<String>,
    ) -> Result<Self, HistoryError> {
        let summary = HistoricalSummary::from_annual(annual).ok_or(HistoryError::Empty)?;
        let model = TrendModel::fit(&summary.annual).ok_or(HistoryError::Empty)?;
        let multiplier = if ceiling_multiplier.is_finite() && ceiling_multiplier > 0.0 {
            ceiling_multiplier
        } else {
            log::warn!(
                "Ignoring ceiling multiplier {ceiling_multiplier}, using {DEFAULT_CEILING_MULTIPLIER}"
            );
            DEFAULT_CEILING_MULTIPLIER
        };
        let ceiling_mm = summary.max_annual_mm.max(0.0) * multiplier;
        let version = version.into();

        log::info!(
            "Fitted rainfall model {version}: {} years ending {}, trend {:+.2} mm/yr, persistence {:.2}",
            summary.annual.len(),
            model.last_year(),
            model.slope_mm_per_year(),
            model.persistence(),
        );

        Ok(Self {
            model,
            summary,
            domain,
            ceiling_mm,
            version,
        })
    }

    /// Loads a daily weather CSV and fits a forecaster to it.
    ///
    /// # Errors
    ///
    /// Returns [`HistoryError`] if the file cannot be read or holds no
    /// usable records.
    pub fn load(
        path: &Path,
        domain: BoundingBox,
        ceiling_multiplier: f64,
        version: impl Into<String>,
    ) -> Result<Self, HistoryError> {
        let daily = history::load_daily(path)?;
        Self::from_annual(
            history::annual_totals(&daily),
            domain,
            ceiling_multiplier,
            version,
        )
    }

    /// The historical record the model was fitted to.
    #[must_use]
    pub const fn summary(&self) -> &HistoricalSummary {
        &self.summary
    }

    /// Upper bound on any predicted year.
    #[must_use]
    pub const fn ceiling_mm(&self) -> f64 {
        self.ceiling_mm
    }

    /// Synchronous form of [`RainfallForecaster::forecast`].
    ///
    /// # Errors
    ///
    /// See [`RainfallForecaster::forecast`].
    pub fn predict(
        &self,
        at: &Coordinate,
        horizon: usize,
    ) -> Result<Vec<PeriodForecast>, ForecastError> {
        if horizon == 0 {
            return Err(ForecastError::InvalidHorizon { horizon });
        }
        if !at.is_valid() || !self.domain.contains(at) {
            return Err(ForecastError::OutsideDomain {
                latitude: at.latitude,
                longitude: at.longitude,
            });
        }

        Ok(self
            .model
            .predict(horizon, self.ceiling_mm)
            .into_iter()
            .map(|(period, rainfall_mm)| PeriodForecast {
                period,
                rainfall_mm,
            })
            .collect())
    }
}

#[async_trait::async_trait]
impl RainfallForecaster for HistoricalForecaster {
    async fn forecast(
        &self,
        at: &Coordinate,
        horizon: usize,
    ) -> Result<Vec<PeriodForecast>, ForecastError> {
        self.predict(at, horizon)
    }

    fn version(&self) -> &str {
        &self.version
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WESTMINSTER: Coordinate = Coordinate::new(51.4995, -0.1248);

    fn forecaster() -> HistoricalForecaster {
        let annual = [
            (2015, 557.0),
            (2016, 629.0),
            (2017, 512.0),
            (2018, 545.0),
            (2019, 701.0),
            (2020, 664.0),
        ]
        .into_iter()
        .map(|(year, rainfall_mm)| AnnualTotal { year, rainfall_mm })
        .collect();
        HistoricalForecaster::from_annual(annual, BoundingBox::greater_london(), 5.0, "test-v1")
            .unwrap()
    }

    #[tokio::test]
    async fn forecasts_consecutive_years_after_history() {
        let result = forecaster().forecast(&WESTMINSTER, 20).await.unwrap();
        assert_eq!(result.len(), 20);
        assert_eq!(result[0].period, 2021);
        assert!(result.windows(2).all(|w| w[1].period == w[0].period + 1));
    }

    #[tokio::test]
    async fn depths_stay_within_bounds() {
        let f = forecaster();
        let result = f.forecast(&WESTMINSTER, 50).await.unwrap();
        assert!((f.ceiling_mm() - 701.0 * 5.0).abs() < 1e-9);
        assert!(
            result
                .iter()
                .all(|p| p.rainfall_mm >= 0.0 && p.rainfall_mm <= f.ceiling_mm())
        );
    }

    #[tokio::test]
    async fn is_deterministic() {
        let f = forecaster();
        let a = f.forecast(&WESTMINSTER, 20).await.unwrap();
        let b = f.forecast(&WESTMINSTER, 20).await.unwrap();
        assert_eq!(a, b);
        assert_eq!(a, forecaster().forecast(&WESTMINSTER, 20).await.unwrap());
    }

    #[tokio::test]
    async fn zero_horizon_is_invalid() {
        let err = forecaster().forecast(&WESTMINSTER, 0).await.unwrap_err();
        assert!(matches!(err, ForecastError::InvalidHorizon { horizon: 0 }));
    }

    #[tokio::test]
    async fn outside_domain_is_unavailable() {
        let paris = Coordinate::new(48.8566, 2.3522);
        let err = forecaster().forecast(&paris, 5).await.unwrap_err();
        assert!(matches!(err, ForecastError::OutsideDomain { .. }));
    }

    #[test]
    fn reports_version_and_summary() {
        let f = forecaster();
        assert_eq!(f.version(), "test-v1");
        assert_eq!(f.summary().annual.len(), 6);
    }

    #[test]
    fn empty_history_fails_to_load() {
        let err = HistoricalForecaster::from_annual(
            Vec::new(),
            BoundingBox::greater_london(),
            5.0,
            "v",
        )
        .unwrap_err();
        assert!(matches!(err, HistoryError::Empty));
    }

    #[test]
    fn loads_from_csv() {
        let path = std::env::temp_dir().join(format!(
            "rooftop_rain_weather_{}.csv",
            std::process::id()
        ));
        std::fs::write(
            &path,
            "date,precipitation\n20190101,1.0\n20200101,2.0\n20210101,3.0\n",
        )
        .unwrap();
        let f = HistoricalForecaster::load(&path, BoundingBox::greater_london(), 5.0, "csv").unwrap();
        std::fs::remove_file(&path).unwrap();
        let result = f.predict(&WESTMINSTER, 1).unwrap();
        assert_eq!(result[0].period, 2022);
        assert!((result[0].rainfall_mm - 4.0).abs() < 1e-6);
    }
}
