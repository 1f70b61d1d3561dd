//! Trend-plus-persistence model for annual rainfall.
//!
//! Fits an ordinary least-squares trend through the annual totals and the
//! lag-1 autocorrelation of what the trend leaves over. Forecasts follow
//! the trend, with the last observed anomaly decaying geometrically.
//! Everything is closed-form, so a given history always yields the same
//! forecast.

use crate::history::AnnualTotal;

/// Bound on the fitted persistence so anomalies always decay.
const MAX_PERSISTENCE: f64 = 0.95;

/// Below this many years there is no trend to fit; the model predicts the
/// historical mean.
pub const MIN_TREND_YEARS: usize = 3;

/// A fitted, immutable rainfall model.
#[derive(Debug, Clone, PartialEq)]
pub struct TrendModel {
    last_year: i32,
    mean_year: f64,
    mean_mm: f64,
    slope_mm_per_year: f64,
    persistence: f64,
    last_anomaly_mm: f64,
    max_observed_mm: f64,
}

impl TrendModel {
    /// Fits the model to annual totals (any order).
    ///
    /// Returns `None` when `annual` is empty.
    #[must_use]
    pub fn fit(annual: &[AnnualTotal]) -> Option<Self> {
        let mut annual = annual.to_vec();
        annual.sort_by_key(|a| a.year);
        let last = *annual.last()?;

        #[allow(clippy::cast_precision_loss)]
        let n = annual.len() as f64;
        let mean_year = annual.iter().map(|a| f64::from(a.year)).sum::<f64>() / n;
        let mean_mm = annual.iter().map(|a| a.rainfall_mm).sum::<f64>() / n;
        let max_observed_mm = annual
            .iter()
            .map(|a| a.rainfall_mm)
            .fold(f64::NEG_INFINITY, f64::max);

        if annual.len() < MIN_TREND_YEARS {
            log::debug!("only {} years of history, using the mean", annual.len());
            return Some(Self {
                last_year: last.year,
                mean_year,
                mean_mm,
                slope_mm_per_year: 0.0,
                persistence: 0.0,
                last_anomaly_mm: 0.0,
                max_observed_mm,
            });
        }

        let (sxy, sxx) = annual.iter().fold((0.0, 0.0), |(sxy, sxx), a| {
            let dx = f64::from(a.year) - mean_year;
            (dx.mul_add(a.rainfall_mm - mean_mm, sxy), dx.mul_add(dx, sxx))
        });
        let slope_mm_per_year = if sxx > 0.0 { sxy / sxx } else { 0.0 };

        let residuals: Vec<f64> = annual
            .iter()
            .map(|a| {
                a.rainfall_mm - slope_mm_per_year.mul_add(f64::from(a.year) - mean_year, mean_mm)
            })
            .collect();

        let energy: f64 = residuals.iter().map(|r| r * r).sum();
        let lagged: f64 = residuals.windows(2).map(|w| w[0] * w[1]).sum();
        let persistence = if energy > 0.0 {
            (lagged / energy).clamp(-MAX_PERSISTENCE, MAX_PERSISTENCE)
        } else {
            0.0
        };

        Some(Self {
            last_year: last.year,
            mean_year,
            mean_mm,
            slope_mm_per_year,
            persistence,
            last_anomaly_mm: residuals.last().copied().unwrap_or(0.0),
            max_observed_mm,
        })
    }

    /// Last year of the training history.
    #[must_use]
    pub const fn last_year(&self) -> i32 {
        self.last_year
    }

    /// Wettest observed annual total.
    #[must_use]
    pub const fn max_observed_mm(&self) -> f64 {
        self.max_observed_mm
    }

    /// Fitted trend in millimeters per year.
    #[must_use]
    pub const fn slope_mm_per_year(&self) -> f64 {
        self.slope_mm_per_year
    }

    /// Fitted lag-1 persistence of anomalies.
    #[must_use]
    pub const fn persistence(&self) -> f64 {
        self.persistence
    }

    /// Raw (unclipped) prediction for `year`, `steps` years past the end of
    /// the history.
    fn raw_prediction(&self, year: i32, steps: i32) -> f64 {
        let trend = self
            .slope_mm_per_year
            .mul_add(f64::from(year) - self.mean_year, self.mean_mm);
        self.persistence.powi(steps).mul_add(self.last_anomaly_mm, trend)
    }

    /// Predicts `horizon` consecutive years starting the year after the
    /// history ends. Each value is clipped to `[0, ceiling_mm]`.
    #[must_use]
    pub fn predict(&self, horizon: usize, ceiling_mm: f64) -> Vec<(i32, f64)> {
        let ceiling_mm = ceiling_mm.max(0.0);
        (1..=horizon)
            .map_while(|step| i32::try_from(step).ok())
            .map(|step| {
                let year = self.last_year + step;
                let raw = self.raw_prediction(year, step);
                let clipped = if raw.is_finite() {
                    raw.clamp(0.0, ceiling_mm)
                } else {
                    0.0
                };
                if (clipped - raw).abs() > f64::EPSILON {
                    log::debug!("clipped {year} prediction {raw:.1} mm to {clipped:.1} mm");
                }
                (year, clipped)
            })
            .collect()
    }
}
