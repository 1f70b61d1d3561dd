//! Combines the area branch and the forecast branch into one result.

use rooftop_rain_forecast::PeriodForecast;
use rooftop_rain_models::{ImpactResult, Issue, RainfallPeriodRecord, RooftopArea};

use crate::HarvestError;
use crate::yield_calc::collected_liters;

/// Builds per-period records, with volumes only when an area is known.
///
/// Order follows `forecast`.
///
/// # Errors
///
/// Returns [`HarvestError::InvalidParameter`] if a volume cannot be
/// computed from the inputs.
pub fn period_records(
    area: Option<&RooftopArea>,
    forecast: &[PeriodForecast],
    runoff: f64,
) -> Result<Vec<RainfallPeriodRecord>, HarvestError> {
    forecast
        .iter()
        .map(|p| {
            let predicted_collection_liters = area
                .map(|a| collected_liters(a.effective_m2, p.rainfall_mm, runoff))
                .transpose()?;
            Ok(RainfallPeriodRecord {
                period: p.period,
                predicted_rainfall_mm: p.rainfall_mm,
                predicted_collection_liters,
            })
        })
        .collect()
}

/// Merges the outcome of both branches.
///
/// A failed branch omits its part and is listed in `issues`. When both
/// fail, the area branch's error is returned.
///
/// # Errors
///
/// Returns the area error if neither branch succeeded, or
/// [`HarvestError::InvalidParameter`] if volumes cannot be computed.
pub fn combine(
    area: Result<RooftopArea, HarvestError>,
    forecast: Result<Vec<PeriodForecast>, HarvestError>,
    runoff: f64,
) -> Result<ImpactResult, HarvestError> {
    match (area, forecast) {
        (Err(area_err), Err(forecast_err)) => {
            log::debug!("forecast also failed: {forecast_err}");
            Err(area_err)
        }
        (area, forecast) => {
            let mut issues = Vec::new();
            let building_area = match area {
                Ok(a) => Some(a),
                Err(e) => {
                    issues.push(issue(&e));
                    None
                }
            };
            let forecast = match forecast {
                Ok(f) => Some(f),
                Err(e) => {
                    issues.push(issue(&e));
                    None
                }
            };

            let predicted_rainfall = forecast
                .map(|f| period_records(building_area.as_ref(), &f, runoff))
                .transpose()?;

            Ok(ImpactResult {
                building_area,
                predicted_rainfall,
                issues,
            })
        }
    }
}

fn issue(err: &HarvestError) -> Issue {
    Issue {
        kind: err.kind(),
        message: err.to_string(),
    }
}
