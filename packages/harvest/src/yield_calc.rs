//! Rain depth over a collecting area to stored volume.
//!
//! One millimeter of rain over one square meter is exactly one liter, so
//! the conversion is `area_m2 * depth_mm * runoff`.

use rooftop_rain_forecast::history::AnnualTotal;

use crate::HarvestError;

/// Share of rain on the roof that reaches storage after first-flush,
/// splash and evaporation losses.
pub const DEFAULT_RUNOFF_COEFFICIENT: f64 = 0.8;

/// Collected volume in liters.
///
/// # Errors
///
/// Returns [`HarvestError::InvalidParameter`] if the area or depth is
/// negative or non-finite, or the runoff coefficient is not in `(0, 1]`.
pub fn collected_liters(area_m2: f64, depth_mm: f64, runoff: f64) -> Result<f64, HarvestError> {
    if !(area_m2.is_finite() && area_m2 >= 0.0) {
        return Err(HarvestError::invalid(format!(
            "area must be a non-negative number, got {area_m2}"
        )));
    }
    if !(depth_mm.is_finite() && depth_mm >= 0.0) {
        return Err(HarvestError::invalid(format!(
            "rainfall depth must be a non-negative number, got {depth_mm}"
        )));
    }
    if !(runoff > 0.0 && runoff <= 1.0) {
        return Err(HarvestError::invalid(format!(
            "runoff coefficient must be in (0, 1], got {runoff}"
        )));
    }
    Ok(area_m2 * depth_mm * runoff)
}

/// Volume a roof of `area_m2` would have collected in each recorded year,
/// as `(year, liters)` in record order.
///
/// # Errors
///
/// Same as [`collected_liters`], for the first year that fails.
pub fn annual_collection(
    annual: &[AnnualTotal],
    area_m2: f64,
    runoff: f64,
) -> Result<Vec<(i32, f64)>, HarvestError> {
    annual
        .iter()
        .map(|a| Ok((a.year, collected_liters(area_m2, a.rainfall_mm, runoff)?)))
        .collect()
}
