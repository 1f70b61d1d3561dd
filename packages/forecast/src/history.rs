//! Historical daily weather records and their annual totals.
//!
//! The input is a daily weather CSV with at least a `date` column
//! (`YYYYMMDD`) and a `precipitation` column in millimeters. Other columns
//! (temperature, sunshine, ...) are ignored. A missing or unparseable
//! precipitation value counts as a dry day.

use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;

use chrono::{Datelike, NaiveDate};
use serde::Deserialize;

use crate::HistoryError;

#[derive(Debug, Deserialize)]
struct RawRecord {
    date: String,
    #[serde(default)]
    precipitation: Option<String>,
}

/// One day of observed precipitation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DailyRecord {
    /// Observation date.
    pub date: NaiveDate,
    /// Precipitation in millimeters.
    pub precipitation_mm: f64,
}

/// Total precipitation for one calendar year.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnnualTotal {
    /// Calendar year.
    pub year: i32,
    /// Summed precipitation in millimeters.
    pub rainfall_mm: f64,
}

/// Reads daily records from a weather CSV file.
///
/// # Errors
///
/// Returns [`HistoryError`] if the file cannot be opened, a row is
/// malformed, or a date is not `YYYYMMDD`.
pub fn load_daily(path: &Path) -> Result<Vec<DailyRecord>, HistoryError> {
    let file = std::fs::File::open(path)?;
    let records = read_daily(file)?;
    log::info!("Loaded {} daily weather records from {}", records.len(), path.display());
    Ok(records)
}

/// Reads daily records from any CSV source.
///
/// # Errors
///
/// Returns [`HistoryError`] if a row is malformed or a date is not
/// `YYYYMMDD`.
pub fn read_daily<R: Read>(reader: R) -> Result<Vec<DailyRecord>, HistoryError> {
    let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let mut records = Vec::new();

    for (line, row) in rdr.deserialize::<RawRecord>().enumerate() {
        let raw = row?;
        let date = parse_date(&raw.date).ok_or_else(|| HistoryError::Date {
            // Header is line 1.
            line: line + 2,
            value: raw.date.clone(),
        })?;
        let precipitation_mm = raw
            .precipitation
            .as_deref()
            .and_then(|p| p.parse::<f64>().ok())
            .filter(|p| p.is_finite() && *p >= 0.0)
            .unwrap_or(0.0);

        records.push(DailyRecord {
            date,
            precipitation_mm,
        });
    }

    Ok(records)
}

/// Parses `YYYYMMDD`, tolerating a trailing `.0` from float-typed exports.
fn parse_date(value: &str) -> Option<NaiveDate> {
    let value = value.strip_suffix(".0").unwrap_or(value);
    NaiveDate::parse_from_str(value, "%Y%m%d").ok()
}

/// Sums daily records into per-year totals, in ascending year order.
#[must_use]
pub fn annual_totals(records: &[DailyRecord]) -> Vec<AnnualTotal> {
    let mut by_year: BTreeMap<i32, f64> = BTreeMap::new();
    for record in records {
        *by_year.entry(record.date.year()).or_default() += record.precipitation_mm;
    }
    by_year
        .into_iter()
        .map(|(year, rainfall_mm)| AnnualTotal { year, rainfall_mm })
        .collect()
}

/// Summary of the historical record.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoricalSummary {
    /// Per-year totals, ascending.
    pub annual: Vec<AnnualTotal>,
    /// Mean of the annual totals.
    pub mean_annual_mm: f64,
    /// Wettest year's total.
    pub max_annual_mm: f64,
}

impl HistoricalSummary {
    /// Summarises annual totals. Returns `None` when there are none.
    #[must_use]
    pub fn from_annual(annual: Vec<AnnualTotal>) -> Option<Self> {
        if annual.is_empty() {
            return None;
        }
        #[allow(clippy::cast_precision_loss)]
        let mean_annual_mm =
            annual.iter().map(|a| a.rainfall_mm).sum::<f64>() / annual.len() as f64;
        let max_annual_mm = annual
            .iter()
            .map(|a| a.rainfall_mm)
            .fold(f64::NEG_INFINITY, f64::max);
        Some(Self {
            annual,
            mean_annual_mm,
            max_annual_mm,
        })
    }
}
