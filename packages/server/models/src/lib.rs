#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! API request and response types for the rooftop rain server.
//!
//! These types are serialized to JSON for the REST API. They are separate
//! from the pipeline types to allow independent evolution of the API
//! contract.

use std::collections::BTreeMap;

use rooftop_rain_models::{ErrorKind, ImpactResult, Issue, RainfallPeriodRecord};
use serde::{Deserialize, Serialize};

/// Body of `POST /api/impact`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImpactRequest {
    /// Free-text street address.
    pub address: String,
}

/// One forecast period in an impact response.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ApiPeriod {
    /// Predicted rainfall depth, millimeters.
    pub predicted_rainfall_mm: f64,
    /// Predicted collection, liters. Absent when the rooftop area is
    /// unknown.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub predicted_collection_liters: Option<f64>,
}

impl From<&RainfallPeriodRecord> for ApiPeriod {
    fn from(record: &RainfallPeriodRecord) -> Self {
        Self {
            predicted_rainfall_mm: record.predicted_rainfall_mm,
            predicted_collection_liters: record.predicted_collection_liters,
        }
    }
}

/// Successful impact response.
///
/// Periods are keyed by their year label; four-digit years sort in
/// forecast order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiImpactResponse {
    /// Effective rooftop area, square meters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub building_area: Option<f64>,
    /// Forecast keyed by period label.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub predicted_rainfall: Option<BTreeMap<String, ApiPeriod>>,
    /// Parts that were omitted and why.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub issues: Vec<Issue>,
}

impl From<ImpactResult> for ApiImpactResponse {
    fn from(result: ImpactResult) -> Self {
        Self {
            building_area: result.building_area.map(|a| a.effective_m2),
            predicted_rainfall: result.predicted_rainfall.map(|records| {
                records
                    .iter()
                    .map(|r| (r.period.to_string(), ApiPeriod::from(r)))
                    .collect()
            }),
            issues: result.issues,
        }
    }
}

/// Error body for any failed request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiError {
    /// Failure reason.
    pub kind: ErrorKind,
    /// Human-readable detail.
    pub message: String,
}

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiHealth {
    /// Whether the server is healthy.
    pub healthy: bool,
    /// Server version.
    pub version: String,
    /// Rainfall model version.
    pub model_version: String,
    /// Number of indexed footprints.
    pub footprints: usize,
}

#[cfg(test)]
mod tests {
    use rooftop_rain_models::RooftopArea;
    use serde_json::json;

    use super::*;

    #[test]
    fn full_response_shape() {
        let response = ApiImpactResponse::from(ImpactResult {
            building_area: Some(RooftopArea {
                raw_m2: 141.0,
                effective_m2: 120.0,
            }),
            predicted_rainfall: Some(vec![RainfallPeriodRecord {
                period: 2025,
                predicted_rainfall_mm: 50.0,
                predicted_collection_liters: Some(4800.0),
            }]),
            issues: Vec::new(),
        });
        assert_eq!(
            serde_json::to_value(&response).unwrap(),
            json!({
                "building_area": 120.0,
                "predicted_rainfall": {
                    "2025": {
                        "predicted_rainfall_mm": 50.0,
                        "predicted_collection_liters": 4800.0
                    }
                }
            })
        );
    }

    #[test]
    fn partial_response_omits_missing_fields() {
        let response = ApiImpactResponse::from(ImpactResult {
            building_area: None,
            predicted_rainfall: Some(vec![RainfallPeriodRecord {
                period: 2025,
                predicted_rainfall_mm: 50.0,
                predicted_collection_liters: None,
            }]),
            issues: vec![Issue {
                kind: ErrorKind::NoFootprintFound,
                message: "none".to_string(),
            }],
        });
        assert_eq!(
            serde_json::to_value(&response).unwrap(),
            json!({
                "predicted_rainfall": {
                    "2025": { "predicted_rainfall_mm": 50.0 }
                },
                "issues": [{ "kind": "NoFootprintFoundError", "message": "none" }]
            })
        );
    }

    #[test]
    fn health_is_camel_case() {
        let health = ApiHealth {
            healthy: true,
            version: "0.1.0".to_string(),
            model_version: "v1".to_string(),
            footprints: 3,
        };
        assert_eq!(
            serde_json::to_value(&health).unwrap(),
            json!({ "healthy": true, "version": "0.1.0", "modelVersion": "v1", "footprints": 3 })
        );
    }
}
