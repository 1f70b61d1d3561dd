//! Lookups against a self-hosted Pelias `/v1/search` endpoint.
//!
//! Disabled in the shipped provider list; enable it when a local
//! instance with GB data is running.
//!
//! See <https://github.com/pelias/documentation/blob/master/search.md>

use rooftop_rain_models::Coordinate;
use serde::Deserialize;

use crate::{GeocodeError, GeocodedAddress, GeocodingProvider, MatchQuality, retry};

/// Returns the best Pelias match for `query` within `country_code`, or
/// `None` when the instance has nothing.
///
/// # Errors
///
/// Returns [`GeocodeError`] when the request fails after `max_retries`
/// or the body is not a `FeatureCollection`.
pub async fn geocode_freeform(
    client: &reqwest::Client,
    base_url: &str,
    country_code: &str,
    query: &str,
    max_retries: u32,
) -> Result<Option<GeocodedAddress>, GeocodeError> {
    let endpoint = format!("{}/v1/search", base_url.trim_end_matches('/'));
    let params = [
        ("text", query),
        ("boundary.country", country_code),
        ("size", "1"),
    ];

    let body = retry::send_json(|| client.get(&endpoint).query(&params), max_retries).await?;

    parse_response(&body)
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    features: Vec<SearchFeature>,
}

#[derive(Debug, Deserialize)]
struct SearchFeature {
    geometry: PointGeometry,
    #[serde(default)]
    properties: FeatureProperties,
}

#[derive(Debug, Deserialize)]
struct PointGeometry {
    /// `[longitude, latitude]`
    coordinates: Vec<f64>,
}

#[derive(Debug, Default, Deserialize)]
struct FeatureProperties {
    label: Option<String>,
    confidence: Option<f64>,
    match_type: Option<String>,
}

impl FeatureProperties {
    /// `match_type` is authoritative when present; older Pelias builds
    /// only report `confidence`.
    fn quality(&self) -> MatchQuality {
        let exact = match self.match_type.as_deref() {
            Some(kind) => kind == "exact",
            None => self.confidence.is_some_and(|c| c >= 0.9),
        };
        if exact {
            MatchQuality::Exact
        } else {
            MatchQuality::Approximate
        }
    }
}

/// Parses a Pelias `/v1/search` `FeatureCollection`.
fn parse_response(body: &serde_json::Value) -> Result<Option<GeocodedAddress>, GeocodeError> {
    let response = SearchResponse::deserialize(body).map_err(|e| GeocodeError::Parse {
        message: format!("unexpected Pelias response: {e}"),
    })?;

    let Some(feature) = response.features.into_iter().next() else {
        return Ok(None);
    };

    let [longitude, latitude, ..] = feature.geometry.coordinates[..] else {
        return Err(GeocodeError::Parse {
            message: format!(
                "Pelias point has {} coordinate(s), need 2",
                feature.geometry.coordinates.len()
            ),
        });
    };

    let match_quality = feature.properties.quality();
    Ok(Some(GeocodedAddress {
        coordinate: Coordinate::new(latitude, longitude),
        matched_address: feature.properties.label,
        provider: GeocodingProvider::Pelias,
        match_quality,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collection(coordinates: &[f64], properties: &serde_json::Value) -> serde_json::Value {
        serde_json::json!({
            "type": "FeatureCollection",
            "features": [{
                "type": "Feature",
                "geometry": { "type": "Point", "coordinates": coordinates },
                "properties": properties
            }]
        })
    }

    #[test]
    fn exact_match_reads_lon_lat_order() {
        let body = collection(
            &[-0.0761, 51.5081],
            &serde_json::json!({ "label": "Tower of London", "match_type": "exact" }),
        );
        let hit = parse_response(&body).unwrap().unwrap();
        assert!((hit.coordinate.latitude - 51.5081).abs() < 1e-9);
        assert!((hit.coordinate.longitude + 0.0761).abs() < 1e-9);
        assert_eq!(hit.provider, GeocodingProvider::Pelias);
        assert_eq!(hit.match_quality, MatchQuality::Exact);
        assert_eq!(hit.matched_address.as_deref(), Some("Tower of London"));
    }

    #[test]
    fn no_features_is_a_miss() {
        let body = serde_json::json!({ "type": "FeatureCollection", "features": [] });
        assert!(parse_response(&body).unwrap().is_none());
    }

    #[test]
    fn interpolated_match_is_approximate_even_with_high_confidence() {
        let body = collection(
            &[-0.1419, 51.5014],
            &serde_json::json!({ "confidence": 0.99, "match_type": "interpolated" }),
        );
        let hit = parse_response(&body).unwrap().unwrap();
        assert_eq!(hit.match_quality, MatchQuality::Approximate);
        assert!(hit.matched_address.is_none());
    }

    #[test]
    fn confidence_decides_without_match_type() {
        let high = collection(&[-0.12, 51.5], &serde_json::json!({ "confidence": 0.9 }));
        let low = collection(&[-0.12, 51.5], &serde_json::json!({ "confidence": 0.5 }));
        let missing = collection(&[-0.12, 51.5], &serde_json::json!({}));
        let quality = |body: serde_json::Value| parse_response(&body).unwrap().unwrap().match_quality;
        assert_eq!(quality(high), MatchQuality::Exact);
        assert_eq!(quality(low), MatchQuality::Approximate);
        assert_eq!(quality(missing), MatchQuality::Approximate);
    }

    #[test]
    fn single_coordinate_is_a_parse_error() {
        let body = collection(&[-0.1], &serde_json::json!({}));
        assert!(matches!(
            parse_response(&body),
            Err(GeocodeError::Parse { .. })
        ));
    }
}
