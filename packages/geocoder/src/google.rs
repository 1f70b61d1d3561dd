//! Google Geocoding API client.
//!
//! Responses always arrive as HTTP 200; the outcome is carried in the
//! top-level `status` field. `OK` with results is a hit, `ZERO_RESULTS`
//! is a clean miss, and anything else (`REQUEST_DENIED`,
//! `OVER_QUERY_LIMIT`, ...) is a provider failure.
//!
//! See <https://developers.google.com/maps/documentation/geocoding/requests-geocoding>

use rooftop_rain_models::Coordinate;

use crate::{GeocodeError, GeocodedAddress, GeocodingProvider, MatchQuality, retry};

/// Reads the API key from the named environment variable.
///
/// Returns `None` when the variable is unset or empty, in which case the
/// provider is skipped.
#[must_use]
pub fn api_key_from_env(var: &str) -> Option<String> {
    usable_key(std::env::var(var).ok())
}

fn usable_key(value: Option<String>) -> Option<String> {
    value.filter(|key| !key.trim().is_empty())
}

/// Geocodes a free-form address with the Google Geocoding API.
///
/// # Errors
///
/// Returns [`GeocodeError`] if the HTTP request fails or the API reports
/// anything other than a match or a clean miss.
pub async fn geocode_freeform(
    client: &reqwest::Client,
    base_url: &str,
    api_key: &str,
    region: Option<&str>,
    query: &str,
    max_retries: u32,
) -> Result<Option<GeocodedAddress>, GeocodeError> {
    let body = retry::send_json(
        || {
            let req = client
                .get(base_url)
                .query(&[("address", query), ("key", api_key)]);
            match region {
                Some(region) => req.query(&[("region", region)]),
                None => req,
            }
        },
        max_retries,
    )
    .await?;

    parse_response(&body)
}

/// Parses a Google Geocoding JSON response.
fn parse_response(body: &serde_json::Value) -> Result<Option<GeocodedAddress>, GeocodeError> {
    let status = body["status"].as_str().ok_or_else(|| GeocodeError::Parse {
        message: "Google response missing 'status'".to_string(),
    })?;

    match status {
        "OK" => {}
        "ZERO_RESULTS" => return Ok(None),
        "OVER_QUERY_LIMIT" => return Err(GeocodeError::RateLimited),
        other => {
            return Err(GeocodeError::Rejected {
                provider: GeocodingProvider::Google,
                status: other.to_string(),
                detail: body["error_message"]
                    .as_str()
                    .unwrap_or("no error_message given")
                    .to_string(),
            });
        }
    }

    let Some(first) = body["results"].as_array().and_then(|r| r.first()) else {
        return Ok(None);
    };

    let location = first.pointer("/geometry/location").ok_or_else(|| GeocodeError::Parse {
        message: "Result missing geometry.location".to_string(),
    })?;

    let lat = location["lat"].as_f64().ok_or_else(|| GeocodeError::Parse {
        message: "lat is not a number".to_string(),
    })?;
    let lng = location["lng"].as_f64().ok_or_else(|| GeocodeError::Parse {
        message: "lng is not a number".to_string(),
    })?;

    let quality = match first
        .pointer("/geometry/location_type")
        .and_then(serde_json::Value::as_str)
    {
        Some("ROOFTOP") => MatchQuality::Exact,
        _ => MatchQuality::Approximate,
    };

    Ok(Some(GeocodedAddress {
        coordinate: Coordinate::new(lat, lng),
        matched_address: first["formatted_address"].as_str().map(String::from),
        provider: GeocodingProvider::Google,
        match_quality: quality,
    }))
}
