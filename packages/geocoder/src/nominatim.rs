//! Nominatim / OpenStreetMap geocoder client.
//!
//! Used as the keyless fallback when Google is not configured or cannot
//! match. The public instance allows **1 request per second**; one
//! lookup per estimate stays well inside that.
//!
//! See <https://nominatim.org/release-docs/develop/api/Search/>

use rooftop_rain_models::Coordinate;
use serde::Deserialize;

use crate::{GeocodeError, GeocodedAddress, GeocodingProvider, MatchQuality, retry};

/// Geocodes a free-form address using Nominatim.
///
/// # Errors
///
/// Returns [`GeocodeError`] if the HTTP request or response parsing fails.
pub async fn geocode_freeform(
    client: &reqwest::Client,
    base_url: &str,
    country_code: &str,
    query: &str,
    max_retries: u32,
) -> Result<Option<GeocodedAddress>, GeocodeError> {
    let body = retry::send_json(
        || {
            client.get(base_url).query(&[
                ("q", query),
                ("countrycodes", country_code),
                ("format", "jsonv2"),
                ("limit", "1"),
            ])
        },
        max_retries,
    )
    .await?;

    parse_response(&body)
}

/// One entry of a `jsonv2` search response. Coordinates arrive as
/// strings.
#[derive(Debug, Deserialize)]
struct Place {
    lat: String,
    lon: String,
    display_name: Option<String>,
    addresstype: Option<String>,
}

impl Place {
    fn coordinate(&self) -> Result<Coordinate, GeocodeError> {
        let parse = |name: &str, value: &str| {
            value.parse::<f64>().map_err(|_| GeocodeError::Parse {
                message: format!("Nominatim {name} '{value}' is not a number"),
            })
        };
        Ok(Coordinate::new(
            parse("lat", &self.lat)?,
            parse("lon", &self.lon)?,
        ))
    }
}

/// Parses a Nominatim `jsonv2` search response.
fn parse_response(body: &serde_json::Value) -> Result<Option<GeocodedAddress>, GeocodeError> {
    let places = Vec::<Place>::deserialize(body).map_err(|e| GeocodeError::Parse {
        message: format!("unexpected Nominatim response: {e}"),
    })?;

    let Some(place) = places.into_iter().next() else {
        return Ok(None);
    };

    // Building-level hits are as good as an address match gets here.
    let match_quality = match place.addresstype.as_deref() {
        Some("building" | "house") => MatchQuality::Exact,
        _ => MatchQuality::Approximate,
    };

    Ok(Some(GeocodedAddress {
        coordinate: place.coordinate()?,
        matched_address: place.display_name,
        provider: GeocodingProvider::Nominatim,
        match_quality,
    }))
}
