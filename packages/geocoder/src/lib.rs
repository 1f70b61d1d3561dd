#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Address resolution for rooftop rain estimates.
//!
//! Converts a free-text street address into a WGS84 coordinate using a
//! multi-provider strategy configured in `services/providers.toml`:
//!
//! 1. **Google Geocoding API** (priority 1): needs `GOOGLE_MAPS_API_KEY`;
//!    skipped when the key is not set.
//! 2. **Nominatim / OpenStreetMap** (priority 2): free, no key.
//! 3. **Pelias** (priority 3, disabled by default): self-hosted.
//!
//! Providers are loaded from the [`service_registry`] and tried in
//! priority order by the [`resolver::ProviderResolver`]. Every request
//! carries a timeout; a provider that fails is logged and skipped, so a
//! flaky provider never takes the pipeline down with it.

pub mod google;
pub mod nominatim;
pub mod pelias;
pub mod resolver;
pub mod retry;
pub mod service_registry;

use rooftop_rain_models::{Coordinate, ErrorKind};
use thiserror::Error;

/// A geocoding result with coordinates and metadata.
#[derive(Debug, Clone)]
pub struct GeocodedAddress {
    /// Resolved location (WGS84).
    pub coordinate: Coordinate,
    /// The matched/canonical address returned by the geocoder.
    pub matched_address: Option<String>,
    /// Which provider resolved this address.
    pub provider: GeocodingProvider,
    /// Whether this was an exact or approximate match.
    pub match_quality: MatchQuality,
}

/// Which geocoding provider resolved an address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeocodingProvider {
    /// Google Geocoding API.
    Google,
    /// Nominatim / OpenStreetMap.
    Nominatim,
    /// Self-hosted Pelias geocoder.
    Pelias,
}

/// Quality of the geocoding match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchQuality {
    /// Exact address match.
    Exact,
    /// Approximate / non-exact match.
    Approximate,
}

/// Errors from geocoding operations.
#[derive(Debug, Error)]
pub enum GeocodeError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Response parsing failed.
    #[error("Parse error: {message}")]
    Parse {
        /// Description of the parsing failure.
        message: String,
    },

    /// Rate limit exceeded.
    #[error("Rate limit exceeded")]
    RateLimited,

    /// The provider returned a server error.
    #[error("Provider returned status {status}")]
    Status {
        /// HTTP status code.
        status: u16,
    },

    /// The provider did not answer in time.
    #[error("{provider} did not respond within {seconds}s")]
    Timeout {
        /// Service id.
        provider: String,
        /// Configured timeout.
        seconds: u64,
    },

    /// The address was empty after trimming.
    #[error("Address is empty")]
    EmptyAddress,

    /// The provider answered but refused the lookup (bad key, quota,
    /// malformed request).
    #[error("{provider:?} rejected the request with {status}: {detail}")]
    Rejected {
        /// Provider that refused.
        provider: GeocodingProvider,
        /// Provider status code, e.g. `REQUEST_DENIED`.
        status: String,
        /// Provider-supplied explanation.
        detail: String,
    },

    /// No provider matched the address.
    #[error("No location found for '{address}'")]
    NoMatch {
        /// The query as submitted.
        address: String,
    },

    /// The address resolved outside the serviced area.
    #[error("'{address}' resolved to ({latitude}, {longitude}), outside the service area")]
    OutOfServiceArea {
        /// The query as submitted.
        address: String,
        /// Resolved latitude.
        latitude: f64,
        /// Resolved longitude.
        longitude: f64,
    },
}

impl GeocodeError {
    /// Maps this error onto the reported failure taxonomy.
    ///
    /// Provider failures of any sort count as resolution failures.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::EmptyAddress => ErrorKind::InvalidParameter,
            Self::OutOfServiceArea { .. } => ErrorKind::OutOfServiceArea,
            Self::Http(_)
            | Self::Parse { .. }
            | Self::RateLimited
            | Self::Status { .. }
            | Self::Rejected { .. }
            | Self::Timeout { .. }
            | Self::NoMatch { .. } => ErrorKind::Resolution,
        }
    }

    /// Whether a single retry against the same provider is worthwhile.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            Self::RateLimited | Self::Timeout { .. } => true,
            Self::Status { status } => *status >= 500,
            Self::Rejected { status, .. } => status == "UNKNOWN_ERROR",
            _ => false,
        }
    }
}

/// Resolves free-text addresses to coordinates.
#[async_trait::async_trait]
pub trait Geocoder: Send + Sync {
    /// Resolves `address` to a coordinate inside the service area.
    ///
    /// # Errors
    ///
    /// Returns [`GeocodeError::EmptyAddress`] for blank input,
    /// [`GeocodeError::OutOfServiceArea`] when the match is outside the
    /// service boundary and another [`GeocodeError`] when no provider
    /// could match the address.
    async fn resolve(&self, address: &str) -> Result<GeocodedAddress, GeocodeError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_follow_taxonomy() {
        assert_eq!(GeocodeError::EmptyAddress.kind(), ErrorKind::InvalidParameter);
        assert_eq!(
            GeocodeError::NoMatch {
                address: "nowhere".to_string()
            }
            .kind(),
            ErrorKind::Resolution
        );
        assert_eq!(GeocodeError::RateLimited.kind(), ErrorKind::Resolution);
        assert_eq!(
            GeocodeError::OutOfServiceArea {
                address: "Paris".to_string(),
                latitude: 48.85,
                longitude: 2.35,
            }
            .kind(),
            ErrorKind::OutOfServiceArea
        );
    }

    #[test]
    fn server_errors_are_transient_client_errors_are_not() {
        assert!(GeocodeError::Status { status: 503 }.is_transient());
        assert!(!GeocodeError::Status { status: 404 }.is_transient());
        assert!(!GeocodeError::EmptyAddress.is_transient());
    }
}
