//! Priority-ordered, service-area-aware address resolver.

use std::time::Duration;

use rooftop_rain_models::BoundingBox;

use crate::service_registry::{GeocodingService, ProviderConfig, enabled_services};
use crate::{GeocodeError, GeocodedAddress, Geocoder, google, nominatim, pelias, retry};

/// Lower bound on a single HTTP attempt, however small the provider
/// budget.
const MIN_ATTEMPT_TIMEOUT: Duration = Duration::from_millis(100);

/// Identifies this client to public geocoders (Nominatim requires one).
const USER_AGENT: &str = concat!("rooftop-rain/", env!("CARGO_PKG_VERSION"));

/// Resolves addresses by trying each enabled provider in priority order.
///
/// The first provider that returns a hit wins. A hit outside the service
/// area is rejected immediately rather than handed to the next provider:
/// the address itself is outside the serviced city.
pub struct ProviderResolver {
    client: reqwest::Client,
    services: Vec<GeocodingService>,
    service_area: BoundingBox,
    timeout: Duration,
    max_retries: u32,
}

impl ProviderResolver {
    /// Creates a resolver over the enabled services from the registry.
    ///
    /// `timeout` bounds each provider lookup, retries included; each HTTP
    /// attempt gets an equal share of it.
    ///
    /// # Errors
    ///
    /// Returns [`GeocodeError::Parse`] if the embedded provider list is
    /// malformed, or [`GeocodeError::Http`] if the HTTP client cannot be
    /// built.
    pub fn new(
        service_area: BoundingBox,
        timeout: Duration,
        max_retries: u32,
    ) -> Result<Self, GeocodeError> {
        let services = enabled_services().map_err(|e| GeocodeError::Parse {
            message: format!("provider list: {e}"),
        });
        Self::with_services(services?, service_area, timeout, max_retries)
    }

    /// Creates a resolver over an explicit service list.
    ///
    /// # Errors
    ///
    /// Returns [`GeocodeError::Http`] if the HTTP client cannot be built.
    pub fn with_services(
        services: Vec<GeocodingService>,
        service_area: BoundingBox,
        timeout: Duration,
        max_retries: u32,
    ) -> Result<Self, GeocodeError> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(attempt_timeout(timeout, max_retries))
            .build()?;

        for svc in &services {
            log::info!("Geocoding provider {} ({}) priority {}", svc.id, svc.name, svc.priority);
        }

        Ok(Self {
            client,
            services,
            service_area,
            timeout,
            max_retries,
        })
    }

    async fn lookup(
        &self,
        service: &GeocodingService,
        query: &str,
    ) -> Result<Option<GeocodedAddress>, GeocodeError> {
        match &service.provider {
            ProviderConfig::Google {
                base_url,
                api_key_env,
                region,
            } => {
                let Some(api_key) = google::api_key_from_env(api_key_env) else {
                    log::debug!("Skipping {}: {api_key_env} is not set", service.id);
                    return Ok(None);
                };
                google::geocode_freeform(
                    &self.client,
                    base_url,
                    &api_key,
                    region.as_deref(),
                    query,
                    self.max_retries,
                )
                .await
            }
            ProviderConfig::Nominatim {
                base_url,
                country_code,
            } => {
                nominatim::geocode_freeform(
                    &self.client,
                    base_url,
                    country_code,
                    query,
                    self.max_retries,
                )
                .await
            }
            ProviderConfig::Pelias {
                base_url,
                country_code,
            } => {
                pelias::geocode_freeform(
                    &self.client,
                    base_url,
                    country_code,
                    query,
                    self.max_retries,
                )
                .await
            }
        }
    }
}

#[async_trait::async_trait]
impl Geocoder for ProviderResolver {
    async fn resolve(&self, address: &str) -> Result<GeocodedAddress, GeocodeError> {
        let query = address.trim();
        if query.is_empty() {
            return Err(GeocodeError::EmptyAddress);
        }

        for service in &self.services {
            let outcome = tokio::time::timeout(self.timeout, self.lookup(service, query))
                .await
                .unwrap_or_else(|_| {
                    Err(GeocodeError::Timeout {
                        provider: service.id.clone(),
                        seconds: self.timeout.as_secs(),
                    })
                });

            match outcome {
                Ok(Some(hit)) => {
                    log::debug!(
                        "{} resolved '{query}' to ({}, {})",
                        service.id,
                        hit.coordinate.latitude,
                        hit.coordinate.longitude
                    );
                    return check_service_area(query, hit, &self.service_area);
                }
                Ok(None) => log::debug!("{} found no match for '{query}'", service.id),
                Err(e) => log::warn!("{} failed for '{query}': {e}", service.id),
            }
        }

        Err(GeocodeError::NoMatch {
            address: query.to_string(),
        })
    }
}

/// Splits a provider's budget across the first attempt and every retry,
/// net of backoff, so a timed-out first attempt still leaves room to retry.
fn attempt_timeout(budget: Duration, max_retries: u32) -> Duration {
    let attempts = max_retries.saturating_add(1);
    (budget.saturating_sub(retry::backoff_total(max_retries)) / attempts).max(MIN_ATTEMPT_TIMEOUT)
}

/// Accepts a geocoding hit only if it lies inside the service area.
///
/// # Errors
///
/// Returns [`GeocodeError::OutOfServiceArea`] when the hit is outside
/// `area` (or not a valid coordinate at all).
pub fn check_service_area(
    query: &str,
    hit: GeocodedAddress,
    area: &BoundingBox,
) -> Result<GeocodedAddress, GeocodeError> {
    if hit.coordinate.is_valid() && area.contains(&hit.coordinate) {
        Ok(hit)
    } else {
        Err(GeocodeError::OutOfServiceArea {
            address: query.to_string(),
            latitude: hit.coordinate.latitude,
            longitude: hit.coordinate.longitude,
        })
    }
}
