//! Geocoding providers shipped with the crate.
//!
//! The provider list lives in `services/providers.toml` and is embedded at
//! compile time. Disabling a provider or changing the lookup order only
//! needs an edit to that file.

use serde::Deserialize;

const PROVIDERS_TOML: &str = include_str!("../services/providers.toml");

/// One configured provider.
#[derive(Debug, Clone, Deserialize)]
pub struct GeocodingService {
    /// Short identifier used in logs and errors.
    pub id: String,
    /// Display name.
    pub name: String,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
    /// Lookup order; lower runs first.
    pub priority: u32,
    pub provider: ProviderConfig,
}

/// Connection details, selected by the `type` key.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProviderConfig {
    Google {
        base_url: String,
        /// Name of the environment variable that holds the API key.
        api_key_env: String,
        /// ccTLD used to bias results, e.g. `uk`.
        region: Option<String>,
    },
    Nominatim {
        base_url: String,
        /// ISO 3166-1 alpha-2 code passed as `countrycodes`.
        country_code: String,
    },
    Pelias {
        base_url: String,
        /// ISO 3166-1 alpha-3 code passed as `boundary.country`.
        country_code: String,
    },
}

#[derive(Deserialize)]
struct ProviderFile {
    service: Vec<GeocodingService>,
}

const fn enabled_by_default() -> bool {
    true
}

impl GeocodingService {
    #[must_use]
    pub fn base_url(&self) -> &str {
        match &self.provider {
            ProviderConfig::Google { base_url, .. }
            | ProviderConfig::Nominatim { base_url, .. }
            | ProviderConfig::Pelias { base_url, .. } => base_url,
        }
    }
}

/// Every shipped provider, disabled ones included, in file order.
///
/// # Errors
///
/// Returns the TOML error if the embedded provider file does not match
/// [`GeocodingService`].
pub fn all_services() -> Result<Vec<GeocodingService>, toml::de::Error> {
    toml::from_str::<ProviderFile>(PROVIDERS_TOML).map(|file| file.service)
}

/// Enabled providers in lookup order.
///
/// # Errors
///
/// See [`all_services`].
pub fn enabled_services() -> Result<Vec<GeocodingService>, toml::de::Error> {
    let mut services = all_services()?;
    services.retain(|s| s.enabled);
    services.sort_by_key(|s| s.priority);
    Ok(services)
}
