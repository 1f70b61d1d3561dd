//! HTTP send helper with a bounded retry for transient provider errors.
//!
//! Provider clients call [`send_json`] instead of
//! `reqwest::RequestBuilder::send()` directly. Connection failures, HTTP
//! 429 and HTTP 5xx are retried up to the given limit with a short
//! backoff; any other 4xx is permanent.

use std::time::Duration;

use crate::GeocodeError;

/// Backoff before the first retry. Doubles on each further attempt.
const BASE_BACKOFF: Duration = Duration::from_millis(250);

/// Total time [`send_json`] sleeps between attempts when every retry is
/// used.
#[must_use]
pub fn backoff_total(max_retries: u32) -> Duration {
    (0..max_retries).map(|n| BASE_BACKOFF * (1 << n)).sum()
}

/// Sends an HTTP request and parses the response body as JSON.
///
/// The `build_request` closure is called on each attempt to construct a
/// fresh [`reqwest::RequestBuilder`] (builders are consumed by `.send()`).
///
/// # Errors
///
/// Returns [`GeocodeError`] if the request still fails after
/// `max_retries` retries, the provider answers with a non-retryable
/// status, or the body is not valid JSON.
pub async fn send_json<F>(build_request: F, max_retries: u32) -> Result<serde_json::Value, GeocodeError>
where
    F: Fn() -> reqwest::RequestBuilder + Send + Sync,
{
    let mut attempt = 0;

    loop {
        match send_once(&build_request).await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_transient() && attempt < max_retries => {
                attempt += 1;
                let delay = BASE_BACKOFF * (1 << (attempt - 1));
                log::warn!("transient geocoder error ({e}), retry {attempt}/{max_retries} in {delay:?}");
                tokio::time::sleep(delay).await;
            }
            Err(e) => return Err(e),
        }
    }
}

async fn send_once<F>(build_request: &F) -> Result<serde_json::Value, GeocodeError>
where
    F: Fn() -> reqwest::RequestBuilder,
{
    let response = build_request().send().await?;
    let status = response.status();

    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        return Err(GeocodeError::RateLimited);
    }

    if !status.is_success() {
        return Err(GeocodeError::Status {
            status: status.as_u16(),
        });
    }

    let text = response.text().await?;
    serde_json::from_str(&text).map_err(|e| GeocodeError::Parse {
        message: format!("response is not valid JSON: {e}"),
    })
}
