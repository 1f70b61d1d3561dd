//! HTTP handler functions for the rooftop rain API.

use actix_web::error::{InternalError, JsonPayloadError};
use actix_web::http::StatusCode;
use actix_web::{HttpRequest, HttpResponse, web};
use rooftop_rain_harvest::HarvestError;
use rooftop_rain_models::ErrorKind;
use rooftop_rain_server_models::{ApiError, ApiHealth, ApiImpactResponse, ImpactRequest};

use crate::AppState;

/// `GET /api/health`
pub async fn health(state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(ApiHealth {
        healthy: true,
        version: env!("CARGO_PKG_VERSION").to_string(),
        model_version: state.pipeline.model_version().to_string(),
        footprints: state.pipeline.footprints().len(),
    })
}

/// `POST /api/impact`
///
/// Estimates rooftop area and per-year rainfall collection for an
/// address.
pub async fn impact(state: web::Data<AppState>, body: web::Json<ImpactRequest>) -> HttpResponse {
    match state.pipeline.estimate(&body.address).await {
        Ok(result) => {
            if result.is_partial() {
                log::info!(
                    "Partial estimate for '{}': {} issue(s)",
                    body.address,
                    result.issues.len()
                );
            }
            HttpResponse::Ok().json(ApiImpactResponse::from(result))
        }
        Err(e) => {
            if e.kind().is_client_error() {
                log::info!("Rejected '{}': {e}", body.address);
            } else {
                log::error!("Failed to estimate '{}': {e}", body.address);
            }
            error_response(&e)
        }
    }
}

/// Rejects malformed request bodies with the standard error shape.
pub fn json_error(err: JsonPayloadError, _req: &HttpRequest) -> actix_web::Error {
    let response = HttpResponse::BadRequest().json(ApiError {
        kind: ErrorKind::InvalidParameter,
        message: err.to_string(),
    });
    InternalError::from_response(err, response).into()
}

/// HTTP status for each failure kind. Address-level failures are 4xx
/// (see [`ErrorKind::is_client_error`]); dataset and model faults are 5xx.
const fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::InvalidParameter => StatusCode::BAD_REQUEST,
        ErrorKind::Resolution | ErrorKind::OutOfServiceArea => StatusCode::UNPROCESSABLE_ENTITY,
        ErrorKind::NoFootprintFound => StatusCode::NOT_FOUND,
        ErrorKind::DegenerateGeometry => StatusCode::INTERNAL_SERVER_ERROR,
        ErrorKind::ForecastUnavailable => StatusCode::SERVICE_UNAVAILABLE,
    }
}

fn error_response(err: &HarvestError) -> HttpResponse {
    let kind = err.kind();
    HttpResponse::build(status_for(kind)).json(ApiError {
        kind,
        message: err.to_string(),
    })
}
