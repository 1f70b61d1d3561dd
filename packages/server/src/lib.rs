#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Actix-Web API server for rooftop rainwater-harvesting estimates.
//!
//! Serves `POST /api/impact`, which runs the estimation pipeline for one
//! address, and `GET /api/health`. The footprint index and rainfall model
//! are loaded once at startup and shared read-only by every worker.

mod handlers;

use std::sync::Arc;

use actix_cors::Cors;
use actix_web::{App, HttpServer, middleware, web};
use rooftop_rain_harvest::Pipeline;

/// Shared application state.
pub struct AppState {
    /// Estimation pipeline with its loaded datasets.
    pub pipeline: Arc<Pipeline>,
}

/// Registers the `/api` routes and JSON error handling.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::JsonConfig::default().error_handler(handlers::json_error))
        .service(
            web::scope("/api")
                .route("/health", web::get().to(handlers::health))
                .route("/impact", web::post().to(handlers::impact)),
        );
}

const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 8080;

/// Listen address read from `BIND_ADDR` and `PORT`.
struct Listen {
    host: String,
    port: u16,
}

impl Listen {
    fn from_env() -> Self {
        let host = std::env::var("BIND_ADDR").unwrap_or_else(|_| DEFAULT_HOST.to_string());
        let port = match std::env::var("PORT") {
            Ok(raw) => raw.parse().unwrap_or_else(|_| {
                log::warn!("Ignoring PORT={raw}, using {DEFAULT_PORT}");
                DEFAULT_PORT
            }),
            Err(_) => DEFAULT_PORT,
        };
        Self { host, port }
    }
}

/// Serves the API for an already-loaded pipeline until shutdown.
///
/// Listens on `BIND_ADDR`:`PORT` (`127.0.0.1:8080` when unset). Must run
/// inside an actix system, e.g. from `#[actix_web::main]`.
///
/// # Errors
///
/// Returns the I/O error if the listener cannot bind or the server stops
/// abnormally.
#[allow(clippy::future_not_send)]
pub async fn run_server(pipeline: Arc<Pipeline>) -> std::io::Result<()> {
    let listen = Listen::from_env();
    log::info!(
        "Listening on {}:{} with {} footprints, rainfall model {}",
        listen.host,
        listen.port,
        pipeline.footprints().len(),
        pipeline.model_version()
    );

    let state = web::Data::new(AppState { pipeline });

    HttpServer::new(move || {
        App::new()
            .wrap(Cors::permissive())
            .wrap(middleware::Logger::default())
            .app_data(state.clone())
            .configure(configure)
    })
    .bind((listen.host, listen.port))?
    .run()
    .await
}
