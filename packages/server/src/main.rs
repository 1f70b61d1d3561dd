#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Standalone binary for the rooftop rain API server.
//!
//! Reads `rooftop_rain.toml` from the working directory (defaults apply
//! when it is absent), loads the footprint and weather datasets and
//! serves the API.

use std::path::Path;
use std::sync::Arc;

use rooftop_rain_harvest::config::DEFAULT_CONFIG_PATH;
use rooftop_rain_harvest::{HarvestConfig, Pipeline};

#[actix_web::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    pretty_env_logger::init_custom_env("RUST_LOG");

    let config = HarvestConfig::load(Path::new(DEFAULT_CONFIG_PATH))?;
    let pipeline = Pipeline::from_config(&config)?;

    rooftop_rain_server::run_server(Arc::new(pipeline)).await?;
    Ok(())
}
