#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! CLI entry point for rooftop rainwater-harvesting estimates.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use rooftop_rain_harvest::config::DEFAULT_CONFIG_PATH;
use rooftop_rain_harvest::pipeline::{load_footprints, load_forecaster};
use rooftop_rain_harvest::yield_calc::{annual_collection, collected_liters};
use rooftop_rain_harvest::{HarvestConfig, Pipeline};
use rooftop_rain_server_models::ApiImpactResponse;

#[derive(Parser)]
#[command(name = "rooftop_rain", about = "Rooftop rainwater-harvesting estimates")]
struct Cli {
    /// Configuration file
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP API server
    Serve,
    /// Estimate rooftop area and rainfall collection for one address
    Estimate {
        /// Street address (e.g., "10 Downing Street, London")
        address: String,
    },
    /// Print historical annual rainfall totals
    History {
        /// Rooftop area in square meters; also prints the mean annual
        /// collection for a roof of this size.
        #[arg(long)]
        area: Option<f64>,
    },
    /// Print footprint dataset statistics
    Footprints,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    pretty_env_logger::init();
    let cli = Cli::parse();
    let config = HarvestConfig::load(&cli.config)?;

    match cli.command {
        Commands::Serve => {
            let pipeline = Arc::new(Pipeline::from_config(&config)?);
            // The server uses actix-web's runtime, so we need to run it
            // in a blocking task to avoid nesting tokio runtimes.
            tokio::task::spawn_blocking(move || {
                actix_web::rt::System::new().block_on(rooftop_rain_server::run_server(pipeline))
            })
            .await??;
        }
        Commands::Estimate { address } => {
            let pipeline = Pipeline::from_config(&config)?;
            let result = pipeline.estimate(&address).await?;
            for issue in &result.issues {
                log::warn!("{}: {}", issue.kind, issue.message);
            }
            println!(
                "{}",
                serde_json::to_string_pretty(&ApiImpactResponse::from(result))?
            );
        }
        Commands::History { area } => {
            let forecaster = load_forecaster(&config)?;
            let summary = forecaster.summary();
            let runoff = config.coefficients.runoff;

            if let Some(area) = area {
                let liters = annual_collection(&summary.annual, area, runoff)?;
                println!("{:<6} {:>12} {:>14}", "YEAR", "RAINFALL_MM", "COLLECTED_L");
                println!("{}", "-".repeat(34));
                for (year, (_, l)) in summary.annual.iter().zip(&liters) {
                    println!("{:<6} {:>12.1} {l:>14.0}", year.year, year.rainfall_mm);
                }
                println!("{}", "-".repeat(34));
                let mean_l = collected_liters(area, summary.mean_annual_mm, runoff)?;
                println!("{:<6} {:>12.1} {mean_l:>14.0}", "MEAN", summary.mean_annual_mm);
                println!();
                println!("Roof of {area:.1} m² at runoff {runoff}");
            } else {
                println!("{:<6} {:>12}", "YEAR", "RAINFALL_MM");
                println!("{}", "-".repeat(19));
                for year in &summary.annual {
                    println!("{:<6} {:>12.1}", year.year, year.rainfall_mm);
                }
                println!("{}", "-".repeat(19));
                println!("{:<6} {:>12.1}", "MEAN", summary.mean_annual_mm);
            }
            println!("{:<6} {:>12.1}", "MAX", summary.max_annual_mm);
        }
        Commands::Footprints => {
            let stats = load_footprints(&config)?.stats();
            println!("Footprints:  {}", stats.count);
            if let Some(b) = stats.bounds {
                println!(
                    "Extent:      {:.5},{:.5} .. {:.5},{:.5}",
                    b.west, b.south, b.east, b.north
                );
            }
            println!("Mean area:   {:.1} m²", stats.mean_area_m2);
            println!("Max area:    {:.1} m²", stats.max_area_m2);
        }
    }

    Ok(())
}
