pub mod types;
pub mod config;
pub mod data;
pub mod processing;
pub mod render;
pub mod layout;
pub mod server;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;
use types::{FilterSelection, Pollutant};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the interactive dashboard
    Serve {
        #[arg(short, long, value_name = "FILE", default_value = "config.toml")]
        config: PathBuf,
    },
    /// Compute the charts for one filter selection and print them as JSON
    Render {
        #[arg(short, long, value_name = "FILE", default_value = "config.toml")]
        config: PathBuf,
        #[arg(long = "state", value_name = "STATE")]
        states: Vec<String>,
        #[arg(long = "operator", value_name = "OPERATOR")]
        operators: Vec<String>,
        #[arg(long = "status", value_name = "STATUS")]
        statuses: Vec<String>,
        /// Pollutant column to colour and plot by
        #[arg(long, value_enum, ignore_case = true, default_value_t = Pollutant::Pm25)]
        pollutant: Pollutant,
        /// Print the map layer as GeoJSON instead of the full chart set
        #[arg(long)]
        geojson: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { config } => {
            info!("Serving dashboard with config: {:?}", config);
            let app_config = config::AppConfig::load_from_file(&config)?;
            let dataset = data::load_dataset(&app_config.input.data_csv)?;

            server::start_server(app_config, dataset).await?;
        }
        Commands::Render {
            config,
            states,
            operators,
            statuses,
            pollutant,
            geojson,
        } => {
            let app_config = config::AppConfig::load_from_file(&config)?;
            let dataset = data::load_dataset(&app_config.input.data_csv)?;

            let selection = FilterSelection {
                states,
                operators,
                statuses,
                pollutant,
            };

            let charts = processing::update(&dataset, &selection, &app_config.map);
            let output = if geojson {
                serde_json::to_string_pretty(&charts.map.to_feature_collection())?
            } else {
                serde_json::to_string_pretty(&charts)?
            };
            println!("{}", output);
        }
    }

    Ok(())
}
