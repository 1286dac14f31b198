//! Binary crate for the `weather-aggregator` command-line tool.
//!
//! This crate focuses on:
//! - Parsing CLI arguments and validating the city
//! - Interactive configuration of provider keys
//! - Human-friendly output formatting

use clap::Parser;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

mod cli;
mod display;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // keys may come from a local .env file
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                EnvFilter::new("weather_aggregator=warn,weather_aggregator_core=warn")
            }),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cmd = cli::Cli::parse();
    cmd.run().await
}
