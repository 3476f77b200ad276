mod cli;
mod commands;
mod config;

use std::path::Path;

use clap::Parser;
use engine_logging::engine_info;
use log::LevelFilter;

use crate::cli::{Cli, Commands};
use crate::config::HarvestSettings;

const LOG_FILE: &str = "./harvester.log";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut settings = HarvestSettings::load(&cli.config)?;
    cli.apply_overrides(&mut settings);
    settings.validate()?;

    let level = if cli.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    engine_logging::initialize(settings.log_destination.into(), level, Path::new(LOG_FILE));
    engine_info!("Using settings from {:?}", cli.config);

    match cli.command {
        Commands::Harvest(args) => commands::harvest(&settings, &args).await,
        Commands::Sample => commands::sample(&settings),
        Commands::Current => commands::current(&settings),
        Commands::Export { format, out } => commands::export(&settings, format.into(), out),
        Commands::Stats => commands::stats(&settings),
    }
}
