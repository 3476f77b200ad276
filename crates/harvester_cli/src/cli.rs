use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use harvester_engine::ExportFormat;

use crate::config::{HarvestSettings, LogSetting};

#[derive(Parser)]
#[command(name = "harvester")]
#[command(about = "Harvests an infinitely scrolling feed into a bounded local store")]
pub struct Cli {
    /// RON settings file; defaults apply when it does not exist
    #[arg(short, long, default_value = "harvester.ron")]
    pub config: PathBuf,

    /// Store document to read and write
    #[arg(long)]
    pub store: Option<PathBuf>,

    /// Where log output goes
    #[arg(long, value_enum)]
    pub log: Option<LogSetting>,

    /// Log debug detail
    #[arg(short, long)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Harvest a recorded feed (a directory of HTML snapshots) into the store
    Harvest(HarvestArgs),
    /// Pick one stored item uniformly at random and remember it
    Sample,
    /// Show the most recently picked item, as saved with the store
    Current,
    /// Write every stored item to a CSV or JSON file
    Export {
        #[arg(short, long, value_enum, default_value_t = FormatArg::Csv)]
        format: FormatArg,

        /// Output directory; overrides `export_dir`
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
    /// Show store size and capacity
    Stats,
}

#[derive(clap::Args)]
pub struct HarvestArgs {
    /// Directory holding `*.html` snapshots, replayed in name order
    pub snapshots: PathBuf,

    /// Charset to assume when a snapshot does not declare one
    #[arg(long)]
    pub charset: Option<String>,

    #[arg(long)]
    pub base_url: Option<String>,

    #[arg(long)]
    pub max_iterations: Option<u32>,

    #[arg(long)]
    pub patience: Option<u32>,

    #[arg(long)]
    pub settle_ms: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum FormatArg {
    Csv,
    Json,
}

impl From<FormatArg> for ExportFormat {
    fn from(format: FormatArg) -> Self {
        match format {
            FormatArg::Csv => ExportFormat::Csv,
            FormatArg::Json => ExportFormat::Json,
        }
    }
}

impl Cli {
    /// Applies global flag overrides on top of file settings.
    pub fn apply_overrides(&self, settings: &mut HarvestSettings) {
        if let Some(store) = &self.store {
            settings.store_path = store.clone();
        }
        if let Some(log) = self.log {
            settings.log_destination = log;
        }
        if let Commands::Harvest(args) = &self.command {
            args.apply_overrides(settings);
        }
    }
}

impl HarvestArgs {
    fn apply_overrides(&self, settings: &mut HarvestSettings) {
        if let Some(base_url) = &self.base_url {
            settings.base_url = Some(base_url.clone());
        }
        let pagination = &mut settings.pagination;
        if let Some(max_iterations) = self.max_iterations {
            pagination.max_iterations = max_iterations;
        }
        if let Some(patience) = self.patience {
            pagination.patience_threshold = patience;
        }
        if let Some(settle_ms) = self.settle_ms {
            pagination.settle_delay_ms = settle_ms;
        }
    }
}
