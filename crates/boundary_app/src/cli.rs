use std::path::PathBuf;
use std::time::Duration;

use boundary_logging::LogDestination;
use clap::Parser;
use log::LevelFilter;

/// Applies a boundary list to a saved page and prints what it governs.
#[derive(Debug, Clone, PartialEq, Parser)]
#[command(name = "boundary_app")]
#[command(about = "Apply archive boundaries to a saved HTML page")]
pub struct CliArgs {
    /// Saved HTML page
    pub page: PathBuf,
    /// JSON boundary list
    pub boundaries: PathBuf,
    /// Page URL used for resource matching and href resolution
    #[arg(long)]
    pub url: Option<String>,
    /// RON file with engine settings
    #[arg(long)]
    pub settings: Option<PathBuf>,
    /// Vertical scroll offset applied after the first pass
    #[arg(long, allow_negative_numbers = true)]
    pub scroll: Option<f64>,
    /// How long to wait for classification, in milliseconds
    #[arg(long = "timeout-ms", default_value_t = 30_000)]
    pub timeout_ms: u64,
    /// Where log lines go: terminal, file or both
    #[arg(long, default_value = "terminal", value_parser = parse_log_destination)]
    pub log: LogDestination,
    /// Log at debug level
    #[arg(short, long)]
    pub verbose: bool,
}

impl CliArgs {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn log_level(&self) -> LevelFilter {
        if self.verbose {
            LevelFilter::Debug
        } else {
            LevelFilter::Warn
        }
    }
}

fn parse_log_destination(raw: &str) -> Result<LogDestination, String> {
    LogDestination::from_arg(raw).ok_or_else(|| format!("unknown log destination {raw:?}"))
}
