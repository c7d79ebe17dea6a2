//! Command-line arguments for the simulator.

use bstore_host::{Config, HostError};
use clap::Parser;
use std::path::PathBuf;

/// Drive the backing-store cache through a scripted surface workload.
#[derive(Parser, Debug, Clone)]
#[command(name = "bstore-sim", version, about, long_about = None)]
pub struct Args {
    /// Configuration file path (TOML format)
    #[arg(short = 'c', long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Number of surfaces to create
    #[arg(short = 'n', long, default_value_t = 4)]
    pub surfaces: usize,

    /// Surface width in pixels
    #[arg(long, default_value_t = 1024)]
    pub width: u32,

    /// Surface height in pixels
    #[arg(long, default_value_t = 768)]
    pub height: u32,

    /// Backing store cache capacity (0 or negative disables caching)
    #[arg(long, value_name = "N", allow_hyphen_values = true)]
    pub capacity: Option<i32>,

    /// Thumbnail debounce window in milliseconds
    #[arg(long, value_name = "MS")]
    pub debounce_ms: Option<u64>,

    /// Print the report as JSON
    #[arg(long)]
    pub json: bool,

    /// Enable verbose logging (repeat for more)
    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl Args {
    /// Load the configuration file, if any, then apply command-line overrides.
    pub fn to_config(&self) -> Result<Config, HostError> {
        let mut config = match &self.config {
            Some(path) => Config::load(path)?,
            None => Config::default(),
        };

        if let Some(capacity) = self.capacity {
            config.backing_store.cache_capacity = Some(capacity);
        }
        if let Some(ms) = self.debounce_ms {
            config.thumbnail.debounce_window_ms = ms;
        }

        config.validate()?;
        Ok(config)
    }

    /// Default log level for the verbosity count.
    pub fn log_level(&self) -> &'static str {
        match self.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    }
}
