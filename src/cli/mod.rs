//! CLI interface and argument parsing

use clap::{Parser, Subcommand};

/// Strata - streaming document store extractor
#[derive(Parser, Debug)]
#[command(name = "strata")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "strata.toml", env = "STRATA_CONFIG")]
    pub config: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, env = "STRATA_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the extraction and write the output table
    Extract,

    /// Verify that the configured store is reachable
    TestConnection,

    /// Producer role: fetch documents and stream them out.
    /// Spawned by `extract`; configured entirely through the environment.
    #[command(hide = true)]
    Produce,

    /// Producer role: probe the store connection.
    /// Spawned by `test-connection`.
    #[command(hide = true)]
    Probe,
}

impl Commands {
    /// Producer commands read their configuration from the environment
    /// and log through the stdout/stderr split instead of the console
    /// format.
    pub fn is_producer(&self) -> bool {
        matches!(self, Commands::Produce | Commands::Probe)
    }
}
