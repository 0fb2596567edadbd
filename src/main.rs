// Strata - Streaming Document Store Extractor
// Copyright (c) 2026 Strata Contributors
// Licensed under the MIT License

use clap::Parser;
use std::process;
use strata::cli::{Cli, Commands};
use strata::config::load_config;
use strata::domain::Result;
use strata::extractor::Extractor;
use strata::logging::{init_logging, LogMode};
use strata::producer;

fn main() {
    // Load environment variables from .env file if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let mode = if cli.command.is_producer() {
        LogMode::Producer
    } else {
        LogMode::Consumer
    };
    let log_level = cli.log_level.as_deref().unwrap_or("info");
    if let Err(e) = init_logging(log_level, mode) {
        eprintln!("Failed to initialize logging: {e}");
        process::exit(strata::domain::INTERNAL_ERROR_EXIT_CODE);
    }

    // Document handling must stay strictly ordered, so the whole pipeline
    // runs on a single-threaded scheduler owned here.
    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            tracing::error!("Failed to start async runtime: {e}");
            process::exit(strata::domain::INTERNAL_ERROR_EXIT_CODE);
        }
    };

    if let Err(e) = runtime.block_on(execute(&cli)) {
        tracing::error!("{e}");
        process::exit(e.exit_code());
    }
}

async fn execute(cli: &Cli) -> Result<()> {
    match cli.command {
        Commands::Extract => {
            let config = load_config(&cli.config)?;
            Extractor::new(config).extract().await?;
            Ok(())
        }
        Commands::TestConnection => {
            let config = load_config(&cli.config)?;
            Extractor::new(config).test_connection().await?;
            // Logs go to stderr; stdout carries only the result.
            println!("{}", serde_json::json!({ "success": true }));
            Ok(())
        }
        Commands::Produce => {
            producer::run().await?;
            Ok(())
        }
        Commands::Probe => producer::probe().await,
    }
}
