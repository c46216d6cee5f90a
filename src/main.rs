//! mortality-eval - Main Entry Point
//!
//! Runs the calibration and audit pipeline over a scored cohort.

use clap::Parser;
use mortality_eval::cli::{cmd_demo, cmd_run, Cli, Commands};

fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mortality_eval=info".into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            data,
            output,
            model_name,
            config,
        } => {
            cmd_run(&data, &output, &model_name, config.as_deref())?;
        }
        Commands::Demo { output, seed } => {
            cmd_demo(&output, seed)?;
        }
    }

    Ok(())
}
