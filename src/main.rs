//! Avify - Bulk PNG to AVIF conversion
//!
//! This is the entry point for the avify binary: it parses the command
//! line, wires up logging, runs the conversion pipeline and turns the run
//! result into an exit status.

use anyhow::Result;
use clap::Parser;
use tracing::Level;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use avify::cli::Args;
use avify::config::RunConfig;
use avify::pipeline::Pipeline;

/// Exit status for fatal configuration or scan errors.
const EXIT_FATAL: i32 = 2;
/// Exit status when one or more files failed to convert.
const EXIT_FAILED_FILES: i32 = 1;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    setup_logging(args.verbose)?;

    let config = RunConfig {
        quality: args.quality,
        jobs: args.jobs,
        verbose: args.verbose,
        dryrun: args.dryrun,
    };

    let pipeline = match Pipeline::new(config) {
        Ok(pipeline) => pipeline,
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(EXIT_FATAL);
        }
    };

    let result = match pipeline.run(&args.target_path).await {
        Ok(result) => result,
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(EXIT_FATAL);
        }
    };

    if !result.is_success() {
        std::process::exit(EXIT_FAILED_FILES);
    }
    Ok(())
}

/// Console logging on stderr; stdout is reserved for the per-file lines.
fn setup_logging(verbose: bool) -> Result<()> {
    let log_level = if verbose { Level::DEBUG } else { Level::INFO };

    let console_layer = fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(log_level.into()))
        .with(console_layer)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    Ok(())
}
