//! mdpress CLI - documentation build pipeline.
//!
//! Provides commands for:
//! - `build`: Render the full documentation tree once
//! - `dev`: Watch mode with incremental rebuilds and a live preview server

mod commands;
mod error;
mod output;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use commands::{BuildArgs, DevArgs};
use output::Output;

/// mdpress - Documentation build pipeline.
#[derive(Parser)]
#[command(name = "mdpress", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render the full documentation tree once.
    Build(BuildArgs),
    /// Start watch mode with a live preview server.
    Dev(DevArgs),
}

fn main() {
    let cli = Cli::parse();
    let output = Output::new();

    let verbose = match &cli.command {
        Commands::Build(args) => args.verbose,
        Commands::Dev(args) => args.verbose,
    };

    // Initialize tracing with appropriate log level
    // --verbose enables INFO level, otherwise use RUST_LOG or default to WARN
    let filter = if verbose {
        EnvFilter::new("info")
    } else {
        EnvFilter::from_default_env()
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let rt = tokio::runtime::Runtime::new().expect("Failed to create tokio runtime");
    let result = match cli.command {
        Commands::Build(args) => rt.block_on(args.execute()),
        Commands::Dev(args) => rt.block_on(args.execute()),
    };

    if let Err(err) = result {
        output.error(&format!("Error: {err}"));
        std::process::exit(1);
    }
}
