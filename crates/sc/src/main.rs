//! sc CLI - directive expander.
//!
//! Provides commands for:
//! - `expand`: Expand `[[name#value]]` directives using handler templates
//! - `scan`: List the directives of a file without running any handler

mod commands;
mod error;
mod output;
mod templates;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use commands::{ExpandArgs, ScanArgs};
use output::Output;

/// sc - recursive directive expander.
#[derive(Parser)]
#[command(name = "sc", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Expand directives in a file or stdin.
    Expand(ExpandArgs),
    /// List directives without expanding them.
    Scan(ScanArgs),
}

fn main() {
    let cli = Cli::parse();
    let output = Output::new();

    let verbosity = match &cli.command {
        Commands::Expand(args) => args.verbose,
        Commands::Scan(args) => args.verbose,
    };

    // -v enables INFO, -vv DEBUG, otherwise RUST_LOG or the default WARN
    let filter = match verbosity {
        0 => EnvFilter::from_default_env(),
        1 => EnvFilter::new("info"),
        _ => EnvFilter::new("debug"),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let result = match cli.command {
        Commands::Expand(args) => args.execute(),
        Commands::Scan(args) => args.execute(),
    };

    if let Err(err) = result {
        output.error(&format!("Error: {err}"));
        std::process::exit(1);
    }
}
