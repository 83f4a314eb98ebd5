//! # attestgrid CLI entry point
//!
//! Parses command-line arguments and dispatches to subcommand handlers.

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use attestgrid_cli::keygen::{run_keygen, KeygenArgs};
use attestgrid_cli::stats::{run_stats, StatsArgs};
use attestgrid_cli::verify::{run_verify, VerifyArgs};

/// AttestGrid — deterministic attestation receipts.
///
/// Verifies receipts offline, manages node keys, and publishes
/// transparency statistics.
#[derive(Parser, Debug)]
#[command(name = "attestgrid", version, about, long_about = None)]
struct Cli {
    /// Enable verbose output. Repeat for more verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Verify a receipt's signature against a node public key.
    Verify(VerifyArgs),

    /// Load or generate a node signing key and print its public key.
    Keygen(KeygenArgs),

    /// Compute transparency statistics and refresh the README block.
    Stats(StatsArgs),
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let mut stdout = std::io::stdout().lock();
    let result = match &cli.command {
        Commands::Verify(args) => run_verify(args, &mut stdout),
        Commands::Keygen(args) => run_keygen(args, &mut stdout),
        Commands::Stats(args) => run_stats(args, &mut stdout),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            tracing::error!("{e:#}");
            eprintln!("Error: {e:#}");
            ExitCode::from(1)
        }
    }
}
