//! wxcache - Weather lookups with an offline-tolerant local cache
//!
//! Parses the command line, sets up logging on stderr and runs one command.

use std::io;
use std::process;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use wxcache::cli::Cli;
use wxcache::commands;
use wxcache::config::{default_log_level, Config};

/// Sends logs to stderr so stdout stays clean for command output.
/// `RUST_LOG` overrides the level chosen by `-v`.
fn init_tracing(verbose: u8) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_log_level(verbose)));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = match Config::from_cli(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {}", e);
            process::exit(2);
        }
    };
    tracing::debug!(?config, "resolved configuration");

    let mut stdout = io::stdout().lock();
    if let Err(e) = commands::run(cli.command, &config, &mut stdout).await {
        eprintln!("error: {}", e);
        process::exit(1);
    }

    Ok(())
}
