//! # OSC Controller CLI
//!
//! Command-line entry point.
//!
//! Provides:
//! - The interactive controller loop (stdin value changes)
//! - One-shot send and a decoding listener
//! - Configuration validation

mod cli;
mod commands;
mod session;

use anyhow::Result;
use clap::Parser;
use tracing::info;

use cli::{Cli, Commands};
use commands::{run_controller, run_listen, run_send, run_validate};
use observability::ObservabilityConfig;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    init_logging(&cli)?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "OSC controller starting"
    );

    let result = match &cli.command {
        Commands::Run(args) => run_controller(args).await,
        Commands::Send(args) => run_send(args).await,
        Commands::Listen(args) => run_listen(args).await,
        Commands::Validate(args) => run_validate(args),
    };

    if let Err(ref e) = result {
        tracing::error!(error = %e, "Command failed");
    }

    result
}

/// Initialize logging based on CLI options
fn init_logging(cli: &Cli) -> Result<()> {
    let config =
        ObservabilityConfig::for_verbosity(cli.verbose, cli.quiet, cli.log_format.clone().into());
    observability::init_with_config(&config)
}
