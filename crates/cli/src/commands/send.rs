//! `send` command implementation.

use std::time::Duration;

use anyhow::{Context, Result};
use contracts::{ControllerConfig, OscConfig};
use tracing::info;

use crate::cli::SendArgs;
use crate::session::{parse_value, Session};

/// Execute the `send` command
///
/// Same lifecycle as `run`, with a single value and a drain before shutdown
/// so the value is not discarded.
pub async fn run_send(args: &SendArgs) -> Result<()> {
    let value = parse_value(&args.value)?;

    let config = ControllerConfig {
        osc: OscConfig {
            enabled: true,
            host: args.host.clone(),
            port: args.port,
            write_timeout_secs: args.write_timeout,
        },
        ..ControllerConfig::default()
    };
    config_loader::ConfigLoader::validate(&config).context("Invalid send arguments")?;

    let (mut session, mut fatal) = Session::open(config)?;
    session.set_value(&args.address, value)?;

    let drained = session
        .drain(&mut fatal, Duration::from_secs(args.write_timeout))
        .await;
    let stats = session.close().await?;
    drained?;

    info!(
        address = %args.address,
        value,
        bytes = stats.metrics.bytes_sent,
        "Value sent"
    );
    Ok(())
}
