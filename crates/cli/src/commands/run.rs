//! `run` command implementation.

use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use contracts::{ControllerConfig, FatalEvent};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, error, info, warn};

use super::shutdown_signal;
use crate::cli::RunArgs;
use crate::session::{parse_value, wait_for_fatal, Session};

/// Why the input loop ended
#[derive(Debug)]
enum Exit {
    Quit,
    EndOfInput,
    Signal,
    Fatal(FatalEvent),
}

/// What to do after one input line
#[derive(Debug, PartialEq, Eq)]
enum LineAction {
    Continue,
    Quit,
}

/// Execute the `run` command
pub async fn run_controller(args: &RunArgs) -> Result<()> {
    let config = load_config(args)?;

    info!(
        host = %config.osc.host,
        port = config.osc.port,
        enabled = config.osc.enabled,
        controls = config.controls.len(),
        "Configuration loaded"
    );

    if args.metrics_port != 0 {
        observability::init_metrics_only(args.metrics_port)?;
    }

    let drain_limit = Duration::from_secs(config.osc.write_timeout_secs);
    let (mut session, mut fatal) = Session::open(config)?;
    session.enqueue_all_controls()?;

    info!("Reading value changes from stdin (ADDRESS VALUE, 'quit' to exit)");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    let exit = loop {
        tokio::select! {
            line = lines.next_line() => {
                match line.context("Failed to read stdin")? {
                    Some(line) => {
                        if handle_line(&mut session, &line) == LineAction::Quit {
                            break Exit::Quit;
                        }
                    }
                    None => break Exit::EndOfInput,
                }
            }
            event = wait_for_fatal(&mut fatal) => break Exit::Fatal(event),
            _ = &mut shutdown => break Exit::Signal,
        }
    };

    debug!(?exit, "Input loop finished");

    match exit {
        Exit::Fatal(event) => {
            error!(%event, "Dispatch thread failed, shutting down");
            let cause = match session.close().await {
                Err(e) => e,
                Ok(_) => anyhow!("{event}"),
            };
            return Err(cause).context("Controller stopped on a fatal dispatch error");
        }
        Exit::EndOfInput if args.drain => {
            if let Err(e) = session.drain(&mut fatal, drain_limit).await {
                warn!(error = %e, "Queue not fully drained before shutdown");
            }
        }
        Exit::Signal => warn!("Received shutdown signal, stopping controller..."),
        Exit::Quit | Exit::EndOfInput => {}
    }

    let stats = session.close().await?;
    stats.print_summary();

    info!("OSC controller finished");
    Ok(())
}

/// Load the file (or defaults), apply CLI overrides and re-validate
fn load_config(args: &RunArgs) -> Result<ControllerConfig> {
    let mut config = match &args.config {
        Some(path) => {
            if !path.exists() {
                anyhow::bail!("Configuration file not found: {}", path.display());
            }
            info!(config = %path.display(), "Loading configuration");
            config_loader::ConfigLoader::load_from_path(path)
                .with_context(|| format!("Failed to load config from {}", path.display()))?
        }
        None => ControllerConfig::default(),
    };

    if let Some(ref host) = args.host {
        info!(host = %host, "Overriding OSC host from CLI");
        config.osc.host = host.clone();
    }
    if let Some(port) = args.port {
        info!(port = %port, "Overriding OSC port from CLI");
        config.osc.port = port;
    }
    if args.no_dispatch {
        config.osc.enabled = false;
    }

    config_loader::ConfigLoader::validate(&config).context("Invalid configuration")?;
    Ok(config)
}

fn handle_line(session: &mut Session, line: &str) -> LineAction {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return LineAction::Continue;
    }
    if matches!(line, "quit" | "exit") {
        return LineAction::Quit;
    }

    let mut parts = line.split_whitespace();
    let (Some(address), Some(raw), None) = (parts.next(), parts.next(), parts.next()) else {
        warn!(line, "Expected 'ADDRESS VALUE'");
        return LineAction::Continue;
    };

    let result = parse_value(raw).and_then(|value| session.set_value(address, value));
    match result {
        Ok(Some(seq)) => debug!(seq, address, "Value queued"),
        Ok(None) => {}
        Err(e) => warn!(error = %format!("{e:#}"), "Value change ignored"),
    }
    LineAction::Continue
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn run_args() -> RunArgs {
        RunArgs {
            config: None,
            host: None,
            port: None,
            no_dispatch: false,
            drain: false,
            metrics_port: 0,
        }
    }

    fn disabled_session() -> Session {
        let config = ControllerConfig {
            osc: contracts::OscConfig {
                enabled: false,
                ..Default::default()
            },
            ..Default::default()
        };
        Session::open(config).unwrap().0
    }

    #[test]
    fn test_load_config_defaults_and_overrides() {
        let args = RunArgs {
            host: Some("10.1.2.3".to_string()),
            port: Some(9001),
            no_dispatch: true,
            ..run_args()
        };
        let config = load_config(&args).unwrap();
        assert_eq!(config.osc.host, "10.1.2.3");
        assert_eq!(config.osc.port, 9001);
        assert!(!config.osc.enabled);
    }

    #[test]
    fn test_load_config_from_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[osc]
host = "127.0.0.1"
port = 8000

[[controls]]
address = "/tab1/slider1"
value = 0.5
"#
        )
        .unwrap();

        let args = RunArgs {
            config: Some(file.path().to_path_buf()),
            ..run_args()
        };
        let config = load_config(&args).unwrap();
        assert_eq!(config.osc.port, 8000);
        assert_eq!(config.controls.len(), 1);
    }

    #[test]
    fn test_load_config_missing_file() {
        let args = RunArgs {
            config: Some("/nonexistent/controller.toml".into()),
            ..run_args()
        };
        assert!(load_config(&args).is_err());
    }

    #[test]
    fn test_override_port_zero_rejected() {
        let args = RunArgs {
            port: Some(0),
            ..run_args()
        };
        assert!(load_config(&args).is_err());
    }

    #[test]
    fn test_handle_line() {
        let mut session = disabled_session();

        assert_eq!(handle_line(&mut session, ""), LineAction::Continue);
        assert_eq!(handle_line(&mut session, "# comment"), LineAction::Continue);
        assert_eq!(handle_line(&mut session, "/a 0.5"), LineAction::Continue);
        assert_eq!(handle_line(&mut session, "/a"), LineAction::Continue);
        assert_eq!(handle_line(&mut session, "/a not-a-number"), LineAction::Continue);
        assert_eq!(handle_line(&mut session, "  quit "), LineAction::Quit);
    }
}
