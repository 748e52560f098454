//! # Observability
//!
//! Tracing initialisation and Prometheus metrics for the OSC controller.
//!
//! ## Features
//!
//! - Tracing initialisation (JSON/Pretty/Compact formats)
//! - Prometheus metrics exporter
//! - Dispatch metric helpers shared by the dispatcher and the CLI
//!
//! ## Usage
//!
//! ```ignore
//! observability::init_with_config(&ObservabilityConfig::default())?;
//!
//! observability::record_datagram_sent(datagram.len());
//! ```

pub mod metrics;

use anyhow::{Context, Result};
use metrics_exporter_prometheus::PrometheusBuilder;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

// Re-exports
pub use crate::metrics::{
    record_datagram_sent, record_dispatch_failure, record_encode_failure,
    record_message_enqueued, record_messages_dropped, record_queue_depth,
    record_queue_latency_ms, RunningStats, StatsSummary,
};

/// Logging and metrics settings, usually derived from command-line flags
#[derive(Debug, Clone)]
pub struct ObservabilityConfig {
    pub log_format: LogFormat,
    /// Filter used when `RUST_LOG` is unset or ignored
    pub log_level: String,
    /// Let `RUST_LOG` replace `log_level`
    pub honour_rust_log: bool,
    /// Prometheus port (None = disabled)
    pub metrics_port: Option<u16>,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_format: LogFormat::Pretty,
            log_level: "info".to_string(),
            honour_rust_log: true,
            metrics_port: None,
        }
    }
}

impl ObservabilityConfig {
    /// Level for a `-v` count; `quiet` pins the filter to warnings
    pub fn for_verbosity(verbose: u8, quiet: bool, log_format: LogFormat) -> Self {
        let log_level = match (quiet, verbose) {
            (true, _) => "warn",
            (false, 0) => "info",
            (false, 1) => "debug",
            (false, _) => "trace",
        };
        Self {
            log_format,
            log_level: log_level.to_string(),
            honour_rust_log: !quiet,
            metrics_port: None,
        }
    }

    fn filter(&self) -> EnvFilter {
        if self.honour_rust_log {
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&self.log_level))
        } else {
            EnvFilter::new(&self.log_level)
        }
    }
}

/// Log format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// JSON structured logs
    Json,
    /// Human readable
    #[default]
    Pretty,
    /// Compact single line
    Compact,
}

/// Install the global subscriber and, if configured, the Prometheus exporter.
///
/// Logs go to stderr so stdout stays free for command output.
pub fn init_with_config(config: &ObservabilityConfig) -> Result<()> {
    let fmt_layer = match config.log_format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_thread_ids(true)
            .with_thread_names(true)
            .with_file(true)
            .with_line_number(true)
            .boxed(),
        LogFormat::Pretty => fmt::layer()
            .pretty()
            .with_writer(std::io::stderr)
            .with_thread_names(true)
            .boxed(),
        LogFormat::Compact => fmt::layer()
            .compact()
            .with_writer(std::io::stderr)
            .with_thread_names(true)
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(config.filter())
        .with(fmt_layer)
        .try_init()
        .context("Failed to initialize tracing subscriber")?;

    if let Some(port) = config.metrics_port {
        init_metrics_only(port)?;
    }

    tracing::debug!(
        log_format = ?config.log_format,
        log_level = %config.log_level,
        metrics_port = ?config.metrics_port,
        "Observability initialized"
    );

    Ok(())
}

/// Initialise only the Prometheus exporter (tracing already set up elsewhere)
pub fn init_metrics_only(port: u16) -> Result<()> {
    let builder = PrometheusBuilder::new();
    builder
        .with_http_listener(([0, 0, 0, 0], port))
        .install()
        .context("Failed to install Prometheus recorder")?;

    tracing::info!(port = port, "Prometheus metrics endpoint initialized");
    Ok(())
}
