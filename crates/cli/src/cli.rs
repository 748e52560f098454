//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use std::net::SocketAddr;
use std::path::PathBuf;

/// OSC Controller - sends control value changes to a remote OSC listener
#[derive(Parser, Debug)]
#[command(
    name = "osc-controller",
    author,
    version,
    about = "Send control value changes to an OSC listener over UDP",
    long_about = "Sends control value changes to a remote OSC listener over UDP.\n\n\
                  Values are queued and transmitted by a dedicated dispatch thread, \n\
                  one single-float OSC message per datagram, in the order they were \n\
                  entered."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "OSC_CONTROLLER_VERBOSE")]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format
    #[arg(
        long,
        value_enum,
        default_value = "pretty",
        global = true,
        env = "OSC_CONTROLLER_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the interactive controller (value changes read from stdin)
    Run(RunArgs),

    /// Send a single value and exit
    Send(SendArgs),

    /// Print OSC float messages received on a UDP port
    Listen(ListenArgs),

    /// Validate configuration file without running
    Validate(ValidateArgs),
}

/// Arguments for the `run` command
#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    /// Path to configuration file (TOML or JSON); defaults apply when omitted
    #[arg(short, long, env = "OSC_CONTROLLER_CONFIG")]
    pub config: Option<PathBuf>,

    /// Override OSC host from configuration
    #[arg(long, env = "OSC_HOST")]
    pub host: Option<String>,

    /// Override OSC port from configuration
    #[arg(long, env = "OSC_PORT")]
    pub port: Option<u16>,

    /// Disable OSC dispatching; value changes are only logged
    #[arg(short = 'd', long)]
    pub no_dispatch: bool,

    /// Wait for queued values to be sent before shutting down on end of input
    #[arg(long)]
    pub drain: bool,

    /// Metrics server port (0 = disabled)
    #[arg(long, default_value = "0", env = "OSC_CONTROLLER_METRICS_PORT")]
    pub metrics_port: u16,
}

/// Arguments for the `send` command
#[derive(Parser, Debug, Clone)]
pub struct SendArgs {
    /// OSC host
    #[arg(long, default_value = "localhost", env = "OSC_HOST")]
    pub host: String,

    /// OSC port
    #[arg(long, default_value = "7777", env = "OSC_PORT")]
    pub port: u16,

    /// Seconds to wait for the socket to become writable
    #[arg(long, default_value = "30")]
    pub write_timeout: u64,

    /// OSC address, e.g. /tab1/slider1
    pub address: String,

    /// Value, sent as a 32-bit float
    #[arg(allow_negative_numbers = true)]
    pub value: String,
}

/// Arguments for the `listen` command
#[derive(Parser, Debug, Clone)]
pub struct ListenArgs {
    /// Local address to bind
    #[arg(long, default_value = "127.0.0.1:7777", env = "OSC_LISTEN_ADDR")]
    pub bind: SocketAddr,

    /// Stop after this many messages (0 = unlimited)
    #[arg(long, default_value = "0")]
    pub count: u64,
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to configuration file to validate
    #[arg(short, long, default_value = "controller.toml")]
    pub config: PathBuf,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Log output format
#[derive(ValueEnum, Clone, Debug, Default)]
pub enum LogFormat {
    /// JSON structured logging
    Json,
    /// Human-readable pretty format
    #[default]
    Pretty,
    /// Compact single-line format
    Compact,
}

impl From<LogFormat> for observability::LogFormat {
    fn from(format: LogFormat) -> Self {
        match format {
            LogFormat::Json => Self::Json,
            LogFormat::Pretty => Self::Pretty,
            LogFormat::Compact => Self::Compact,
        }
    }
}
