//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Redis Relay - route queued JSON messages into Redis
#[derive(Parser, Debug)]
#[command(
    name = "redis-relay",
    author,
    version,
    about = "Relay JSON messages into Redis channels and capped lists",
    long_about = "Consumes newline-delimited JSON messages, renders a Redis key or channel \n\
                  for each configured route from the message fields, and writes the raw \n\
                  message with PUBLISH or LPUSH/LTRIM, optionally rate limited per key."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "REDIS_RELAY_VERBOSE")]
    pub verbose: u8,

    /// Suppress all output except warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format
    #[arg(
        long,
        value_enum,
        default_value = "compact",
        global = true,
        env = "REDIS_RELAY_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the relay
    Run(RunArgs),

    /// Validate configuration file without running
    Validate(ValidateArgs),

    /// Display configuration information
    Info(InfoArgs),
}

/// Arguments for the `run` command
#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    /// Path to configuration file (TOML or JSON)
    #[arg(short, long, default_value = "relay.toml", env = "REDIS_RELAY_CONFIG")]
    pub config: PathBuf,

    /// Override the Redis URL from configuration
    #[arg(long, env = "REDIS_RELAY_REDIS_URL")]
    pub redis_url: Option<String>,

    /// Override the flush interval in milliseconds (0 = flush every message)
    #[arg(long, env = "REDIS_RELAY_FLUSH_INTERVAL_MS", allow_negative_numbers = true)]
    pub flush_interval_ms: Option<i64>,

    /// Read messages from this NDJSON file instead of the configured source
    #[arg(long, env = "REDIS_RELAY_INPUT")]
    pub input: Option<PathBuf>,

    /// Run against an in-memory store instead of Redis
    #[arg(long)]
    pub dry_run: bool,

    /// Metrics server port (0 = disabled)
    #[arg(long, default_value = "0", env = "REDIS_RELAY_METRICS_PORT")]
    pub metrics_port: u16,
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to configuration file to validate
    #[arg(short, long, default_value = "relay.toml")]
    pub config: PathBuf,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `info` command
#[derive(Parser, Debug)]
pub struct InfoArgs {
    /// Path to configuration file
    #[arg(short, long, default_value = "relay.toml")]
    pub config: PathBuf,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,

    /// Show route details
    #[arg(long)]
    pub routes: bool,
}

/// Log output format
#[derive(ValueEnum, Clone, Copy, Debug, Default)]
pub enum LogFormat {
    /// JSON structured logging
    Json,
    /// Human-readable pretty format
    Pretty,
    /// Compact single-line format
    #[default]
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
