//! Command-line interface.

pub mod commands;

use crate::core::config::Config;
use clap::{Parser, Subcommand};
use std::path::Path;

/// fedstore - federated control-plane state store.
#[derive(Parser, Debug)]
#[command(name = "fedstore")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Configuration file path.
    #[arg(short, long, global = true, default_value = "config/fedstore.toml")]
    pub config: String,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Configuration operations.
    Config(commands::ConfigArgs),
}

/// Log level for the subscriber: `--log-level`, else the configured
/// `telemetry.log_level`, else `info` when the config cannot be read.
pub fn resolve_log_level(cli_level: Option<&str>, config_path: &Path) -> String {
    if let Some(level) = cli_level {
        return level.to_string();
    }
    match Config::from_file(config_path) {
        Ok(config) => config.telemetry.log_level,
        Err(_) => "info".to_string(),
    }
}

#[cfg(feature = "telemetry")]
pub fn init_tracing(default_level: &str) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_target(true))
        .with(filter)
        .try_init();
}

#[cfg(not(feature = "telemetry"))]
pub fn init_tracing(_default_level: &str) {}
