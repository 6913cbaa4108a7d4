//! fedstore - CLI entrypoint.
//!
//! Usage:
//!   fedstore config validate --config config/fedstore.toml
//!   fedstore config show --format json

use anyhow::Result;
use clap::Parser;
use fedstore::cli::commands::run_config;
use fedstore::cli::{init_tracing, resolve_log_level, Cli, Commands};
use fedstore::core::config::ConfigOverrides;
use std::path::PathBuf;

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_path = PathBuf::from(&cli.config);
    init_tracing(&resolve_log_level(cli.log_level.as_deref(), &config_path));

    let overrides = ConfigOverrides {
        log_level: cli.log_level.clone(),
        ..Default::default()
    };

    match cli.command {
        Commands::Config(args) => run_config(args, &config_path, &overrides),
    }
}
