//! Config command implementation.

use crate::core::config::{Config, ConfigOverrides};
use anyhow::{Context, Result};
use clap::{Args, Subcommand, ValueEnum};
use std::path::Path;

/// Configuration operations.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

/// Config subcommands.
#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Validate the configuration file.
    Validate,
    /// Print the configuration with defaults applied.
    Show {
        /// Output format.
        #[arg(long, value_enum, default_value_t = OutputFormat::Toml)]
        format: OutputFormat,
    },
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Toml,
    Json,
}

/// Run the config command against the file at `path`.
pub fn run_config(args: ConfigArgs, path: &Path, overrides: &ConfigOverrides) -> Result<()> {
    let config = load(path, overrides)?;
    match args.command {
        ConfigCommand::Validate => {
            println!("{}", describe(&config));
            Ok(())
        }
        ConfigCommand::Show { format } => {
            println!("{}", render(&config, format)?);
            Ok(())
        }
    }
}

fn load(path: &Path, overrides: &ConfigOverrides) -> Result<Config> {
    if !path.exists() {
        anyhow::bail!("Config file not found: {}", path.display());
    }
    let mut config = Config::from_file(path)?;
    config.apply_overrides(overrides);
    config
        .validate()
        .with_context(|| format!("invalid configuration in {}", path.display()))?;
    Ok(config)
}

fn describe(config: &Config) -> String {
    let mut out = format!(
        "✓ Configuration is valid\n  datacenter: {}\n  primary datacenter: {}",
        config.node.datacenter,
        config.primary_datacenter()
    );
    if !config.acl.enabled {
        out.push_str("\n  ⚠ Warning: ACLs are disabled");
    }
    if config.primary_datacenter() != config.node.datacenter && !config.acl.local_tokens_enabled {
        out.push_str("\n  ⚠ Warning: local tokens disabled; logouts will be rejected");
    }
    out
}

fn render(config: &Config, format: OutputFormat) -> Result<String> {
    Ok(match format {
        OutputFormat::Json => serde_json::to_string_pretty(config)?,
        OutputFormat::Toml => toml::to_string_pretty(config)?,
    })
}
