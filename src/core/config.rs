//! Configuration parsing and validation.
//!
//! Configuration is loaded from a TOML file with CLI overrides. The node's
//! datacenter topology lives here and is handed to the forwarder and the ACL
//! service at construction time.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Top-level fedstore configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Node identity and datacenter membership.
    pub node: NodeConfig,

    /// ACL configuration.
    #[serde(default)]
    pub acl: AclConfig,

    /// Cross-datacenter forwarding configuration.
    #[serde(default)]
    pub forwarding: ForwardingConfig,

    /// Telemetry configuration.
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

/// Node identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Datacenter this node belongs to.
    pub datacenter: String,

    /// Node name, used in logs.
    #[serde(default = "default_node_name")]
    pub node_name: String,
}

/// ACL configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AclConfig {
    /// Whether ACLs are enforced.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Datacenter that owns global tokens. Empty means this node's datacenter.
    #[serde(default)]
    pub primary_datacenter: String,

    /// Whether this datacenter may write local tokens.
    #[serde(default = "default_true")]
    pub local_tokens_enabled: bool,
}

impl Default for AclConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            primary_datacenter: String::new(),
            local_tokens_enabled: true,
        }
    }
}

/// Forwarding configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForwardingConfig {
    /// Deadline for a forwarded call, in milliseconds.
    #[serde(default = "default_forward_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for ForwardingConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_forward_timeout_ms(),
        }
    }
}

/// Telemetry configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Log level: "trace", "debug", "info", "warn", "error".
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_node_name() -> String {
    "local".to_string()
}

fn default_forward_timeout_ms() -> u64 {
    10_000
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        Self::from_toml(&content)
    }

    /// Load configuration from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content).with_context(|| "failed to parse config")?;
        config.validate()?;
        Ok(config)
    }

    /// Apply CLI overrides to the configuration.
    pub fn apply_overrides(&mut self, overrides: &ConfigOverrides) {
        if let Some(ref log_level) = overrides.log_level {
            self.telemetry.log_level = log_level.clone();
        }
        if let Some(ref datacenter) = overrides.datacenter {
            self.node.datacenter = datacenter.clone();
        }
        if let Some(ref primary) = overrides.primary_datacenter {
            self.acl.primary_datacenter = primary.clone();
        }
    }

    /// The datacenter owning global tokens.
    pub fn primary_datacenter(&self) -> &str {
        if self.acl.primary_datacenter.is_empty() {
            &self.node.datacenter
        } else {
            &self.acl.primary_datacenter
        }
    }

    /// Forwarding deadline.
    pub fn forward_timeout(&self) -> Duration {
        Duration::from_millis(self.forwarding.timeout_ms)
    }

    /// Validate configuration consistency.
    pub fn validate(&self) -> Result<()> {
        if self.node.datacenter.trim().is_empty() {
            anyhow::bail!("node.datacenter must not be empty");
        }
        if self.node.datacenter != self.node.datacenter.to_lowercase() {
            anyhow::bail!(
                "node.datacenter must be lower case, got: {}",
                self.node.datacenter
            );
        }

        if self.acl.primary_datacenter != self.acl.primary_datacenter.to_lowercase() {
            anyhow::bail!(
                "acl.primary_datacenter must be lower case, got: {}",
                self.acl.primary_datacenter
            );
        }

        if self.forwarding.timeout_ms == 0 {
            anyhow::bail!("forwarding.timeout_ms must be > 0");
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.telemetry.log_level.as_str()) {
            anyhow::bail!(
                "telemetry.log_level must be one of {:?}, got: {}",
                valid_levels,
                self.telemetry.log_level
            );
        }
        Ok(())
    }
}

/// CLI override options that can be applied to configuration.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    /// Override log level.
    pub log_level: Option<String>,
    /// Override the node's datacenter.
    pub datacenter: Option<String>,
    /// Override the primary datacenter.
    pub primary_datacenter: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primary_defaults_to_local_datacenter() {
        let config = Config::from_toml(
            r#"
[node]
datacenter = "dc1"
"#,
        )
        .unwrap();
        assert_eq!(config.primary_datacenter(), "dc1");
        assert!(config.acl.enabled);
        assert!(config.acl.local_tokens_enabled);
        assert_eq!(config.forward_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn overrides_replace_fields() {
        let mut config = Config::from_toml("[node]\ndatacenter = \"dc2\"\n").unwrap();
        config.apply_overrides(&ConfigOverrides {
            log_level: Some("debug".to_string()),
            datacenter: None,
            primary_datacenter: Some("dc1".to_string()),
        });
        assert_eq!(config.telemetry.log_level, "debug");
        assert_eq!(config.primary_datacenter(), "dc1");
    }

    #[test]
    fn zero_timeout_rejected() {
        let result = Config::from_toml(
            r#"
[node]
datacenter = "dc1"

[forwarding]
timeout_ms = 0
"#,
        );
        assert!(result.unwrap_err().to_string().contains("timeout_ms"));
    }

    #[test]
    fn mixed_case_primary_rejected() {
        let result = Config::from_toml(
            r#"
[node]
datacenter = "dc1"

[acl]
primary_datacenter = "DC1"
"#,
        );
        let err = result.unwrap_err();
        assert!(err.to_string().contains("primary_datacenter"));
    }
}
