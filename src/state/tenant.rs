//! Tenant scoping.
//!
//! Every stored record carries an [`EnterpriseMeta`] naming the partition and
//! namespace it belongs to. The base deployment treats all records as visible
//! and writable ([`AllowAllTenants`]); a deployment that enforces tenancy plugs
//! a stricter [`TenantValidator`] into the store instead.

use crate::core::error::{FedError, FedResult};
use crate::state::config_entry::ConfigEntry;
use crate::state::store::ReadTxn;
use serde::{Deserialize, Serialize};

/// Name of the default partition and namespace.
pub const DEFAULT_SCOPE: &str = "default";

/// Partition and namespace of a record or a query.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EnterpriseMeta {
    /// Admin partition. Empty means the default partition.
    #[serde(default)]
    pub partition: String,
    /// Namespace. Empty means the default namespace.
    #[serde(default)]
    pub namespace: String,
}

impl EnterpriseMeta {
    /// Create a scope.
    pub fn new(partition: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            partition: partition.into(),
            namespace: namespace.into(),
        }
    }

    /// Partition name with the default filled in.
    pub fn partition_or_default(&self) -> &str {
        if self.partition.is_empty() {
            DEFAULT_SCOPE
        } else {
            &self.partition
        }
    }

    /// Namespace name with the default filled in.
    pub fn namespace_or_default(&self) -> &str {
        if self.namespace.is_empty() {
            DEFAULT_SCOPE
        } else {
            &self.namespace
        }
    }
}

/// Tenant-scoping strategy consulted before config entry writes.
pub trait TenantValidator: Send + Sync {
    /// Reject `entry` if the writer may not touch its scope.
    fn validate_config_entry(&self, tx: &dyn ReadTxn, entry: &ConfigEntry) -> FedResult<()>;
}

/// Accepts every scope.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAllTenants;

impl TenantValidator for AllowAllTenants {
    fn validate_config_entry(&self, _tx: &dyn ReadTxn, _entry: &ConfigEntry) -> FedResult<()> {
        Ok(())
    }
}

/// Accepts only entries in an explicit set of partitions.
#[derive(Debug, Clone, Default)]
pub struct PartitionAllowList {
    partitions: Vec<String>,
}

impl PartitionAllowList {
    /// Create an allow list. Partition names compare case-insensitively.
    pub fn new<I, S>(partitions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            partitions: partitions
                .into_iter()
                .map(|p| p.as_ref().to_lowercase())
                .collect(),
        }
    }
}

impl TenantValidator for PartitionAllowList {
    fn validate_config_entry(&self, _tx: &dyn ReadTxn, entry: &ConfigEntry) -> FedResult<()> {
        let partition = entry.enterprise_meta().partition_or_default().to_lowercase();
        if self.partitions.iter().any(|p| *p == partition) {
            return Ok(());
        }
        Err(FedError::permission_denied(format!(
            "cannot write {} {:?} into partition {:?}",
            entry.kind(),
            entry.name(),
            partition
        )))
    }
}
