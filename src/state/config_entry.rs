//! Config entries and their typed table access.
//!
//! Config entries live in one table keyed by `(kind, name)`. Both the primary
//! `id` index and the `kind` index are case-insensitive: the key components
//! are lower-cased before encoding (see [`crate::state::index`]).
//!
//! Service intentions are not stored on their own. They are projected on read
//! from `service-intentions` entries, one [`Intention`] per source.

use crate::core::error::{FedError, FedResult};
use crate::state::index::{invalid_query_type, IndexBuilder, IndexQuery, IndexSchema, TableSchema};
use crate::state::store::{
    RaftIndex, ReadTxn, ResultIterator, StateStore, INDEX_ID, INDEX_KIND, TABLE_CONFIG_ENTRIES,
};
use crate::state::tenant::{EnterpriseMeta, TenantValidator};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

/// Kind of [`ServiceConfigEntry`].
pub const SERVICE_DEFAULTS: &str = "service-defaults";
/// Kind of [`ProxyConfigEntry`].
pub const PROXY_DEFAULTS: &str = "proxy-defaults";
/// Kind of [`ServiceIntentionsConfigEntry`].
pub const SERVICE_INTENTIONS: &str = "service-intentions";

/// The only valid name for a proxy-defaults entry.
pub const PROXY_CONFIG_GLOBAL: &str = "global";

/// Matches any service or namespace in an intention.
pub const WILDCARD: &str = "*";

/// Identity of a config entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KindName {
    pub kind: String,
    pub name: String,
    #[serde(default)]
    pub meta: EnterpriseMeta,
}

impl KindName {
    pub fn new(kind: impl Into<String>, name: impl Into<String>, meta: Option<&EnterpriseMeta>) -> Self {
        Self {
            kind: kind.into(),
            name: name.into(),
            meta: meta.cloned().unwrap_or_default(),
        }
    }
}

/// Query for all config entries of one kind.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConfigEntryKindQuery {
    pub kind: String,
    #[serde(default)]
    pub meta: EnterpriseMeta,
}

impl ConfigEntryKindQuery {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            meta: EnterpriseMeta::default(),
        }
    }

    pub fn with_meta(mut self, meta: EnterpriseMeta) -> Self {
        self.meta = meta;
        self
    }
}

/// Service defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceConfigEntry {
    pub name: String,
    #[serde(default)]
    pub protocol: String,
    #[serde(default)]
    pub meta: EnterpriseMeta,
    #[serde(default)]
    pub raft_index: RaftIndex,
}

impl ServiceConfigEntry {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_protocol(mut self, protocol: impl Into<String>) -> Self {
        self.protocol = protocol.into();
        self
    }

    pub fn with_meta(mut self, meta: EnterpriseMeta) -> Self {
        self.meta = meta;
        self
    }
}

/// Global proxy defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyConfigEntry {
    pub name: String,
    #[serde(default)]
    pub config: BTreeMap<String, String>,
    #[serde(default)]
    pub meta: EnterpriseMeta,
    #[serde(default)]
    pub raft_index: RaftIndex,
}

impl ProxyConfigEntry {
    pub fn global() -> Self {
        Self {
            name: PROXY_CONFIG_GLOBAL.to_string(),
            ..Default::default()
        }
    }
}

/// Whether an intention allows or denies traffic.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntentionAction {
    #[default]
    Allow,
    Deny,
}

/// One source of a service-intentions entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceIntention {
    pub name: String,
    #[serde(default)]
    pub meta: EnterpriseMeta,
    #[serde(default)]
    pub action: IntentionAction,
    #[serde(default)]
    pub description: String,
    /// ID carried over from intentions created before config entries.
    #[serde(default)]
    pub legacy_id: Option<String>,
}

impl SourceIntention {
    pub fn new(name: impl Into<String>, action: IntentionAction) -> Self {
        Self {
            name: name.into(),
            action,
            ..Default::default()
        }
    }
}

/// All intentions whose destination is one service.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceIntentionsConfigEntry {
    /// Destination service.
    pub name: String,
    #[serde(default)]
    pub sources: Vec<SourceIntention>,
    #[serde(default)]
    pub meta: EnterpriseMeta,
    #[serde(default)]
    pub raft_index: RaftIndex,
}

impl ServiceIntentionsConfigEntry {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_source(mut self, source: SourceIntention) -> Self {
        self.sources.push(source);
        self
    }

    /// Project one source into a standalone intention.
    pub fn to_intention(&self, src: &SourceIntention) -> Intention {
        let mut ixn = Intention {
            id: src.legacy_id.clone(),
            description: src.description.clone(),
            source_name: src.name.clone(),
            source_meta: src.meta.clone(),
            destination_name: self.name.clone(),
            destination_meta: self.meta.clone(),
            action: src.action,
            precedence: 0,
            raft_index: self.raft_index,
        };
        ixn.update_precedence();
        ixn
    }
}

/// A single source → destination rule, derived from a service-intentions entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Intention {
    pub id: Option<String>,
    pub description: String,
    pub source_name: String,
    pub source_meta: EnterpriseMeta,
    pub destination_name: String,
    pub destination_meta: EnterpriseMeta,
    pub action: IntentionAction,
    /// Higher wins when several intentions match a connection.
    pub precedence: i32,
    pub raft_index: RaftIndex,
}

impl Intention {
    /// Recompute precedence from how specific source and destination are.
    ///
    /// Exact destination beats wildcard destination, then exact source beats
    /// wildcard source; an exact namespace with a wildcard name sits between.
    pub fn update_precedence(&mut self) {
        let dst = specificity(&self.destination_meta, &self.destination_name);
        let src = specificity(&self.source_meta, &self.source_name);
        self.precedence = dst * 3 + src + 1;
    }
}

/// 2 = exact name, 1 = exact namespace with wildcard name, 0 = all wildcard.
fn specificity(meta: &EnterpriseMeta, name: &str) -> i32 {
    match (meta.namespace_or_default() == WILDCARD, name == WILDCARD) {
        (false, false) => 2,
        (false, true) => 1,
        (true, _) => 0,
    }
}

/// Ordered list of intention projections.
pub type Intentions = Vec<Intention>;

/// A stored config entry, tagged by kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum ConfigEntry {
    #[serde(rename = "service-defaults")]
    ServiceDefaults(ServiceConfigEntry),
    #[serde(rename = "proxy-defaults")]
    ProxyDefaults(ProxyConfigEntry),
    #[serde(rename = "service-intentions")]
    ServiceIntentions(ServiceIntentionsConfigEntry),
}

impl ConfigEntry {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ServiceDefaults(_) => SERVICE_DEFAULTS,
            Self::ProxyDefaults(_) => PROXY_DEFAULTS,
            Self::ServiceIntentions(_) => SERVICE_INTENTIONS,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::ServiceDefaults(e) => &e.name,
            Self::ProxyDefaults(e) => &e.name,
            Self::ServiceIntentions(e) => &e.name,
        }
    }

    pub fn enterprise_meta(&self) -> &EnterpriseMeta {
        match self {
            Self::ServiceDefaults(e) => &e.meta,
            Self::ProxyDefaults(e) => &e.meta,
            Self::ServiceIntentions(e) => &e.meta,
        }
    }

    pub fn raft_index(&self) -> RaftIndex {
        match self {
            Self::ServiceDefaults(e) => e.raft_index,
            Self::ProxyDefaults(e) => e.raft_index,
            Self::ServiceIntentions(e) => e.raft_index,
        }
    }

    fn raft_index_mut(&mut self) -> &mut RaftIndex {
        match self {
            Self::ServiceDefaults(e) => &mut e.raft_index,
            Self::ProxyDefaults(e) => &mut e.raft_index,
            Self::ServiceIntentions(e) => &mut e.raft_index,
        }
    }

    pub fn kind_name(&self) -> KindName {
        KindName::new(self.kind(), self.name(), Some(self.enterprise_meta()))
    }

    /// The service-intentions payload, if this is one.
    pub fn as_service_intentions(&self) -> Option<&ServiceIntentionsConfigEntry> {
        match self {
            Self::ServiceIntentions(e) => Some(e),
            _ => None,
        }
    }

    /// Check the entry is well formed before it is written.
    pub fn validate(&self) -> FedResult<()> {
        if self.name().is_empty() {
            return Err(FedError::invalid_argument(format!(
                "{} entry must have a name",
                self.kind()
            )));
        }

        match self {
            Self::ServiceDefaults(_) => Ok(()),
            Self::ProxyDefaults(e) => {
                if e.name != PROXY_CONFIG_GLOBAL {
                    return Err(FedError::invalid_argument(format!(
                        "invalid name ({:?}), only {:?} is supported",
                        e.name, PROXY_CONFIG_GLOBAL
                    )));
                }
                Ok(())
            }
            Self::ServiceIntentions(e) => {
                let mut seen = HashSet::new();
                for src in &e.sources {
                    if src.name.is_empty() {
                        return Err(FedError::invalid_argument(
                            "intention source must have a name",
                        ));
                    }
                    let key = (
                        src.name.to_lowercase(),
                        src.meta.namespace_or_default().to_lowercase(),
                        src.meta.partition_or_default().to_lowercase(),
                    );
                    if !seen.insert(key) {
                        return Err(FedError::invalid_argument(format!(
                            "duplicate intention source {:?} for destination {:?}",
                            src.name, e.name
                        )));
                    }
                }
                Ok(())
            }
        }
    }
}

// ============================================================================
// Indexes
// ============================================================================

fn index_from_config_entry(entry: &ConfigEntry) -> Bytes {
    let mut b = IndexBuilder::new();
    b.lowercase(entry.kind()).lowercase(entry.name());
    b.bytes()
}

/// Primary key for a [`KindName`] query: lower-cased kind, then lower-cased name.
pub fn index_from_config_entry_kind_name(arg: &IndexQuery) -> FedResult<Bytes> {
    let IndexQuery::KindName(n) = arg else {
        return Err(invalid_query_type("ConfigEntryKindName", arg));
    };
    let mut b = IndexBuilder::new();
    b.lowercase(&n.kind).lowercase(&n.name);
    Ok(b.bytes())
}

fn index_kind_from_config_entry(entry: &ConfigEntry) -> Bytes {
    let mut b = IndexBuilder::new();
    b.lowercase(entry.kind());
    b.bytes()
}

/// Kind index key for a [`ConfigEntryKindQuery`].
pub fn index_from_config_entry_kind_query(arg: &IndexQuery) -> FedResult<Bytes> {
    let IndexQuery::Kind(q) = arg else {
        return Err(invalid_query_type("ConfigEntryKind", arg));
    };
    let mut b = IndexBuilder::new();
    b.lowercase(&q.kind);
    Ok(b.bytes())
}

pub(crate) static CONFIG_ENTRIES_SCHEMA: TableSchema<ConfigEntry> = TableSchema {
    name: TABLE_CONFIG_ENTRIES,
    id: IndexSchema {
        name: INDEX_ID,
        unique: true,
        from_object: index_from_config_entry,
        from_query: index_from_config_entry_kind_name,
    },
    secondary: &[IndexSchema {
        name: INDEX_KIND,
        unique: false,
        from_object: index_kind_from_config_entry,
        from_query: index_from_config_entry_kind_query,
    }],
};

// ============================================================================
// Typed table access
// ============================================================================

/// Every config entry, in primary index order.
///
/// The scope is threaded through for tenant-aware builds; all entries are
/// visible here.
pub fn get_all_config_entries_with_txn(
    tx: &dyn ReadTxn,
    _meta: &EnterpriseMeta,
) -> FedResult<ResultIterator<ConfigEntry>> {
    Ok(tx.tables().config_entries().get_all())
}

/// Config entries of one kind (case-insensitive). Unknown kinds yield nothing.
pub fn get_config_entry_kinds_with_txn(
    tx: &dyn ReadTxn,
    kind: &str,
    meta: &EnterpriseMeta,
) -> FedResult<ResultIterator<ConfigEntry>> {
    let query = IndexQuery::Kind(ConfigEntryKindQuery::new(kind).with_meta(meta.clone()));
    tx.tables().config_entries().get(INDEX_KIND, &query)
}

/// Run the tenant-scoping hook for an entry about to be written.
pub fn validate_config_entry_enterprise(
    validator: &dyn TenantValidator,
    tx: &dyn ReadTxn,
    entry: &ConfigEntry,
) -> FedResult<()> {
    validator.validate_config_entry(tx, entry)
}

/// Flatten service-intentions entries into one intention per source.
///
/// Entry order and each entry's source order are preserved. The iterator is
/// drained completely.
pub fn config_intentions_convert_to_list<I>(iter: I, _meta: &EnterpriseMeta) -> Intentions
where
    I: IntoIterator<Item = Arc<ConfigEntry>>,
{
    let mut results = Intentions::new();
    for entry in iter {
        match entry.as_service_intentions() {
            Some(entry) => {
                results.extend(entry.sources.iter().map(|src| entry.to_intention(src)));
            }
            None => {
                tracing::debug!(
                    kind = entry.kind(),
                    name = entry.name(),
                    "skipping non-intentions config entry"
                );
            }
        }
    }
    results
}

// ============================================================================
// Store operations
// ============================================================================

impl StateStore {
    /// Look up one config entry. Returns the table index alongside it.
    pub fn config_entry(
        &self,
        kind: &str,
        name: &str,
        meta: Option<&EnterpriseMeta>,
    ) -> FedResult<(u64, Option<Arc<ConfigEntry>>)> {
        let tx = self.txn();
        let idx = tx.tables().max_index(TABLE_CONFIG_ENTRIES);
        let query = IndexQuery::KindName(KindName::new(kind, name, meta));
        let entry = tx.tables().config_entries().first(INDEX_ID, &query)?;
        Ok((idx, entry))
    }

    /// All config entries.
    pub fn config_entries(&self, meta: &EnterpriseMeta) -> FedResult<(u64, Vec<Arc<ConfigEntry>>)> {
        let tx = self.txn();
        let idx = tx.tables().max_index(TABLE_CONFIG_ENTRIES);
        let entries = get_all_config_entries_with_txn(&tx, meta)?.collect();
        Ok((idx, entries))
    }

    /// All config entries of one kind.
    pub fn config_entries_by_kind(
        &self,
        kind: &str,
        meta: &EnterpriseMeta,
    ) -> FedResult<(u64, Vec<Arc<ConfigEntry>>)> {
        let tx = self.txn();
        let idx = tx.tables().max_index(TABLE_CONFIG_ENTRIES);
        let entries = get_config_entry_kinds_with_txn(&tx, kind, meta)?.collect();
        Ok((idx, entries))
    }

    /// Every intention, projected from the service-intentions entries.
    pub fn intentions(&self, meta: &EnterpriseMeta) -> FedResult<(u64, Intentions)> {
        let tx = self.txn();
        let idx = tx.tables().max_index(TABLE_CONFIG_ENTRIES);
        let iter = get_config_entry_kinds_with_txn(&tx, SERVICE_INTENTIONS, meta)?;
        Ok((idx, config_intentions_convert_to_list(iter, meta)))
    }

    /// Create or update a config entry at index `idx`.
    ///
    /// The create index of an existing entry is preserved.
    pub fn ensure_config_entry(&self, idx: u64, mut entry: ConfigEntry) -> FedResult<()> {
        entry.validate()?;

        let mut tx = self.write_txn(idx);
        validate_config_entry_enterprise(self.tenant_validator(), &tx, &entry)?;

        let existing = tx
            .tables()
            .config_entries()
            .first(INDEX_ID, &IndexQuery::KindName(entry.kind_name()))?;
        let create_index = existing.map_or(idx, |e| e.raft_index().create_index);
        *entry.raft_index_mut() = RaftIndex {
            create_index,
            modify_index: idx,
        };

        tracing::debug!(
            kind = entry.kind(),
            name = entry.name(),
            index = idx,
            "writing config entry"
        );
        tx.insert_config_entry(entry)?;
        tx.commit();
        Ok(())
    }

    /// Delete a config entry. Returns whether one was removed.
    pub fn delete_config_entry(
        &self,
        idx: u64,
        kind: &str,
        name: &str,
        meta: Option<&EnterpriseMeta>,
    ) -> FedResult<bool> {
        let mut tx = self.write_txn(idx);
        let query = IndexQuery::KindName(KindName::new(kind, name, meta));
        let removed = tx.delete_config_entry(&query)?.is_some();
        if removed {
            tx.commit();
        }
        Ok(removed)
    }
}
