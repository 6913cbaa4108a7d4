//! Versioned in-memory store with snapshot isolation.
//!
//! The store keeps one immutable root of persistent maps. Readers clone the
//! root (`O(1)`) and observe it unchanged for as long as they hold it. A single
//! writer at a time mutates a private copy and publishes it on commit, so
//! readers never see a partially applied write and never block the writer.
//!
//! # Layout
//!
//! Every table stores rows keyed by their primary (`id`) index bytes. A
//! secondary index maps its own key bytes to the set of primary keys carrying
//! it, which keeps iteration in index order and then primary order.

use crate::core::error::{FedError, FedResult};
use crate::state::acl_token::{AclToken, ACL_TOKENS_SCHEMA};
use crate::state::config_entry::{ConfigEntry, CONFIG_ENTRIES_SCHEMA};
use crate::state::index::{IndexQuery, TableSchema};
use crate::state::tenant::{AllowAllTenants, TenantValidator};
use bytes::Bytes;
use im::{OrdMap, OrdSet};
use parking_lot::{Mutex, MutexGuard, RwLock};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Config entries table.
pub const TABLE_CONFIG_ENTRIES: &str = "config-entries";
/// ACL tokens table.
pub const TABLE_ACL_TOKENS: &str = "acl-tokens";

/// Primary index name, present on every table.
pub const INDEX_ID: &str = "id";
/// Config entries by kind.
pub const INDEX_KIND: &str = "kind";
/// ACL tokens by accessor ID.
pub const INDEX_ACCESSOR: &str = "accessor";

/// Log indexes at which a record was created and last modified.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RaftIndex {
    pub create_index: u64,
    pub modify_index: u64,
}

/// Finite, non-restartable iterator over query results.
///
/// Values are shared with the snapshot that produced them.
pub struct ResultIterator<V> {
    inner: std::vec::IntoIter<Arc<V>>,
}

impl<V> ResultIterator<V> {
    fn new(values: Vec<Arc<V>>) -> Self {
        Self {
            inner: values.into_iter(),
        }
    }
}

impl<V> Iterator for ResultIterator<V> {
    type Item = Arc<V>;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<V> ExactSizeIterator for ResultIterator<V> {}

/// One table: rows plus their secondary indexes.
pub struct Table<V: 'static> {
    schema: &'static TableSchema<V>,
    rows: OrdMap<Bytes, Arc<V>>,
    indexes: Vec<OrdMap<Bytes, OrdSet<Bytes>>>,
}

impl<V: 'static> Clone for Table<V> {
    fn clone(&self) -> Self {
        Self {
            schema: self.schema,
            rows: self.rows.clone(),
            indexes: self.indexes.clone(),
        }
    }
}

impl<V: 'static> Table<V> {
    fn new(schema: &'static TableSchema<V>) -> Self {
        Self {
            schema,
            rows: OrdMap::new(),
            indexes: vec![OrdMap::new(); schema.secondary.len()],
        }
    }

    /// Table name.
    pub fn name(&self) -> &'static str {
        self.schema.name
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Check if the table has no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Full scan in primary index order.
    pub fn get_all(&self) -> ResultIterator<V> {
        ResultIterator::new(self.rows.values().cloned().collect())
    }

    /// All rows whose `index` key equals the key built from `query`.
    pub fn get(&self, index: &str, query: &IndexQuery) -> FedResult<ResultIterator<V>> {
        if index == INDEX_ID {
            let key = (self.schema.id.from_query)(query)?;
            let found = self.rows.get(&key).cloned();
            return Ok(ResultIterator::new(found.into_iter().collect()));
        }

        let pos = self.secondary_position(index)?;
        let key = (self.schema.secondary[pos].from_query)(query)?;
        let values = match self.indexes[pos].get(&key) {
            Some(ids) => ids
                .iter()
                .filter_map(|id| self.rows.get(id).cloned())
                .collect(),
            None => Vec::new(),
        };
        Ok(ResultIterator::new(values))
    }

    /// First row matching `query` on `index`.
    pub fn first(&self, index: &str, query: &IndexQuery) -> FedResult<Option<Arc<V>>> {
        Ok(self.get(index, query)?.next())
    }

    fn secondary_position(&self, index: &str) -> FedResult<usize> {
        self.schema
            .secondary_position(index)
            .ok_or_else(|| FedError::IndexNotFound {
                table: self.schema.name.to_string(),
                index: index.to_string(),
            })
    }

    /// Insert or replace a row. Returns the replaced row.
    fn insert(&mut self, value: V) -> FedResult<Option<Arc<V>>> {
        let id = (self.schema.id.from_object)(&value);

        for (pos, idx) in self.schema.secondary.iter().enumerate() {
            if !idx.unique {
                continue;
            }
            let key = (idx.from_object)(&value);
            if let Some(owners) = self.indexes[pos].get(&key) {
                if owners.iter().any(|owner| *owner != id) {
                    return Err(FedError::invalid_argument(format!(
                        "unique index {} on table {} already holds this key",
                        idx.name, self.schema.name
                    )));
                }
            }
        }

        let previous = self.remove_by_id(&id);
        let value = Arc::new(value);
        for (pos, idx) in self.schema.secondary.iter().enumerate() {
            let key = (idx.from_object)(value.as_ref());
            let mut owners = self.indexes[pos].get(&key).cloned().unwrap_or_default();
            owners.insert(id.clone());
            self.indexes[pos].insert(key, owners);
        }
        self.rows.insert(id, value);
        Ok(previous)
    }

    /// Remove the row matching `query` on the primary index.
    fn delete(&mut self, query: &IndexQuery) -> FedResult<Option<Arc<V>>> {
        let id = (self.schema.id.from_query)(query)?;
        Ok(self.remove_by_id(&id))
    }

    fn remove_by_id(&mut self, id: &Bytes) -> Option<Arc<V>> {
        let previous = self.rows.remove(id)?;
        for (pos, idx) in self.schema.secondary.iter().enumerate() {
            let key = (idx.from_object)(previous.as_ref());
            let now_empty = match self.indexes[pos].get_mut(&key) {
                Some(owners) => {
                    owners.remove(id);
                    owners.is_empty()
                }
                None => false,
            };
            if now_empty {
                self.indexes[pos].remove(&key);
            }
        }
        Some(previous)
    }
}

/// The set of tables, published as one immutable root.
#[derive(Clone)]
pub struct Tables {
    config_entries: Table<ConfigEntry>,
    acl_tokens: Table<AclToken>,
    table_index: OrdMap<&'static str, u64>,
    /// Latest committed index across all tables.
    index: u64,
}

impl Tables {
    fn new() -> Self {
        Self {
            config_entries: Table::new(&CONFIG_ENTRIES_SCHEMA),
            acl_tokens: Table::new(&ACL_TOKENS_SCHEMA),
            table_index: OrdMap::new(),
            index: 0,
        }
    }

    /// Config entries table.
    pub fn config_entries(&self) -> &Table<ConfigEntry> {
        &self.config_entries
    }

    /// ACL tokens table.
    pub fn acl_tokens(&self) -> &Table<AclToken> {
        &self.acl_tokens
    }

    /// Latest modify index recorded for `table` (0 if never written).
    pub fn max_index(&self, table: &str) -> u64 {
        self.table_index.get(table).copied().unwrap_or(0)
    }
}

/// Read access shared by read and write transactions.
pub trait ReadTxn {
    /// The tables visible to this transaction.
    fn tables(&self) -> &Tables;

    /// Store index this transaction observes.
    fn index(&self) -> u64;
}

/// A read-only snapshot.
#[derive(Clone)]
pub struct ReadTransaction {
    root: Arc<Tables>,
    index: u64,
}

impl ReadTxn for ReadTransaction {
    fn tables(&self) -> &Tables {
        &self.root
    }

    fn index(&self) -> u64 {
        self.index
    }
}

/// The single in-flight write transaction.
///
/// Changes become visible to new readers on [`WriteTransaction::commit`].
/// Dropping the transaction without committing discards them.
pub struct WriteTransaction<'a> {
    store: &'a StateStore,
    _writer: MutexGuard<'a, ()>,
    tables: Tables,
    idx: u64,
}

impl ReadTxn for WriteTransaction<'_> {
    fn tables(&self) -> &Tables {
        &self.tables
    }

    fn index(&self) -> u64 {
        self.idx
    }
}

impl WriteTransaction<'_> {
    /// Insert or replace a config entry.
    pub fn insert_config_entry(&mut self, entry: ConfigEntry) -> FedResult<Option<Arc<ConfigEntry>>> {
        let previous = self.tables.config_entries.insert(entry)?;
        self.bump(TABLE_CONFIG_ENTRIES);
        Ok(previous)
    }

    /// Delete a config entry by its primary key.
    pub fn delete_config_entry(&mut self, query: &IndexQuery) -> FedResult<Option<Arc<ConfigEntry>>> {
        let removed = self.tables.config_entries.delete(query)?;
        if removed.is_some() {
            self.bump(TABLE_CONFIG_ENTRIES);
        }
        Ok(removed)
    }

    /// Insert or replace an ACL token.
    pub fn insert_acl_token(&mut self, token: AclToken) -> FedResult<Option<Arc<AclToken>>> {
        let previous = self.tables.acl_tokens.insert(token)?;
        self.bump(TABLE_ACL_TOKENS);
        Ok(previous)
    }

    /// Delete an ACL token by its primary key.
    pub fn delete_acl_token(&mut self, query: &IndexQuery) -> FedResult<Option<Arc<AclToken>>> {
        let removed = self.tables.acl_tokens.delete(query)?;
        if removed.is_some() {
            self.bump(TABLE_ACL_TOKENS);
        }
        Ok(removed)
    }

    fn bump(&mut self, table: &'static str) {
        self.tables.table_index.insert(table, self.idx);
    }

    /// Publish the transaction's changes.
    ///
    /// The store index travels inside the published root, so a snapshot and
    /// the index it reports always match.
    pub fn commit(self) {
        let idx = self.idx;
        let mut tables = self.tables;
        tables.index = tables.index.max(idx);
        *self.store.root.write() = Arc::new(tables);
        tracing::trace!(index = idx, "write transaction committed");
    }
}

/// The versioned state store.
pub struct StateStore {
    root: RwLock<Arc<Tables>>,
    writer: Mutex<()>,
    tenant_validator: Arc<dyn TenantValidator>,
}

impl Default for StateStore {
    fn default() -> Self {
        Self::new()
    }
}

impl StateStore {
    /// Create an empty store that accepts every tenant scope.
    pub fn new() -> Self {
        Self::with_tenant_validator(Arc::new(AllowAllTenants))
    }

    /// Create an empty store with a tenant-scoping strategy.
    pub fn with_tenant_validator(tenant_validator: Arc<dyn TenantValidator>) -> Self {
        Self {
            root: RwLock::new(Arc::new(Tables::new())),
            writer: Mutex::new(()),
            tenant_validator,
        }
    }

    /// Open a read-only snapshot of the current state.
    pub fn txn(&self) -> ReadTransaction {
        let root = self.root.read().clone();
        ReadTransaction {
            index: root.index,
            root,
        }
    }

    /// Open the write transaction, blocking while another writer is active.
    ///
    /// The snapshot is taken after the writer lock is held, so it always
    /// includes every previously committed write.
    pub fn write_txn(&self, idx: u64) -> WriteTransaction<'_> {
        let writer = self.writer.lock();
        let tables = (**self.root.read()).clone();
        WriteTransaction {
            store: self,
            _writer: writer,
            tables,
            idx,
        }
    }

    /// Latest committed index across all tables.
    pub fn latest_index(&self) -> u64 {
        self.root.read().index
    }

    /// Open the write transaction for a write originating on this node.
    ///
    /// The index is allocated under the writer lock, one past the latest
    /// committed index.
    pub fn local_write_txn(&self) -> WriteTransaction<'_> {
        let writer = self.writer.lock();
        let tables = (**self.root.read()).clone();
        let idx = tables.index + 1;
        WriteTransaction {
            store: self,
            _writer: writer,
            tables,
            idx,
        }
    }

    /// Latest modify index of one table.
    pub fn max_index(&self, table: &str) -> u64 {
        self.root.read().max_index(table)
    }

    /// The tenant-scoping strategy applied before writes.
    pub fn tenant_validator(&self) -> &dyn TenantValidator {
        self.tenant_validator.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::config_entry::{ConfigEntryKindQuery, KindName, ServiceConfigEntry};

    fn service(name: &str, protocol: &str) -> ConfigEntry {
        ConfigEntry::ServiceDefaults(ServiceConfigEntry::new(name).with_protocol(protocol))
    }

    #[test]
    fn readers_keep_their_snapshot() {
        let store = StateStore::new();
        let before = store.txn();

        let mut tx = store.write_txn(1);
        tx.insert_config_entry(service("web", "http")).unwrap();
        // Uncommitted writes are invisible.
        assert!(store.txn().tables().config_entries().is_empty());
        tx.commit();

        assert!(before.tables().config_entries().is_empty());
        assert_eq!(before.index(), 0);
        let after = store.txn();
        assert_eq!(after.tables().config_entries().len(), 1);
        assert_eq!(after.index(), 1);
        assert_eq!(store.max_index(TABLE_CONFIG_ENTRIES), 1);
    }

    #[test]
    fn dropped_write_is_discarded() {
        let store = StateStore::new();
        {
            let mut tx = store.write_txn(1);
            tx.insert_config_entry(service("web", "http")).unwrap();
        }
        assert!(store.txn().tables().config_entries().is_empty());
        assert_eq!(store.latest_index(), 0);
    }

    #[test]
    fn secondary_index_tracks_replacements_and_deletes() {
        let store = StateStore::new();
        let mut tx = store.write_txn(1);
        tx.insert_config_entry(service("web", "http")).unwrap();
        tx.insert_config_entry(service("api", "grpc")).unwrap();
        tx.insert_config_entry(service("web", "tcp")).unwrap();
        tx.commit();

        let kind = IndexQuery::Kind(ConfigEntryKindQuery::new("service-defaults"));
        let snap = store.txn();
        let names: Vec<String> = snap
            .tables()
            .config_entries()
            .get(INDEX_KIND, &kind)
            .unwrap()
            .map(|e| e.name().to_string())
            .collect();
        assert_eq!(names, vec!["api", "web"]);

        let mut tx = store.write_txn(2);
        let web = IndexQuery::KindName(KindName::new("service-defaults", "web", None));
        assert!(tx.delete_config_entry(&web).unwrap().is_some());
        assert!(tx.delete_config_entry(&web).unwrap().is_none());
        tx.commit();

        let snap = store.txn();
        assert_eq!(
            snap.tables()
                .config_entries()
                .get(INDEX_KIND, &kind)
                .unwrap()
                .count(),
            1
        );
    }

    #[test]
    fn unknown_index_and_wrong_query_type_fail() {
        let store = StateStore::new();
        let snap = store.txn();
        let table = snap.tables().config_entries();

        let err = table
            .get("bogus", &IndexQuery::Secret("x".into()))
            .err()
            .unwrap();
        assert!(matches!(err, FedError::IndexNotFound { .. }));

        let err = table
            .get(INDEX_ID, &IndexQuery::Secret("x".into()))
            .err()
            .unwrap();
        assert!(matches!(err, FedError::InvalidArgument { .. }));
    }

    #[test]
    fn snapshot_index_matches_its_tables() {
        let store = Arc::new(StateStore::new());
        let writer = {
            let store = store.clone();
            std::thread::spawn(move || {
                for idx in 1..=200u64 {
                    let mut tx = store.write_txn(idx);
                    tx.insert_config_entry(service(&format!("svc-{idx}"), "http"))
                        .unwrap();
                    tx.commit();
                }
            })
        };

        for _ in 0..200 {
            let snap = store.txn();
            assert_eq!(snap.index(), snap.tables().config_entries().len() as u64);
        }
        writer.join().unwrap();
        assert_eq!(store.latest_index(), 200);
    }
}
