//! State store tests.

mod common;

use fedstore::error::FedError;
use fedstore::state::config_entry::{
    config_intentions_convert_to_list, get_all_config_entries_with_txn,
    get_config_entry_kinds_with_txn, index_from_config_entry_kind_name, ConfigEntryKindQuery,
    IntentionAction, ProxyConfigEntry, ServiceConfigEntry, ServiceIntentionsConfigEntry,
    SourceIntention, SERVICE_DEFAULTS, SERVICE_INTENTIONS,
};
use fedstore::state::index::IndexQuery;
use fedstore::state::tenant::PartitionAllowList;
use fedstore::state::{ConfigEntry, EnterpriseMeta, KindName, StateStore};
use std::sync::Arc;

fn scope() -> EnterpriseMeta {
    EnterpriseMeta::default()
}

fn intentions(dest: &str, sources: &[&str]) -> ConfigEntry {
    let entry = sources.iter().fold(ServiceIntentionsConfigEntry::new(dest), |e, src| {
        e.with_source(SourceIntention::new(*src, IntentionAction::Allow))
    });
    ConfigEntry::ServiceIntentions(entry)
}

// ============================================================================
// Index codec
// ============================================================================

#[test]
fn kind_name_key_ignores_case() {
    let upper = IndexQuery::KindName(KindName::new("Service-Defaults", "Web", None));
    let lower = IndexQuery::KindName(KindName::new("service-defaults", "web", None));
    assert_eq!(
        index_from_config_entry_kind_name(&upper).unwrap(),
        index_from_config_entry_kind_name(&lower).unwrap()
    );
}

#[test]
fn kind_name_key_keeps_boundaries() {
    let a = IndexQuery::KindName(KindName::new("ab", "c", None));
    let b = IndexQuery::KindName(KindName::new("a", "bc", None));
    assert_ne!(
        index_from_config_entry_kind_name(&a).unwrap(),
        index_from_config_entry_kind_name(&b).unwrap()
    );
}

#[test]
fn wrong_query_variant_is_invalid_argument() {
    let query = IndexQuery::Kind(ConfigEntryKindQuery::new(SERVICE_DEFAULTS));
    assert!(matches!(
        index_from_config_entry_kind_name(&query),
        Err(FedError::InvalidArgument { .. })
    ));
}

// ============================================================================
// Typed access
// ============================================================================

#[test]
fn lookups_are_case_insensitive() {
    let store = StateStore::new();
    store
        .ensure_config_entry(
            1,
            ConfigEntry::ServiceDefaults(ServiceConfigEntry::new("Web").with_protocol("http")),
        )
        .unwrap();

    let (idx, entry) = store.config_entry("SERVICE-DEFAULTS", "web", None).unwrap();
    assert_eq!(idx, 1);
    assert_eq!(entry.unwrap().name(), "Web");
}

#[test]
fn unknown_kind_yields_empty_sequence() {
    let store = StateStore::new();
    store
        .ensure_config_entry(1, ConfigEntry::ProxyDefaults(ProxyConfigEntry::global()))
        .unwrap();

    let tx = store.txn();
    let mut iter = get_config_entry_kinds_with_txn(&tx, "no-such-kind", &scope()).unwrap();
    assert!(iter.next().is_none());
}

#[test]
fn all_entries_span_kinds() {
    let store = StateStore::new();
    store
        .ensure_config_entry(1, ConfigEntry::ProxyDefaults(ProxyConfigEntry::global()))
        .unwrap();
    store.ensure_config_entry(2, intentions("api", &["web"])).unwrap();

    let tx = store.txn();
    let kinds: Vec<_> = get_all_config_entries_with_txn(&tx, &scope())
        .unwrap()
        .map(|e| e.kind())
        .collect();
    assert_eq!(kinds.len(), 2);
    assert!(kinds.contains(&SERVICE_INTENTIONS));
}

#[test]
fn reader_keeps_its_snapshot() {
    let store = StateStore::new();
    store.ensure_config_entry(1, intentions("api", &["web"])).unwrap();

    let tx = store.txn();
    store.ensure_config_entry(2, intentions("db", &["api"])).unwrap();

    let seen = get_config_entry_kinds_with_txn(&tx, SERVICE_INTENTIONS, &scope())
        .unwrap()
        .count();
    assert_eq!(seen, 1);
    assert_eq!(store.config_entries(&scope()).unwrap().1.len(), 2);
}

#[test]
fn update_preserves_create_index() {
    let store = StateStore::new();
    store.ensure_config_entry(3, intentions("api", &["web"])).unwrap();
    store.ensure_config_entry(9, intentions("api", &["web", "db"])).unwrap();

    let (_, entry) = store.config_entry(SERVICE_INTENTIONS, "api", None).unwrap();
    let raft = entry.unwrap().raft_index();
    assert_eq!(raft.create_index, 3);
    assert_eq!(raft.modify_index, 9);
}

#[test]
fn foreign_partition_is_rejected_by_allow_list() {
    let store = StateStore::with_tenant_validator(Arc::new(PartitionAllowList::new(["default"])));
    let entry = ConfigEntry::ServiceDefaults(
        ServiceConfigEntry::new("web").with_meta(EnterpriseMeta::new("team-b", "default")),
    );

    let err = store.ensure_config_entry(1, entry).unwrap_err();
    assert!(matches!(err, FedError::PermissionDenied { .. }));
    assert!(store.config_entries(&scope()).unwrap().1.is_empty());
}

// ============================================================================
// Projection
// ============================================================================

#[test]
fn projection_flattens_sources_in_order() {
    let store = StateStore::new();
    store.ensure_config_entry(1, intentions("api", &["web", "*"])).unwrap();
    store.ensure_config_entry(2, intentions("db", &["api"])).unwrap();

    let (_, list) = store.intentions(&scope()).unwrap();
    let pairs: Vec<_> = list
        .iter()
        .map(|i| (i.destination_name.as_str(), i.source_name.as_str()))
        .collect();
    assert_eq!(pairs, vec![("api", "web"), ("api", "*"), ("db", "api")]);
}

#[test]
fn projection_skips_other_kinds() {
    let entries = vec![
        Arc::new(ConfigEntry::ProxyDefaults(ProxyConfigEntry::global())),
        Arc::new(intentions("api", &["web"])),
    ];
    let list = config_intentions_convert_to_list(entries, &scope());
    assert_eq!(list.len(), 1);
    assert_eq!(list[0].destination_name, "api");
}

#[test]
fn projection_of_nothing_is_empty() {
    let store = StateStore::new();
    let (_, list) = store.intentions(&scope()).unwrap();
    assert!(list.is_empty());
}
