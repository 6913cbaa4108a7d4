//! Core infrastructure tests.

mod common;

use common::{create_config_with_settings, create_minimal_config, write_config, RecordingConnector, SharedConnector};
use fedstore::acl::LogoutRequest;
use fedstore::core::config::{Config, ConfigOverrides};
use fedstore::core::error::FedError;
use fedstore::runtime::Node;
use fedstore::state::AclToken;
use std::sync::Arc;
use std::time::Duration;

// ============================================================================
// Config tests
// ============================================================================

#[test]
fn parse_minimal_config() {
    let file = create_minimal_config();
    let config = Config::from_file(file.path()).unwrap();
    assert_eq!(config.node.datacenter, "dc1");
    assert_eq!(config.primary_datacenter(), "dc1");
    assert_eq!(config.telemetry.log_level, "info");
}

#[test]
fn parse_full_config() {
    let file = create_config_with_settings("dc2", "dc1", false, "debug");
    let config = Config::from_file(file.path()).unwrap();
    assert_eq!(config.node.node_name, "server-1");
    assert_eq!(config.primary_datacenter(), "dc1");
    assert!(!config.acl.local_tokens_enabled);
    assert_eq!(config.forward_timeout(), Duration::from_millis(500));
}

#[test]
fn missing_node_section_is_rejected() {
    let file = write_config("[acl]\nenabled = true\n");
    assert!(Config::from_file(file.path()).is_err());
}

#[test]
fn empty_datacenter_is_rejected() {
    let file = write_config("[node]\ndatacenter = \"\"\n");
    let err = Config::from_file(file.path()).unwrap_err();
    assert!(err.to_string().contains("datacenter"));
}

#[test]
fn invalid_log_level_is_rejected() {
    let file = create_config_with_settings("dc1", "dc1", true, "chatty");
    let err = Config::from_file(file.path()).unwrap_err();
    assert!(err.to_string().contains("log_level"));
}

#[test]
fn mixed_case_primary_datacenter_is_rejected() {
    let file = write_config(
        r#"
[node]
datacenter = "dc1"

[acl]
primary_datacenter = "DC1"
"#,
    );
    let err = Config::from_file(file.path()).unwrap_err();
    assert!(err.to_string().contains("primary_datacenter"));
}

#[test]
fn mixed_case_primary_override_is_rejected_by_node() {
    let file = create_minimal_config();
    let mut config = Config::from_file(file.path()).unwrap();
    config.apply_overrides(&ConfigOverrides {
        primary_datacenter: Some("DC1".to_string()),
        ..Default::default()
    });

    let remote = RecordingConnector::new();
    assert!(Node::new(config, Arc::new(SharedConnector(remote))).is_err());
}

#[test]
fn overrides_apply_after_load() {
    let file = create_minimal_config();
    let mut config = Config::from_file(file.path()).unwrap();
    config.apply_overrides(&ConfigOverrides {
        datacenter: Some("dc3".to_string()),
        primary_datacenter: Some("dc1".to_string()),
        ..Default::default()
    });
    assert!(config.validate().is_ok());
    assert_eq!(config.node.datacenter, "dc3");
    assert_eq!(config.primary_datacenter(), "dc1");
}

// ============================================================================
// Error tests
// ============================================================================

#[test]
fn redirect_signal_is_distinguishable() {
    assert!(FedError::CannotWriteGlobalToken.is_redirect());
    assert!(!FedError::NotFound.is_redirect());
}

// ============================================================================
// Node tests
// ============================================================================

#[tokio::test]
async fn node_from_config_file_runs_logout() {
    let file = create_config_with_settings("dc2", "dc1", true, "info");
    let config = Config::from_file(file.path()).unwrap();
    let remote = RecordingConnector::new();
    let node = Node::new(config, Arc::new(SharedConnector(remote.clone()))).unwrap();

    node.store()
        .acl_token_set(1, AclToken::new("acc", "tok").with_auth_method("jwt"))
        .unwrap();
    node.acl().logout(LogoutRequest::new("tok")).await.unwrap();

    let calls = remote.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].datacenter, "dc1");
}

#[tokio::test]
async fn node_shutdown_stops_new_forwarding() {
    let file = create_minimal_config();
    let config = Config::from_file(file.path()).unwrap();
    let remote = RecordingConnector::new();
    let node = Node::new(config, Arc::new(SharedConnector(remote.clone()))).unwrap();

    node.shutdown();
    let err = node
        .acl()
        .logout(LogoutRequest::new("tok").in_datacenter("dc2"))
        .await
        .unwrap_err();
    assert_eq!(err.code(), tonic::Code::Cancelled);
    assert!(remote.calls().is_empty());
}
