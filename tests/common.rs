//! Common test utilities.
//!
//! This module contains shared helpers for integration tests.
//! Import with `mod common;` in test files.

#![allow(dead_code)]

use fedstore::acl::{AclService, AclServiceConfig, LogoutRequest};
use fedstore::control::forward::{
    AclServiceClient, BoxFuture, Forwarder, ForwarderConfig, LeaderConnector,
};
use fedstore::state::StateStore;
use parking_lot::Mutex;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use tempfile::NamedTempFile;
use tokio::sync::watch;
use tonic::Status;

/// Create a minimal valid configuration file.
pub fn create_minimal_config() -> NamedTempFile {
    write_config(
        r#"
[node]
datacenter = "dc1"
"#,
    )
}

/// Create a configuration for a node in `datacenter` whose primary is `primary`.
pub fn create_config_with_settings(
    datacenter: &str,
    primary: &str,
    local_tokens_enabled: bool,
    log_level: &str,
) -> NamedTempFile {
    write_config(&format!(
        r#"
[node]
datacenter = "{}"
node_name = "server-1"

[acl]
enabled = true
primary_datacenter = "{}"
local_tokens_enabled = {}

[forwarding]
timeout_ms = 500

[telemetry]
log_level = "{}"
"#,
        datacenter, primary, local_tokens_enabled, log_level
    ))
}

pub fn write_config(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("Failed to create temp file");
    file.write_all(content.as_bytes())
        .expect("Failed to write config");
    file
}

/// One call seen by a remote leader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForwardedCall {
    /// Datacenter the connection was opened to.
    pub datacenter: String,
    pub request: LogoutRequest,
}

/// Fake transport recording every call that leaves the local datacenter.
#[derive(Default)]
pub struct RecordingConnector {
    calls: Mutex<Vec<ForwardedCall>>,
    reply: Mutex<Option<Status>>,
    delay: Mutex<Option<Duration>>,
}

impl RecordingConnector {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Make every remote leader answer with `status`.
    pub fn reply_with(&self, status: Status) {
        *self.reply.lock() = Some(status);
    }

    /// Make every remote leader take `delay` before answering.
    pub fn delay_by(&self, delay: Duration) {
        *self.delay.lock() = Some(delay);
    }

    pub fn calls(&self) -> Vec<ForwardedCall> {
        self.calls.lock().clone()
    }
}

struct RecordingClient {
    datacenter: String,
    connector: Arc<RecordingConnector>,
}

impl AclServiceClient for RecordingClient {
    fn logout(&self, request: LogoutRequest) -> BoxFuture<'_, Result<(), Status>> {
        let reply = self.connector.reply.lock().clone();
        let delay = *self.connector.delay.lock();
        Box::pin(async move {
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            self.connector.calls.lock().push(ForwardedCall {
                datacenter: self.datacenter.clone(),
                request,
            });
            match reply {
                Some(status) => Err(status),
                None => Ok(()),
            }
        })
    }
}

/// Connector handle sharing one recorder.
pub struct SharedConnector(pub Arc<RecordingConnector>);

impl LeaderConnector for SharedConnector {
    fn connect(&self, datacenter: &str) -> BoxFuture<'_, Result<Arc<dyn AclServiceClient>, Status>> {
        let client: Arc<dyn AclServiceClient> = Arc::new(RecordingClient {
            datacenter: datacenter.to_string(),
            connector: self.0.clone(),
        });
        Box::pin(async move { Ok(client) })
    }
}

/// An ACL service wired to a fresh store and a recording transport.
pub struct TestCluster {
    pub service: AclService,
    pub store: Arc<StateStore>,
    pub remote: Arc<RecordingConnector>,
    pub shutdown_tx: watch::Sender<bool>,
}

pub fn cluster(datacenter: &str, primary: &str) -> TestCluster {
    cluster_with(AclServiceConfig {
        datacenter: datacenter.to_string(),
        primary_datacenter: primary.to_string(),
        acls_enabled: true,
        local_tokens_enabled: true,
    })
}

pub fn cluster_with(config: AclServiceConfig) -> TestCluster {
    let store = Arc::new(StateStore::new());
    let remote = RecordingConnector::new();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let forwarder = Forwarder::new(
        ForwarderConfig {
            datacenter: config.datacenter.clone(),
            timeout: Duration::from_secs(120),
        },
        Arc::new(SharedConnector(remote.clone())),
        shutdown_rx,
    );
    TestCluster {
        service: AclService::new(config, store.clone(), forwarder),
        store,
        remote,
        shutdown_tx,
    }
}
