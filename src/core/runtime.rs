//! Node wiring.
//!
//! A [`Node`] owns one datacenter server's write path:
//! - the replicated state store
//! - the forwarder, bound to this node's datacenter and shutdown signal
//! - the ACL service
//!
//! Shutdown is a `watch` broadcast; in-flight forwarded calls observe it and
//! finish with `Cancelled`.

use crate::acl::{AclService, AclServiceConfig};
use crate::control::forward::{Forwarder, ForwarderConfig, LeaderConnector};
use crate::core::config::Config;
use crate::state::{StateStore, TenantValidator};
use anyhow::{Context, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::watch;

/// A datacenter server node.
pub struct Node {
    config: Arc<Config>,
    store: Arc<StateStore>,
    acl: AclService,
    running: Arc<AtomicBool>,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
}

impl Node {
    /// Build a node with the default tenant validator.
    pub fn new(config: Config, connector: Arc<dyn LeaderConnector>) -> Result<Self> {
        Self::with_store(config, connector, Arc::new(StateStore::new()))
    }

    /// Build a node whose store runs `validator` before config entry writes.
    pub fn with_tenant_validator(
        config: Config,
        connector: Arc<dyn LeaderConnector>,
        validator: Arc<dyn TenantValidator>,
    ) -> Result<Self> {
        let store = Arc::new(StateStore::with_tenant_validator(validator));
        Self::with_store(config, connector, store)
    }

    fn with_store(
        config: Config,
        connector: Arc<dyn LeaderConnector>,
        store: Arc<StateStore>,
    ) -> Result<Self> {
        config.validate().context("invalid configuration")?;

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let forwarder = Forwarder::new(
            ForwarderConfig::from(&config),
            connector,
            shutdown_rx.clone(),
        );
        let acl = AclService::new(AclServiceConfig::from(&config), store.clone(), forwarder);

        tracing::info!(
            node = %config.node.node_name,
            datacenter = %config.node.datacenter,
            primary_datacenter = %config.primary_datacenter(),
            acls_enabled = config.acl.enabled,
            "node initialized"
        );

        Ok(Self {
            config: Arc::new(config),
            store,
            acl,
            running: Arc::new(AtomicBool::new(true)),
            shutdown_tx,
            shutdown_rx,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn store(&self) -> &Arc<StateStore> {
        &self.store
    }

    /// ACL service handle. Clones share the store and forwarder.
    pub fn acl(&self) -> &AclService {
        &self.acl
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Get a shutdown receiver for graceful shutdown coordination.
    pub fn shutdown_receiver(&self) -> watch::Receiver<bool> {
        self.shutdown_rx.clone()
    }

    /// Trigger graceful shutdown.
    pub fn shutdown(&self) {
        if self.running.swap(false, Ordering::AcqRel) {
            tracing::info!("shutdown requested");
            let _ = self.shutdown_tx.send(true);
        }
    }
}

impl Drop for Node {
    fn drop(&mut self) {
        self.shutdown();
    }
}
