//! Write forwarding across datacenters.
//!
//! A write addressed to another datacenter is handed to that datacenter's
//! leader over the transport layer; anything addressed to the local
//! datacenter (or to no datacenter) runs locally:
//!
//! ```text
//! datacenter == ""        → Local
//! datacenter == local dc  → Local
//! otherwise               → Handled(remote result)
//! ```
//!
//! Remote errors, including transport failures, come back unchanged. The
//! forwarder only adds two outcomes of its own: `DeadlineExceeded` when the
//! configured timeout expires and `Cancelled` when the node shuts down while
//! the call is in flight.

use crate::acl::LogoutRequest;
use crate::core::config::Config;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tonic::Status;

/// Boxed future returned by the transport traits.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// ACL service client bound to a remote leader.
pub trait AclServiceClient: Send + Sync {
    /// Revoke a token on the remote leader.
    fn logout(&self, req: LogoutRequest) -> BoxFuture<'_, Result<(), Status>>;
}

/// Opens (or reuses) connections to the leader of a datacenter.
///
/// Pooling and leader discovery belong to the implementation.
pub trait LeaderConnector: Send + Sync {
    /// Connect to the leader of `datacenter`.
    fn connect(&self, datacenter: &str) -> BoxFuture<'_, Result<Arc<dyn AclServiceClient>, Status>>;
}

/// Forwarder configuration.
#[derive(Debug, Clone)]
pub struct ForwarderConfig {
    /// This node's datacenter.
    pub datacenter: String,
    /// Deadline for one forwarded call.
    pub timeout: Duration,
}

impl From<&Config> for ForwarderConfig {
    fn from(config: &Config) -> Self {
        Self {
            datacenter: config.node.datacenter.clone(),
            timeout: config.forward_timeout(),
        }
    }
}

/// Result of a forwarding decision.
#[derive(Debug)]
pub enum ForwardOutcome<T> {
    /// The caller must execute the write locally.
    Local,
    /// The write ran remotely; this is its result.
    Handled(Result<T, Status>),
}

impl<T> ForwardOutcome<T> {
    /// Whether the request was forwarded.
    pub fn is_handled(&self) -> bool {
        matches!(self, Self::Handled(_))
    }
}

/// Forwarding statistics.
#[derive(Debug, Default)]
pub struct ForwardStats {
    forwarded: AtomicU64,
    redirected: AtomicU64,
    failed: AtomicU64,
}

/// Point-in-time copy of [`ForwardStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ForwardStatsSnapshot {
    pub forwarded: u64,
    pub redirected: u64,
    pub failed: u64,
}

impl ForwardStats {
    /// Count a redirect to the primary datacenter.
    pub fn record_redirect(&self) {
        self.redirected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> ForwardStatsSnapshot {
        ForwardStatsSnapshot {
            forwarded: self.forwarded.load(Ordering::Relaxed),
            redirected: self.redirected.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}

/// Routes writes to the leader of their target datacenter.
#[derive(Clone)]
pub struct Forwarder {
    config: ForwarderConfig,
    connector: Arc<dyn LeaderConnector>,
    shutdown_rx: watch::Receiver<bool>,
    stats: Arc<ForwardStats>,
}

impl Forwarder {
    /// Create a forwarder. In-flight calls are cancelled once `shutdown_rx`
    /// observes `true`.
    pub fn new(
        config: ForwarderConfig,
        connector: Arc<dyn LeaderConnector>,
        shutdown_rx: watch::Receiver<bool>,
    ) -> Self {
        Self {
            config,
            connector,
            shutdown_rx,
            stats: Arc::new(ForwardStats::default()),
        }
    }

    /// This node's datacenter.
    pub fn local_datacenter(&self) -> &str {
        &self.config.datacenter
    }

    pub fn stats(&self) -> &ForwardStats {
        &self.stats
    }

    /// Whether a write addressed to `datacenter` must leave this datacenter.
    pub fn should_forward(&self, datacenter: &str) -> bool {
        !datacenter.is_empty() && datacenter != self.config.datacenter
    }

    /// Forward `op` to `datacenter` unless it is local.
    pub async fn forward_write_dc<T, F, Fut>(&self, datacenter: &str, op: F) -> ForwardOutcome<T>
    where
        F: FnOnce(Arc<dyn AclServiceClient>) -> Fut,
        Fut: Future<Output = Result<T, Status>>,
    {
        if !self.should_forward(datacenter) {
            return ForwardOutcome::Local;
        }
        ForwardOutcome::Handled(self.forward_to(datacenter, op).await)
    }

    /// Forward `op` to the leader of `datacenter` unconditionally.
    pub async fn forward_to<T, F, Fut>(&self, datacenter: &str, op: F) -> Result<T, Status>
    where
        F: FnOnce(Arc<dyn AclServiceClient>) -> Fut,
        Fut: Future<Output = Result<T, Status>>,
    {
        self.stats.forwarded.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(datacenter, "forwarding write to datacenter leader");

        let call = async {
            let client = self.connector.connect(datacenter).await?;
            op(client).await
        };

        let mut shutdown_rx = self.shutdown_rx.clone();
        // Shutdown is polled first: nothing new leaves once it is signalled.
        let result = tokio::select! {
            biased;
            _ = wait_for_shutdown(&mut shutdown_rx) => {
                Err(Status::cancelled("request cancelled: server shutting down"))
            }
            res = tokio::time::timeout(self.config.timeout, call) => match res {
                Ok(res) => res,
                Err(_) => Err(Status::deadline_exceeded(format!(
                    "forwarded request to datacenter {} timed out after {:?}",
                    datacenter, self.config.timeout
                ))),
            },
        };

        if let Err(ref status) = result {
            self.stats.failed.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(
                datacenter,
                code = ?status.code(),
                message = status.message(),
                "forwarded write failed"
            );
        }
        result
    }
}

/// Resolves once shutdown is signalled. Never resolves if the sender is gone
/// without signalling.
async fn wait_for_shutdown(rx: &mut watch::Receiver<bool>) {
    loop {
        if *rx.borrow_and_update() {
            return;
        }
        if rx.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}
