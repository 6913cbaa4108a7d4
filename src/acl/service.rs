//! ACL service write path.
//!
//! # Logout
//!
//! ```text
//! received ──acls off──────────────────────────► FAILED_PRECONDITION
//!    │ empty token ────────────────────────────► INVALID_ARGUMENT
//!    ▼
//! forward check ──remote dc──► remote leader ──► remote result
//!    │ local
//!    ▼
//! local delete ──ok / not found────────────────► OK
//!    │ global token outside primary
//!    ▼
//! redirect to primary (once) ──────────────────► remote result
//! ```
//!
//! Permission failures map to PERMISSION_DENIED; any other local failure is
//! logged and reported as a bare INTERNAL.

use crate::acl::errors::fed_error_to_status;
use crate::acl::token_writer::{TokenWriter, TokenWriterConfig};
use crate::control::forward::{ForwardOutcome, Forwarder};
use crate::core::config::Config;
use crate::core::error::FedError;
use crate::state::StateStore;
use std::sync::Arc;
use tonic::Status;
use tracing::Instrument;
use uuid::Uuid;

const DELETE_FAILED: &str = "failed to delete token";

/// Logout request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogoutRequest {
    /// Secret of the token to revoke.
    pub token: String,
    /// Target datacenter. Empty means the local one.
    pub datacenter: String,
}

impl LogoutRequest {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            datacenter: String::new(),
        }
    }

    pub fn in_datacenter(mut self, datacenter: impl Into<String>) -> Self {
        self.datacenter = datacenter.into();
        self
    }
}

/// ACL service configuration.
#[derive(Debug, Clone)]
pub struct AclServiceConfig {
    /// This node's datacenter.
    pub datacenter: String,
    /// Datacenter owning global tokens.
    pub primary_datacenter: String,
    /// Whether ACLs are enforced.
    pub acls_enabled: bool,
    /// Whether local tokens may be written here.
    pub local_tokens_enabled: bool,
}

impl From<&Config> for AclServiceConfig {
    fn from(config: &Config) -> Self {
        Self {
            datacenter: config.node.datacenter.clone(),
            primary_datacenter: config.primary_datacenter().to_string(),
            acls_enabled: config.acl.enabled,
            local_tokens_enabled: config.acl.local_tokens_enabled,
        }
    }
}

impl AclServiceConfig {
    fn token_writer_config(&self) -> TokenWriterConfig {
        TokenWriterConfig {
            datacenter: self.datacenter.clone(),
            primary_datacenter: self.primary_datacenter.clone(),
            local_tokens_enabled: self.local_tokens_enabled,
        }
    }
}

/// What the local delete decided.
enum LocalOutcome {
    Done(Result<(), Status>),
    RedirectToPrimary,
}

/// ACL service.
#[derive(Clone)]
pub struct AclService {
    config: AclServiceConfig,
    forwarder: Forwarder,
    token_writer: TokenWriter,
}

impl AclService {
    pub fn new(config: AclServiceConfig, store: Arc<StateStore>, forwarder: Forwarder) -> Self {
        let token_writer = TokenWriter::new(config.token_writer_config(), store);
        Self {
            config,
            forwarder,
            token_writer,
        }
    }

    pub fn config(&self) -> &AclServiceConfig {
        &self.config
    }

    /// Revoke a token once the caller is done with it.
    ///
    /// Revoking a token that does not exist succeeds.
    pub async fn logout(&self, req: LogoutRequest) -> Result<(), Status> {
        let span = tracing::info_span!("logout", request_id = %Uuid::new_v4());
        self.logout_inner(req).instrument(span).await
    }

    async fn logout_inner(&self, mut req: LogoutRequest) -> Result<(), Status> {
        tracing::trace!("request received");

        self.require_acls_enabled()?;

        if req.token.is_empty() {
            return Err(Status::invalid_argument("token is required"));
        }

        let target = req.datacenter.clone();
        let forwarded = req.clone();
        match self
            .forwarder
            .forward_write_dc(&target, |client| async move { client.logout(forwarded).await })
            .await
        {
            ForwardOutcome::Handled(result) => return result,
            ForwardOutcome::Local => {}
        }

        self.require_local_tokens()?;

        match self.delete_locally(&req.token) {
            LocalOutcome::Done(result) => result,
            LocalOutcome::RedirectToPrimary => {
                req.datacenter = self.config.primary_datacenter.clone();
                self.redirect_to_primary(req).await
            }
        }
    }

    fn delete_locally(&self, secret: &str) -> LocalOutcome {
        match self.token_writer.delete(secret, true) {
            Ok(()) => LocalOutcome::Done(Ok(())),
            Err(err) if err.is_redirect() => LocalOutcome::RedirectToPrimary,
            Err(FedError::NotFound) => {
                tracing::debug!("token already absent");
                LocalOutcome::Done(Ok(()))
            }
            Err(err @ FedError::PermissionDenied { .. }) => {
                LocalOutcome::Done(Err(fed_error_to_status(&err, DELETE_FAILED)))
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to delete token");
                LocalOutcome::Done(Err(Status::internal(DELETE_FAILED)))
            }
        }
    }

    /// Re-send the request to the primary's leader. Its result is final: no
    /// further redirects follow, whatever it returns.
    async fn redirect_to_primary(&self, req: LogoutRequest) -> Result<(), Status> {
        let primary = self.config.primary_datacenter.clone();
        if primary.eq_ignore_ascii_case(&self.config.datacenter) {
            tracing::error!(
                datacenter = %primary,
                "global token redirect targets the local datacenter"
            );
            return Err(Status::internal(DELETE_FAILED));
        }

        self.forwarder.stats().record_redirect();
        tracing::debug!(primary = %primary, "redirecting global token logout to primary");
        self.forwarder
            .forward_to(&primary, |client| async move { client.logout(req).await })
            .await
    }

    fn require_acls_enabled(&self) -> Result<(), Status> {
        if !self.config.acls_enabled {
            tracing::warn!("request rejected: ACL support disabled");
            return Err(fed_error_to_status(&FedError::AclsDisabled, DELETE_FAILED));
        }
        Ok(())
    }

    fn require_local_tokens(&self) -> Result<(), Status> {
        if !self.config.local_tokens_enabled {
            tracing::warn!("request rejected: local tokens disabled");
            return Err(fed_error_to_status(
                &FedError::LocalTokensDisabled,
                DELETE_FAILED,
            ));
        }
        Ok(())
    }
}
