//! Local token mutations.
//!
//! The writer applies token changes to this datacenter's store and reports,
//! through [`FedError`], why a change could not be applied here. Callers decide
//! what those signals mean for the client.

use crate::core::config::Config;
use crate::core::error::{FedError, FedResult};
use crate::state::index::IndexQuery;
use crate::state::store::{ReadTxn, StateStore, INDEX_ID};
use std::sync::Arc;

/// Datacenter topology as seen by the token writer.
#[derive(Debug, Clone)]
pub struct TokenWriterConfig {
    /// This node's datacenter.
    pub datacenter: String,
    /// Datacenter owning global tokens.
    pub primary_datacenter: String,
    /// Whether local tokens may be written here.
    pub local_tokens_enabled: bool,
}

impl From<&Config> for TokenWriterConfig {
    fn from(config: &Config) -> Self {
        Self {
            datacenter: config.node.datacenter.clone(),
            primary_datacenter: config.primary_datacenter().to_string(),
            local_tokens_enabled: config.acl.local_tokens_enabled,
        }
    }
}

impl TokenWriterConfig {
    pub fn in_primary_datacenter(&self) -> bool {
        self.datacenter.eq_ignore_ascii_case(&self.primary_datacenter)
    }
}

/// Applies token writes to the local store.
#[derive(Clone)]
pub struct TokenWriter {
    config: TokenWriterConfig,
    store: Arc<StateStore>,
}

impl TokenWriter {
    pub fn new(config: TokenWriterConfig, store: Arc<StateStore>) -> Self {
        Self { config, store }
    }

    /// Delete the token with `secret`.
    ///
    /// Checks run in this order, inside one write transaction:
    /// 1. token absent → `NotFound`
    /// 2. global token outside the primary → `CannotWriteGlobalToken`
    /// 3. local tokens disabled here → `LocalTokensDisabled`
    /// 4. `from_logout` on a token not minted by login → `PermissionDenied`
    pub fn delete(&self, secret: &str, from_logout: bool) -> FedResult<()> {
        let mut tx = self.store.local_write_txn();
        let query = IndexQuery::Secret(secret.to_string());

        let token = tx
            .tables()
            .acl_tokens()
            .first(INDEX_ID, &query)?
            .ok_or(FedError::NotFound)?;

        if token.is_global() && !self.config.in_primary_datacenter() {
            return Err(FedError::CannotWriteGlobalToken);
        }
        if !self.config.local_tokens_enabled {
            return Err(FedError::LocalTokensDisabled);
        }
        if from_logout && !token.from_login() {
            return Err(FedError::permission_denied(
                "token wasn't created via login",
            ));
        }

        let idx = tx.index();
        tx.delete_acl_token(&query)?;
        tx.commit();

        tracing::debug!(
            accessor_id = %token.accessor_id,
            index = idx,
            "deleted ACL token"
        );
        Ok(())
    }
}
