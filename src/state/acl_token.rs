//! ACL tokens.
//!
//! Tokens are keyed by their secret. Secrets and accessor IDs are opaque and
//! compared byte for byte, unlike config entry keys.

use crate::core::error::{FedError, FedResult};
use crate::state::index::{invalid_query_type, IndexBuilder, IndexQuery, IndexSchema, TableSchema};
use crate::state::store::{
    RaftIndex, ReadTxn, StateStore, INDEX_ACCESSOR, INDEX_ID, TABLE_ACL_TOKENS,
};
use crate::state::tenant::EnterpriseMeta;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// An ACL token.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AclToken {
    /// Public identifier.
    pub accessor_id: String,
    /// Bearer secret.
    pub secret_id: String,
    #[serde(default)]
    pub description: String,
    /// Local tokens live in one datacenter; global ones are owned by the primary.
    #[serde(default)]
    pub local: bool,
    /// Auth method that minted the token via login, if any.
    #[serde(default)]
    pub auth_method: Option<String>,
    #[serde(default)]
    pub policies: Vec<String>,
    #[serde(default)]
    pub meta: EnterpriseMeta,
    #[serde(default)]
    pub raft_index: RaftIndex,
}

impl AclToken {
    pub fn new(accessor_id: impl Into<String>, secret_id: impl Into<String>) -> Self {
        Self {
            accessor_id: accessor_id.into(),
            secret_id: secret_id.into(),
            ..Default::default()
        }
    }

    pub fn local(mut self) -> Self {
        self.local = true;
        self
    }

    pub fn with_auth_method(mut self, method: impl Into<String>) -> Self {
        self.auth_method = Some(method.into());
        self
    }

    pub fn with_policy(mut self, policy: impl Into<String>) -> Self {
        self.policies.push(policy.into());
        self
    }

    /// Owned by the primary datacenter.
    pub fn is_global(&self) -> bool {
        !self.local
    }

    /// Minted by a login rather than created directly.
    pub fn from_login(&self) -> bool {
        self.auth_method.as_deref().is_some_and(|m| !m.is_empty())
    }
}

fn single(s: &str) -> Bytes {
    let mut b = IndexBuilder::new();
    b.string(s);
    b.bytes()
}

fn index_secret_from_token(token: &AclToken) -> Bytes {
    single(&token.secret_id)
}

fn index_secret_from_query(arg: &IndexQuery) -> FedResult<Bytes> {
    match arg {
        IndexQuery::Secret(secret) => Ok(single(secret)),
        other => Err(invalid_query_type("ACLToken secret", other)),
    }
}

fn index_accessor_from_token(token: &AclToken) -> Bytes {
    single(&token.accessor_id)
}

fn index_accessor_from_query(arg: &IndexQuery) -> FedResult<Bytes> {
    match arg {
        IndexQuery::Accessor(accessor) => Ok(single(accessor)),
        other => Err(invalid_query_type("ACLToken accessor", other)),
    }
}

pub(crate) static ACL_TOKENS_SCHEMA: TableSchema<AclToken> = TableSchema {
    name: TABLE_ACL_TOKENS,
    id: IndexSchema {
        name: INDEX_ID,
        unique: true,
        from_object: index_secret_from_token,
        from_query: index_secret_from_query,
    },
    secondary: &[IndexSchema {
        name: INDEX_ACCESSOR,
        unique: true,
        from_object: index_accessor_from_token,
        from_query: index_accessor_from_query,
    }],
};

impl StateStore {
    /// Create or replace a token at index `idx`.
    pub fn acl_token_set(&self, idx: u64, mut token: AclToken) -> FedResult<()> {
        if token.secret_id.is_empty() {
            return Err(FedError::invalid_argument("token secret is required"));
        }
        if token.accessor_id.is_empty() {
            return Err(FedError::invalid_argument("token accessor ID is required"));
        }

        let mut tx = self.write_txn(idx);
        let existing = tx
            .tables()
            .acl_tokens()
            .first(INDEX_ID, &IndexQuery::Secret(token.secret_id.clone()))?;
        token.raft_index = RaftIndex {
            create_index: existing.map_or(idx, |t| t.raft_index.create_index),
            modify_index: idx,
        };
        tx.insert_acl_token(token)?;
        tx.commit();
        Ok(())
    }

    /// Look up a token by secret.
    pub fn acl_token_get_by_secret(&self, secret: &str) -> FedResult<(u64, Option<Arc<AclToken>>)> {
        let tx = self.txn();
        let idx = tx.tables().max_index(TABLE_ACL_TOKENS);
        let token = tx
            .tables()
            .acl_tokens()
            .first(INDEX_ID, &IndexQuery::Secret(secret.to_string()))?;
        Ok((idx, token))
    }

    /// Look up a token by accessor ID.
    pub fn acl_token_get_by_accessor(
        &self,
        accessor: &str,
    ) -> FedResult<(u64, Option<Arc<AclToken>>)> {
        let tx = self.txn();
        let idx = tx.tables().max_index(TABLE_ACL_TOKENS);
        let token = tx
            .tables()
            .acl_tokens()
            .first(INDEX_ACCESSOR, &IndexQuery::Accessor(accessor.to_string()))?;
        Ok((idx, token))
    }

    /// All tokens, ordered by secret.
    pub fn acl_tokens(&self) -> (u64, Vec<Arc<AclToken>>) {
        let tx = self.txn();
        let idx = tx.tables().max_index(TABLE_ACL_TOKENS);
        (idx, tx.tables().acl_tokens().get_all().collect())
    }

    /// Delete a token by secret. Returns whether one was removed.
    pub fn acl_token_delete_by_secret(&self, idx: u64, secret: &str) -> FedResult<bool> {
        let mut tx = self.write_txn(idx);
        let removed = tx
            .delete_acl_token(&IndexQuery::Secret(secret.to_string()))?
            .is_some();
        if removed {
            tx.commit();
        }
        Ok(removed)
    }
}
