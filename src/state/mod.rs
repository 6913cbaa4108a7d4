//! Transactional state store.
//!
//! - [`index`] - Composite index key encoding
//! - [`store`] - Versioned store, tables and transactions
//! - [`config_entry`] - Config entries, typed access and intention projection
//! - [`acl_token`] - ACL tokens
//! - [`tenant`] - Tenant scoping hook
//!
//! # Isolation
//!
//! Reads run against an immutable snapshot taken when the transaction opens.
//! Writes are serialized through a single writer and become visible atomically
//! on commit.

pub mod acl_token;
pub mod config_entry;
pub mod index;
pub mod store;
pub mod tenant;

pub use acl_token::AclToken;
pub use config_entry::{ConfigEntry, Intention, Intentions, KindName};
pub use store::{ReadTxn, StateStore};
pub use tenant::{AllowAllTenants, EnterpriseMeta, TenantValidator};
