//! fedstore - federated control-plane state store.
//!
//! Each datacenter runs its own replicated store of configuration entries and
//! ACL tokens. One datacenter is primary: it owns global tokens, while the
//! others replicate them and may only write their own local tokens. A write
//! that reaches the wrong datacenter is forwarded to the leader that owns it.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────┐
//! │                 ACL service (acl::service)                │
//! │   acl check │ validation │ forward │ local delete │ redirect │
//! └───────────────────────────────────────────────────────────┘
//!          │                                    │
//! ┌──────────────────────────┐   ┌────────────────────────────┐
//! │  Forwarder               │   │  Token writer              │
//! │  (control::forward)      │   │  (acl::token_writer)       │
//! └──────────────────────────┘   └────────────────────────────┘
//!                                               │
//! ┌───────────────────────────────────────────────────────────┐
//! │                  State store (state::*)                   │
//! │  index codec │ snapshot txns │ config entries │ tokens    │
//! └───────────────────────────────────────────────────────────┘
//! ```
//!
//! # Module Organization
//!
//! ## Core
//! - [`core::config`] - Configuration parsing and validation
//! - [`core::error`] - Error types
//! - [`core::runtime`] - Node wiring and shutdown
//!
//! ## State
//! - [`state::index`] - Composite index keys and typed queries
//! - [`state::store`] - Snapshot-isolated tables and transactions
//! - [`state::config_entry`] - Config entries and the intentions projection
//! - [`state::acl_token`] - ACL token table
//! - [`state::tenant`] - Tenant scope and validation hook
//!
//! ## Control
//! - [`control::forward`] - Cross-datacenter write forwarding
//!
//! ## ACL
//! - [`acl::service`] - Logout orchestration
//! - [`acl::token_writer`] - Local token mutations
//! - [`acl::errors`] - Status code mapping
//!
//! ## CLI
//! - [`cli::commands`] - CLI command implementations

// Core infrastructure
pub mod core;

// Replicated state
pub mod state;

// Cross-datacenter routing
pub mod control;

// ACL write path
pub mod acl;

// CLI
pub mod cli;

// Re-exports for convenience
pub use self::core::{config, error, runtime};
pub use acl::{AclService, LogoutRequest};
pub use control::forward;
pub use state::StateStore;
