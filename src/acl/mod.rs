//! ACL write path.
//!
//! - [`service`] - Logout orchestration and request types
//! - [`token_writer`] - Local token mutations
//! - [`errors`] - Status code mapping

pub mod errors;
pub mod service;
pub mod token_writer;

pub use service::{AclService, AclServiceConfig, LogoutRequest};
pub use token_writer::{TokenWriter, TokenWriterConfig};
