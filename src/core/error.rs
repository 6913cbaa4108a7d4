//! Error types shared by the store, the forwarder and the ACL service.
//!
//! `FedError` is the internal error vocabulary. Only the ACL service boundary
//! turns it into a `tonic::Status` (see [`crate::acl::errors`]); nothing else
//! crosses that boundary unmapped.

use thiserror::Error;

/// Common fedstore error conditions.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FedError {
    /// Malformed input, or an index queried with the wrong key type.
    #[error("invalid argument: {message}")]
    InvalidArgument { message: String },

    /// The target record does not exist.
    #[error("not found")]
    NotFound,

    /// The caller lacks the rights for the operation.
    #[error("permission denied: {message}")]
    PermissionDenied { message: String },

    /// Global tokens may only be written in the primary datacenter.
    ///
    /// Internal redirect signal; the ACL service never surfaces it.
    #[error("cannot write to a global token in a secondary datacenter")]
    CannotWriteGlobalToken,

    /// ACL enforcement is turned off for this node.
    #[error("ACL support disabled")]
    AclsDisabled,

    /// Local token writes are not possible in this datacenter yet.
    #[error("local tokens are disabled in this datacenter")]
    LocalTokensDisabled,

    /// Query against an index the table does not define.
    #[error("index {index} not found on table {table}")]
    IndexNotFound { table: String, index: String },

    /// Unexpected failure.
    #[error("internal error: {message}")]
    Internal { message: String },
}

impl FedError {
    /// Create an InvalidArgument error.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Create a PermissionDenied error.
    pub fn permission_denied(message: impl Into<String>) -> Self {
        Self::PermissionDenied {
            message: message.into(),
        }
    }

    /// Create an Internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Check if this error asks the caller to retry against the primary datacenter.
    pub fn is_redirect(&self) -> bool {
        matches!(self, Self::CannotWriteGlobalToken)
    }
}

/// Result type using FedError.
pub type FedResult<T> = Result<T, FedError>;
