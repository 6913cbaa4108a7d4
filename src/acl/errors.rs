//! Mapping from internal errors to the ACL service's status codes.
//!
//! - InvalidArgument → INVALID_ARGUMENT
//! - PermissionDenied → PERMISSION_DENIED
//! - NotFound → NOT_FOUND
//! - AclsDisabled, LocalTokensDisabled → FAILED_PRECONDITION
//! - everything else → INTERNAL with a fixed message
//!
//! The redirect signal has no mapping of its own; the service intercepts it
//! before errors reach this point.

use crate::core::error::FedError;
use tonic::Status;

/// Convert a FedError to a tonic Status.
///
/// `internal_message` replaces the text of internal-class errors so that
/// their cause never reaches the client.
pub fn fed_error_to_status(err: &FedError, internal_message: &str) -> Status {
    match err {
        FedError::InvalidArgument { message } => Status::invalid_argument(message.clone()),
        FedError::PermissionDenied { .. } => Status::permission_denied(err.to_string()),
        FedError::NotFound => Status::not_found(err.to_string()),
        FedError::AclsDisabled | FedError::LocalTokensDisabled => {
            Status::failed_precondition(err.to_string())
        }
        FedError::CannotWriteGlobalToken
        | FedError::IndexNotFound { .. }
        | FedError::Internal { .. } => Status::internal(internal_message),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tonic::Code;

    #[test]
    fn permission_denied_keeps_its_code() {
        let status = fed_error_to_status(&FedError::permission_denied("no login"), "x");
        assert_eq!(status.code(), Code::PermissionDenied);
        assert!(status.message().contains("no login"));
    }

    #[test]
    fn internal_errors_are_redacted() {
        let status = fed_error_to_status(
            &FedError::internal("disk on fire at /var/lib/x"),
            "failed to delete token",
        );
        assert_eq!(status.code(), Code::Internal);
        assert_eq!(status.message(), "failed to delete token");
    }

    #[test]
    fn disabled_features_are_preconditions() {
        assert_eq!(
            fed_error_to_status(&FedError::AclsDisabled, "x").code(),
            Code::FailedPrecondition
        );
        assert_eq!(
            fed_error_to_status(&FedError::LocalTokensDisabled, "x").code(),
            Code::FailedPrecondition
        );
    }
}
