//! Error types for the Google Drive transporter

use bridge_traits::error::BridgeError;
use core_auth::AuthError;
use thiserror::Error;

/// Drive transporter errors
#[derive(Error, Debug)]
pub enum DriveError {
    /// A required argument was empty; no request was sent
    #[error("Missing required argument: {0}")]
    MissingArgument(&'static str),

    /// An argument cannot be sent as given; no request was sent
    #[error("Invalid argument {name}: {reason}")]
    InvalidArgument {
        name: &'static str,
        reason: &'static str,
    },

    /// Authentication preconditions failed before any credential was built
    #[error("Invalid authentication configuration: {0}")]
    InvalidConfiguration(#[source] AuthError),

    /// The credential could not be constructed from its key material
    #[error("CreateServiceAccountDriveFailed")]
    CredentialFailed {
        #[source]
        source: AuthError,
    },

    /// Runtime configuration could not be used
    #[error(transparent)]
    Runtime(#[from] core_runtime::error::Error),

    /// A Drive request failed
    #[error("Request Files.{operation} failed.")]
    OperationFailed {
        operation: &'static str,
        #[source]
        source: RequestFailure,
    },
}

/// Underlying cause of a failed Drive request
#[derive(Error, Debug)]
pub enum RequestFailure {
    /// The HTTP bridge could not complete the round trip
    #[error("Transport failure: {0}")]
    Transport(#[from] BridgeError),

    /// The API answered with a non-success status
    #[error("Google Drive API error (status {status}): {message}")]
    Api { status: u16, message: String },

    /// The response body was not the expected JSON
    #[error("Failed to parse API response: {0}")]
    Decode(#[from] serde_json::Error),

    /// No access token could be obtained for the request
    #[error("Authorization failed: {0}")]
    Auth(#[from] AuthError),

    /// Reading the upload content failed
    #[error("Failed to read upload content: {0}")]
    Io(#[from] std::io::Error),

    /// The upload response carried no file id
    #[error("Upload did not complete (status {status})")]
    UploadIncomplete { status: u16 },
}

impl RequestFailure {
    /// HTTP status reported by the API, if the failure came from a response
    pub fn status(&self) -> Option<u16> {
        match self {
            RequestFailure::Api { status, .. } | RequestFailure::UploadIncomplete { status } => {
                Some(*status)
            }
            _ => None,
        }
    }
}

impl DriveError {
    pub(crate) fn failed(operation: &'static str, cause: impl Into<RequestFailure>) -> Self {
        DriveError::OperationFailed {
            operation,
            source: cause.into(),
        }
    }
}

/// Result type for Drive operations
pub type Result<T> = std::result::Result<T, DriveError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_error_display() {
        let error = DriveError::OperationFailed {
            operation: "Copy",
            source: RequestFailure::Api {
                status: 404,
                message: "File not found: abc".to_string(),
            },
        };

        assert_eq!(error.to_string(), "Request Files.Copy failed.");
        assert_eq!(
            error.source().unwrap().to_string(),
            "Google Drive API error (status 404): File not found: abc"
        );
    }

    #[test]
    fn test_credential_failure_keeps_cause() {
        let error = DriveError::CredentialFailed {
            source: AuthError::KeyLoadFailed {
                path: "key.json".to_string(),
                reason: "bad PEM".to_string(),
            },
        };

        assert_eq!(error.to_string(), "CreateServiceAccountDriveFailed");
        let cause = error.source().unwrap().downcast_ref::<AuthError>().unwrap();
        assert!(matches!(cause, AuthError::KeyLoadFailed { .. }));
    }

    #[test]
    fn test_transport_failure_is_reachable() {
        let error = DriveError::failed(
            "Delete",
            BridgeError::OperationFailed("connection reset".to_string()),
        );

        let failure = error
            .source()
            .unwrap()
            .downcast_ref::<RequestFailure>()
            .unwrap();
        assert!(matches!(failure, RequestFailure::Transport(_)));
        assert_eq!(failure.status(), None);

        let cause = failure.source().unwrap().downcast_ref::<BridgeError>();
        assert!(matches!(cause, Some(BridgeError::OperationFailed(_))));
    }
}
