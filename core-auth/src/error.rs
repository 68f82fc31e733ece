use thiserror::Error;

#[derive(Error, Debug)]
pub enum AuthError {
    /// A precondition on caller-supplied credentials input failed
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Failed to load key from {path}: {reason}")]
    KeyLoadFailed { path: String, reason: String },

    #[error("Client secret file is invalid: {0}")]
    ClientSecretInvalid(String),

    #[error("OAuth state mismatch (expected {expected}, got {actual})")]
    StateMismatch { expected: String, actual: String },

    #[error("Authorization was not granted: {0}")]
    AuthorizationDenied(String),

    #[error("Authorization code rejected: {0}")]
    InvalidAuthCode(String),

    #[error("Token request failed: {0}")]
    TokenRequestFailed(String),

    #[error("Token refresh failed: {0}")]
    TokenRefreshFailed(String),

    #[error("Secure storage unavailable: {0}")]
    SecureStorageUnavailable(String),

    #[error("Stored tokens for {user_id} are corrupted: {reason}")]
    TokenCorrupted { user_id: String, reason: String },

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Not authenticated")]
    NotAuthenticated,

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, AuthError>;
