//! Interactive Authorization Bridge
//!
//! The OAuth consent step needs a human and a browser. This trait hides how
//! the authorization URL is shown and how the redirect comes back, so the
//! flow itself stays platform independent.

use async_trait::async_trait;

use crate::error::Result;

/// Query parameters delivered to the redirect URI after consent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationCallback {
    pub code: String,
    pub state: String,
}

/// Delivers the authorization URL to the user and waits for the redirect.
///
/// # Example
///
/// ```ignore
/// let receiver = LoopbackCodeReceiver::bind().await?;
/// let redirect_uri = receiver.redirect_uri();
/// // build the authorization URL with `redirect_uri`...
/// let callback = receiver.receive_code(&auth_url).await?;
/// ```
#[async_trait]
pub trait AuthorizationCodeReceiver: Send + Sync {
    /// Redirect URI registered with the authorization request
    fn redirect_uri(&self) -> String;

    /// Present `authorization_url` to the user and wait for the callback.
    ///
    /// # Errors
    ///
    /// Returns an error if the user denied consent (the callback carried an
    /// `error` parameter) or the callback channel broke.
    async fn receive_code(&self, authorization_url: &str) -> Result<AuthorizationCallback>;
}
