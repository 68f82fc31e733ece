//! Google OAuth client secret files
//!
//! The Cloud Console downloads OAuth clients as JSON with a single top-level
//! section, `installed` for desktop apps or `web` for web apps.

use crate::error::{AuthError, Result};
use serde::Deserialize;
use std::path::Path;
use tracing::debug;

/// OAuth client identity read from a client secret file.
///
/// `auth_uri` and `token_uri`, when present, override the configured OAuth
/// endpoints. `redirect_uris` is not read; the redirect comes from the
/// code receiver.
#[derive(Clone, Deserialize)]
pub struct ClientSecrets {
    pub client_id: String,
    #[serde(default)]
    pub client_secret: Option<String>,
    #[serde(default)]
    pub auth_uri: Option<String>,
    #[serde(default)]
    pub token_uri: Option<String>,
}

#[derive(Deserialize)]
struct ClientSecretFile {
    installed: Option<ClientSecrets>,
    web: Option<ClientSecrets>,
}

impl ClientSecrets {
    /// Parse the contents of a client secret file.
    pub fn from_json(data: &[u8]) -> Result<Self> {
        let file: ClientSecretFile = serde_json::from_slice(data)
            .map_err(|e| AuthError::ClientSecretInvalid(e.to_string()))?;

        let secrets = file.installed.or(file.web).ok_or_else(|| {
            AuthError::ClientSecretInvalid(
                "expected an \"installed\" or \"web\" section".to_string(),
            )
        })?;

        if secrets.client_id.trim().is_empty() {
            return Err(AuthError::ClientSecretInvalid(
                "client_id is empty".to_string(),
            ));
        }

        Ok(secrets)
    }

    /// Read and parse a client secret file.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = tokio::fs::read(path).await.map_err(|e| AuthError::KeyLoadFailed {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

        let secrets = Self::from_json(&data)?;
        debug!(client_id = %secrets.client_id, "Loaded OAuth client secrets");
        Ok(secrets)
    }
}

impl std::fmt::Debug for ClientSecrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientSecrets")
            .field("client_id", &self.client_id)
            .field("client_secret", &self.client_secret.as_ref().map(|_| "[REDACTED]"))
            .field("auth_uri", &self.auth_uri)
            .field("token_uri", &self.token_uri)
            .finish()
    }
}
