//! Service Account Credentials
//!
//! Server-to-server access with the OAuth 2.0 JWT bearer grant (RFC 7523).
//!
//! Two key formats are supported:
//! - the JSON key file downloaded from the Cloud Console (PKCS#8 PEM inside)
//! - the legacy PKCS#12 bundle, always encrypted with Google's fixed
//!   password `notasecret`
//!
//! Access tokens are minted on first use, cached in memory and re-minted once
//! they are within [`EXPIRY_SKEW_SECS`](crate::types::EXPIRY_SKEW_SECS) of
//! expiring.

use crate::credential::TokenProvider;
use crate::error::{AuthError, Result};
use crate::oauth::{error_details, TokenResponse};
use crate::types::OAuthTokens;
use async_trait::async_trait;
use bridge_traits::http::{HttpClient, HttpMethod, HttpRequest};
use bridge_traits::time::{Clock, SystemClock};
use bytes::Bytes;
use core_runtime::logging::strip_path;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use rsa::pkcs1::{DecodeRsaPrivateKey, EncodeRsaPrivateKey};
use rsa::pkcs8::DecodePrivateKey;
use rsa::RsaPrivateKey;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

pub const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

/// Import password Google uses for every P12 service account key
pub const P12_PASSWORD: &str = "notasecret";

const ASSERTION_LIFETIME_SECS: i64 = 3600;

/// Key file formats accepted by the service account loaders.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyFileKind {
    Json,
    P12,
}

impl KeyFileKind {
    pub fn extension(&self) -> &'static str {
        match self {
            KeyFileKind::Json => "json",
            KeyFileKind::P12 => "p12",
        }
    }
}

/// Check a key file path before any attempt to load it.
///
/// # Errors
///
/// [`AuthError::InvalidConfiguration`] when the path is empty, does not
/// exist, or lacks the expected extension (compared case-insensitively).
pub fn validate_key_path(path: &Path, kind: KeyFileKind) -> Result<()> {
    if path.as_os_str().is_empty() {
        return Err(AuthError::InvalidConfiguration(
            "Path to service account key file is required".to_string(),
        ));
    }

    if !path.exists() {
        return Err(AuthError::InvalidConfiguration(format!(
            "Service account key file does not exist: {}",
            path.display()
        )));
    }

    let matches_kind = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case(kind.extension()));
    if !matches_kind {
        return Err(AuthError::InvalidConfiguration(format!(
            "Service account key file must have a .{} extension",
            kind.extension()
        )));
    }

    Ok(())
}

/// Contents of a JSON service account key file.
#[derive(Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default)]
    pub private_key_id: Option<String>,
    #[serde(default)]
    pub token_uri: Option<String>,
    #[serde(default)]
    pub project_id: Option<String>,
}

impl ServiceAccountKey {
    pub fn from_json(data: &[u8]) -> Result<Self> {
        serde_json::from_slice(data).map_err(|e| AuthError::KeyLoadFailed {
            path: "service account JSON".to_string(),
            reason: e.to_string(),
        })
    }
}

impl std::fmt::Debug for ServiceAccountKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceAccountKey")
            .field("client_email", &self.client_email)
            .field("private_key", &"[REDACTED]")
            .field("private_key_id", &self.private_key_id)
            .field("token_uri", &self.token_uri)
            .field("project_id", &self.project_id)
            .finish()
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct AssertionClaims {
    iss: String,
    scope: String,
    aud: String,
    iat: i64,
    exp: i64,
}

/// Service account credential that signs its own token requests.
pub struct ServiceAccountCredential {
    client_email: String,
    key_id: Option<String>,
    encoding_key: EncodingKey,
    scopes: Vec<String>,
    token_url: String,
    http_client: Arc<dyn HttpClient>,
    clock: Arc<dyn Clock>,
    cached: Mutex<Option<OAuthTokens>>,
}

impl ServiceAccountCredential {
    /// Load a JSON key file.
    ///
    /// The key's own `token_uri` wins over `default_token_url`.
    #[instrument(skip(path, scopes, http_client), fields(file = %strip_path(&path.as_ref().to_string_lossy())))]
    pub fn from_json_file(
        path: impl AsRef<Path>,
        scopes: &[&str],
        default_token_url: &str,
        http_client: Arc<dyn HttpClient>,
    ) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read(path).map_err(|e| load_failed(path, e))?;
        let key = ServiceAccountKey::from_json(&data).map_err(|e| relabel(path, e))?;

        Self::from_key(key, scopes, default_token_url, http_client).map_err(|e| relabel(path, e))
    }

    /// Build a credential from an already parsed JSON key.
    pub fn from_key(
        key: ServiceAccountKey,
        scopes: &[&str],
        default_token_url: &str,
        http_client: Arc<dyn HttpClient>,
    ) -> Result<Self> {
        let rsa_key = RsaPrivateKey::from_pkcs8_pem(&key.private_key)
            .or_else(|_| RsaPrivateKey::from_pkcs1_pem(&key.private_key))
            .map_err(|e| AuthError::KeyLoadFailed {
                path: "service account JSON".to_string(),
                reason: format!("private_key is not an RSA PEM key: {}", e),
            })?;

        let credential = Self::new(
            key.client_email,
            key.private_key_id,
            &rsa_key,
            scopes,
            key.token_uri
                .unwrap_or_else(|| default_token_url.to_string()),
            http_client,
        )?;

        info!(
            client_email = %credential.client_email,
            "Loaded service account from JSON key"
        );
        Ok(credential)
    }

    /// Load a PKCS#12 key bundle for `client_email`.
    #[instrument(skip(path, client_email, scopes, http_client), fields(file = %strip_path(&path.as_ref().to_string_lossy())))]
    pub fn from_p12_file(
        path: impl AsRef<Path>,
        client_email: &str,
        scopes: &[&str],
        token_url: &str,
        http_client: Arc<dyn HttpClient>,
    ) -> Result<Self> {
        let path = path.as_ref();
        let der = std::fs::read(path).map_err(|e| load_failed(path, e))?;

        Self::from_p12_der(&der, client_email, scopes, token_url, http_client)
            .map_err(|e| relabel(path, e))
    }

    /// Decrypt a PKCS#12 bundle held in memory.
    pub fn from_p12_der(
        der: &[u8],
        client_email: &str,
        scopes: &[&str],
        token_url: &str,
        http_client: Arc<dyn HttpClient>,
    ) -> Result<Self> {
        let p12_failed = |reason: String| AuthError::KeyLoadFailed {
            path: "PKCS#12 bundle".to_string(),
            reason,
        };

        let pfx = p12::PFX::parse(der).map_err(|e| p12_failed(format!("{:?}", e)))?;
        let key_der = pfx
            .key_bags(P12_PASSWORD)
            .map_err(|e| p12_failed(format!("cannot decrypt key bag: {:?}", e)))?
            .into_iter()
            .next()
            .ok_or_else(|| p12_failed("bundle contains no private key".to_string()))?;

        let rsa_key = RsaPrivateKey::from_pkcs8_der(&key_der)
            .map_err(|e| p12_failed(format!("private key is not RSA: {}", e)))?;

        let credential = Self::new(
            client_email.to_string(),
            None,
            &rsa_key,
            scopes,
            token_url.to_string(),
            http_client,
        )?;

        info!(
            client_email = %credential.client_email,
            "Loaded service account from P12 key"
        );
        Ok(credential)
    }

    fn new(
        client_email: String,
        key_id: Option<String>,
        rsa_key: &RsaPrivateKey,
        scopes: &[&str],
        token_url: String,
        http_client: Arc<dyn HttpClient>,
    ) -> Result<Self> {
        let pkcs1 = rsa_key.to_pkcs1_der().map_err(|e| AuthError::KeyLoadFailed {
            path: "RSA key".to_string(),
            reason: e.to_string(),
        })?;

        Ok(Self {
            client_email,
            key_id,
            encoding_key: EncodingKey::from_rsa_der(pkcs1.as_bytes()),
            scopes: scopes.iter().map(|s| s.to_string()).collect(),
            token_url,
            http_client,
            clock: Arc::new(SystemClock),
            cached: Mutex::new(None),
        })
    }

    /// Use `clock` for assertion timestamps and expiry checks
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn client_email(&self) -> &str {
        &self.client_email
    }

    pub fn scopes(&self) -> &[String] {
        &self.scopes
    }

    /// Signed RS256 assertion for the token endpoint
    fn assertion(&self, issued_at: i64) -> Result<String> {
        let claims = AssertionClaims {
            iss: self.client_email.clone(),
            scope: self.scopes.join(" "),
            aud: self.token_url.clone(),
            iat: issued_at,
            exp: issued_at + ASSERTION_LIFETIME_SECS,
        };

        let mut header = Header::new(Algorithm::RS256);
        header.kid = self.key_id.clone();

        jsonwebtoken::encode(&header, &claims, &self.encoding_key)
            .map_err(|e| AuthError::TokenRequestFailed(format!("Failed to sign assertion: {}", e)))
    }

    async fn mint_token(&self) -> Result<OAuthTokens> {
        let now = self.clock.now();
        let assertion = self.assertion(now.timestamp())?;

        let body = serde_urlencoded::to_string([
            ("grant_type", JWT_BEARER_GRANT),
            ("assertion", assertion.as_str()),
        ])
        .map_err(|e| AuthError::Other(format!("Failed to encode token request: {}", e)))?;

        let request = HttpRequest::new(HttpMethod::Post, self.token_url.clone())
            .header("Content-Type", "application/x-www-form-urlencoded")
            .body(Bytes::from(body));

        let response = self
            .http_client
            .execute(request)
            .await
            .map_err(|e| AuthError::NetworkError(e.to_string()))?;

        if !response.is_success() {
            let (status, body) = error_details(&response);
            warn!(status = status, "Service account token request rejected");
            return Err(AuthError::TokenRequestFailed(format!(
                "Token endpoint returned {}: {}",
                status, body
            )));
        }

        let token_response: TokenResponse = response.json().map_err(|e| {
            AuthError::TokenRequestFailed(format!("Failed to parse token response: {}", e))
        })?;

        debug!(expires_in = token_response.expires_in, "Service account token minted");

        Ok(OAuthTokens::issued_at(
            token_response.access_token,
            None,
            now,
            token_response.expires_in,
        ))
    }
}

#[async_trait]
impl TokenProvider for ServiceAccountCredential {
    async fn access_token(&self) -> Result<String> {
        let mut cached = self.cached.lock().await;

        if let Some(tokens) = cached.as_ref() {
            if !tokens.is_expired_at(self.clock.now()) {
                return Ok(tokens.access_token().to_string());
            }
        }

        let tokens = self.mint_token().await?;
        let access_token = tokens.access_token().to_string();
        *cached = Some(tokens);
        Ok(access_token)
    }
}

fn load_failed(path: &Path, error: std::io::Error) -> AuthError {
    AuthError::KeyLoadFailed {
        path: path.display().to_string(),
        reason: error.to_string(),
    }
}

fn relabel(path: &Path, error: AuthError) -> AuthError {
    match error {
        AuthError::KeyLoadFailed { reason, .. } => AuthError::KeyLoadFailed {
            path: path.display().to_string(),
            reason,
        },
        other => other,
    }
}
