//! OAuth 2.0 Authorization Code Flow with PKCE
//!
//! Implements the installed-application flow (RFC 6749 + RFC 7636) used for
//! end-user Drive access.
//!
//! # Overview
//!
//! - Build the consent URL with an S256 code challenge and a random `state`
//! - Exchange the returned authorization code for tokens
//! - Refresh an access token with the stored refresh token
//!
//! Each token endpoint call is a single attempt. Failures are reported to the
//! caller as-is.
//!
//! # Security
//!
//! Tokens, codes and verifiers are never logged.
//!
//! # Example
//!
//! ```no_run
//! use core_auth::oauth::{OAuthConfig, OAuthFlowManager};
//! use std::sync::Arc;
//!
//! # async fn example() -> core_auth::Result<()> {
//! # use bridge_traits::http::HttpClient;
//! # let http_client: Arc<dyn HttpClient> = todo!();
//! let config = OAuthConfig {
//!     client_id: "1234-abc.apps.googleusercontent.com".to_string(),
//!     client_secret: Some("GOCSPX-...".to_string()),
//!     redirect_uri: "http://127.0.0.1:53682/".to_string(),
//!     scopes: vec!["https://www.googleapis.com/auth/drive".to_string()],
//!     auth_url: "https://accounts.google.com/o/oauth2/v2/auth".to_string(),
//!     token_url: "https://oauth2.googleapis.com/token".to_string(),
//! };
//!
//! let flow = OAuthFlowManager::new(config, http_client);
//! let (auth_url, verifier) = flow.build_auth_url()?;
//! // send the user to auth_url, then:
//! let tokens = flow.exchange_code("4/0Ab...", verifier.state(), &verifier).await?;
//! # Ok(())
//! # }
//! ```

use crate::error::{AuthError, Result};
use crate::types::OAuthTokens;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use bridge_traits::http::{HttpClient, HttpMethod, HttpRequest, HttpResponse};
use bytes::Bytes;
use rand::Rng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use url::Url;

/// OAuth client and endpoint settings.
#[derive(Debug, Clone)]
pub struct OAuthConfig {
    pub client_id: String,
    /// Absent for public clients
    pub client_secret: Option<String>,
    pub redirect_uri: String,
    pub scopes: Vec<String>,
    pub auth_url: String,
    pub token_url: String,
}

/// PKCE code verifier plus the CSRF `state` for one consent attempt.
///
/// The verifier stays local; only its challenge goes into the consent URL.
#[derive(Clone)]
pub struct PkceVerifier {
    verifier: String,
    state: String,
}

impl PkceVerifier {
    /// Generate a 32-byte verifier and a 16-byte state, both base64url
    /// without padding.
    pub fn new() -> Self {
        let mut rng = rand::thread_rng();

        let mut verifier_bytes = [0u8; 32];
        rng.fill(&mut verifier_bytes);

        let mut state_bytes = [0u8; 16];
        rng.fill(&mut state_bytes);

        Self {
            verifier: URL_SAFE_NO_PAD.encode(verifier_bytes),
            state: URL_SAFE_NO_PAD.encode(state_bytes),
        }
    }

    pub fn verifier(&self) -> &str {
        &self.verifier
    }

    pub fn state(&self) -> &str {
        &self.state
    }

    /// BASE64URL(SHA256(verifier))
    pub fn challenge(&self) -> String {
        let hash = Sha256::digest(self.verifier.as_bytes());
        URL_SAFE_NO_PAD.encode(hash)
    }
}

impl Default for PkceVerifier {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for PkceVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PkceVerifier")
            .field("verifier", &"[REDACTED]")
            .field("state", &self.state)
            .finish()
    }
}

/// Drives the authorization code flow against one OAuth client.
pub struct OAuthFlowManager {
    config: OAuthConfig,
    http_client: Arc<dyn HttpClient>,
}

impl OAuthFlowManager {
    pub fn new(config: OAuthConfig, http_client: Arc<dyn HttpClient>) -> Self {
        Self {
            config,
            http_client,
        }
    }

    pub fn config(&self) -> &OAuthConfig {
        &self.config
    }

    /// Build the consent URL and the verifier needed to redeem its code.
    ///
    /// Requests offline access so Google issues a refresh token.
    ///
    /// # Errors
    ///
    /// [`AuthError::InvalidConfiguration`] if `auth_url` does not parse.
    #[instrument(skip(self), fields(client_id = %self.config.client_id))]
    pub fn build_auth_url(&self) -> Result<(String, PkceVerifier)> {
        let verifier = PkceVerifier::new();

        let mut url = Url::parse(&self.config.auth_url).map_err(|e| {
            AuthError::InvalidConfiguration(format!("Invalid auth URL: {}", e))
        })?;

        url.query_pairs_mut()
            .append_pair("client_id", &self.config.client_id)
            .append_pair("redirect_uri", &self.config.redirect_uri)
            .append_pair("response_type", "code")
            .append_pair("scope", &self.config.scopes.join(" "))
            .append_pair("state", verifier.state())
            .append_pair("code_challenge", &verifier.challenge())
            .append_pair("code_challenge_method", "S256")
            .append_pair("access_type", "offline")
            .append_pair("prompt", "consent");

        debug!("Built authorization URL");

        Ok((url.to_string(), verifier))
    }

    /// Redeem an authorization code.
    ///
    /// # Errors
    ///
    /// - [`AuthError::StateMismatch`] if `state` differs from the verifier's
    /// - [`AuthError::NetworkError`] if the token endpoint is unreachable
    /// - [`AuthError::InvalidAuthCode`] if the endpoint rejects the code
    #[instrument(skip(self, code, verifier))]
    pub async fn exchange_code(
        &self,
        code: &str,
        state: &str,
        verifier: &PkceVerifier,
    ) -> Result<OAuthTokens> {
        if state != verifier.state() {
            warn!("OAuth state mismatch on callback");
            return Err(AuthError::StateMismatch {
                expected: verifier.state().to_string(),
                actual: state.to_string(),
            });
        }

        let mut params = vec![
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", self.config.redirect_uri.as_str()),
            ("client_id", self.config.client_id.as_str()),
            ("code_verifier", verifier.verifier()),
        ];
        if let Some(client_secret) = self.config.client_secret.as_deref() {
            params.push(("client_secret", client_secret));
        }

        debug!("Exchanging authorization code for tokens");

        let response = self
            .post_form(&params)
            .await
            .map_err(|e| AuthError::NetworkError(e.to_string()))?;

        if !response.is_success() {
            let (status, body) = error_details(&response);
            warn!(status = status, "Authorization code exchange rejected");
            return Err(AuthError::InvalidAuthCode(format!(
                "Token endpoint returned {}: {}",
                status, body
            )));
        }

        let token_response: TokenResponse = response.json().map_err(|e| {
            AuthError::TokenRequestFailed(format!("Failed to parse token response: {}", e))
        })?;

        info!(
            expires_in = token_response.expires_in,
            has_refresh_token = token_response.refresh_token.is_some(),
            "Authorization code exchanged"
        );

        Ok(token_response.into_tokens())
    }

    /// Obtain a new access token from a refresh token.
    ///
    /// The returned set keeps `refresh_token` when the endpoint does not
    /// rotate it.
    ///
    /// # Errors
    ///
    /// [`AuthError::TokenRefreshFailed`] on transport failure or a non-2xx
    /// response.
    #[instrument(skip(self, refresh_token))]
    pub async fn refresh_access_token(&self, refresh_token: &str) -> Result<OAuthTokens> {
        let mut params = vec![
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("client_id", self.config.client_id.as_str()),
        ];
        if let Some(client_secret) = self.config.client_secret.as_deref() {
            params.push(("client_secret", client_secret));
        }

        debug!("Refreshing access token");

        let response = self
            .post_form(&params)
            .await
            .map_err(|e| AuthError::TokenRefreshFailed(e.to_string()))?;

        if !response.is_success() {
            let (status, body) = error_details(&response);
            warn!(status = status, "Token refresh rejected");
            return Err(AuthError::TokenRefreshFailed(format!(
                "Token endpoint returned {}: {}",
                status, body
            )));
        }

        let token_response: TokenResponse = response.json().map_err(|e| {
            AuthError::TokenRefreshFailed(format!("Failed to parse token response: {}", e))
        })?;

        info!(expires_in = token_response.expires_in, "Access token refreshed");

        Ok(token_response
            .into_tokens()
            .with_fallback_refresh_token(Some(refresh_token)))
    }

    async fn post_form(
        &self,
        params: &[(&str, &str)],
    ) -> bridge_traits::error::Result<HttpResponse> {
        let body = serde_urlencoded::to_string(params).map_err(|e| {
            bridge_traits::BridgeError::OperationFailed(format!(
                "Failed to encode token request: {}",
                e
            ))
        })?;

        let request = HttpRequest::new(HttpMethod::Post, self.config.token_url.clone())
            .header("Content-Type", "application/x-www-form-urlencoded")
            .body(Bytes::from(body));

        self.http_client.execute(request).await
    }
}

pub(crate) fn error_details(response: &HttpResponse) -> (u16, String) {
    let body = response
        .text()
        .unwrap_or_else(|_| "Unable to read error response".to_string());
    (response.status, body)
}

/// Token endpoint response body.
#[derive(Debug, Deserialize, Serialize)]
pub(crate) struct TokenResponse {
    pub(crate) access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) refresh_token: Option<String>,
    #[serde(default = "default_expires_in")]
    pub(crate) expires_in: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) token_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) scope: Option<String>,
}

impl TokenResponse {
    fn into_tokens(self) -> OAuthTokens {
        OAuthTokens::new(self.access_token, self.refresh_token, self.expires_in)
    }
}

fn default_expires_in() -> i64 {
    3600
}
