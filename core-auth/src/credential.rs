//! Bearer token providers
//!
//! A [`TokenProvider`] hands out a currently valid access token. The Drive
//! transporter asks for one before every request; providers refresh or
//! re-mint on demand and never in the background.

use crate::client_secret::ClientSecrets;
use crate::error::{AuthError, Result};
use crate::oauth::{OAuthConfig, OAuthFlowManager};
use crate::token_store::TokenStore;
use crate::types::OAuthTokens;
use async_trait::async_trait;
use bridge_traits::auth::AuthorizationCodeReceiver;
use bridge_traits::http::HttpClient;
use bridge_traits::storage::SecureStore;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, instrument};

/// Source of OAuth bearer tokens.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// A token valid for at least the next few seconds
    async fn access_token(&self) -> Result<String>;
}

/// Fixed token supplied by the caller. It is never refreshed.
pub struct StaticTokenProvider {
    token: String,
}

impl StaticTokenProvider {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

#[async_trait]
impl TokenProvider for StaticTokenProvider {
    async fn access_token(&self) -> Result<String> {
        if self.token.is_empty() {
            return Err(AuthError::NotAuthenticated);
        }
        Ok(self.token.clone())
    }
}

/// Parameters for [`UserCredential::authorize`].
///
/// `auth_url` and `token_url` apply only when the client secret file names
/// no endpoints of its own.
pub struct UserAuthorization<'a> {
    pub secrets: ClientSecrets,
    pub scopes: Vec<String>,
    pub user_id: &'a str,
    pub auth_url: &'a str,
    pub token_url: &'a str,
}

/// End-user credential backed by a token cache.
///
/// Tokens are refreshed with the stored refresh token when they expire, and
/// the refreshed set is written back to the cache.
pub struct UserCredential {
    flow: OAuthFlowManager,
    store: TokenStore,
    user_id: String,
    tokens: Mutex<OAuthTokens>,
}

impl UserCredential {
    /// Reuse cached tokens for the user, or run the consent flow.
    ///
    /// The consent flow waits for `receiver` without a timeout unless the
    /// receiver imposes one.
    #[instrument(skip_all, fields(user_id = %params.user_id))]
    pub async fn authorize(
        params: UserAuthorization<'_>,
        secure_store: Arc<dyn SecureStore>,
        receiver: &dyn AuthorizationCodeReceiver,
        http_client: Arc<dyn HttpClient>,
    ) -> Result<Self> {
        let secrets = params.secrets;
        let config = OAuthConfig {
            client_id: secrets.client_id,
            client_secret: secrets.client_secret,
            redirect_uri: receiver.redirect_uri(),
            scopes: params.scopes,
            auth_url: secrets
                .auth_uri
                .unwrap_or_else(|| params.auth_url.to_string()),
            token_url: secrets
                .token_uri
                .unwrap_or_else(|| params.token_url.to_string()),
        };
        let flow = OAuthFlowManager::new(config, http_client);
        let store = TokenStore::new(secure_store);

        let tokens = match store.retrieve_tokens(params.user_id).await {
            Ok(Some(tokens)) => {
                info!("Using cached user tokens");
                tokens
            }
            Ok(None) | Err(AuthError::TokenCorrupted { .. }) => {
                let tokens = Self::consent(&flow, receiver).await?;
                store.store_tokens(params.user_id, &tokens).await?;
                tokens
            }
            Err(e) => return Err(e),
        };

        Ok(Self {
            flow,
            store,
            user_id: params.user_id.to_string(),
            tokens: Mutex::new(tokens),
        })
    }

    async fn consent(
        flow: &OAuthFlowManager,
        receiver: &dyn AuthorizationCodeReceiver,
    ) -> Result<OAuthTokens> {
        let (auth_url, verifier) = flow.build_auth_url()?;
        info!("Requesting user consent");

        let callback = receiver
            .receive_code(&auth_url)
            .await
            .map_err(|e| AuthError::AuthorizationDenied(e.to_string()))?;

        flow.exchange_code(&callback.code, &callback.state, &verifier)
            .await
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }
}

#[async_trait]
impl TokenProvider for UserCredential {
    async fn access_token(&self) -> Result<String> {
        let mut tokens = self.tokens.lock().await;
        if !tokens.is_expired() {
            return Ok(tokens.access_token().to_string());
        }

        let refresh_token = tokens
            .refresh_token()
            .ok_or(AuthError::NotAuthenticated)?
            .to_string();
        let refreshed = self.flow.refresh_access_token(&refresh_token).await?;
        self.store.store_tokens(&self.user_id, &refreshed).await?;

        let access_token = refreshed.access_token().to_string();
        *tokens = refreshed;
        Ok(access_token)
    }
}
