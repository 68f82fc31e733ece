//! Persistent OAuth Token Cache
//!
//! Stores user tokens through a [`SecureStore`] so a consent granted once is
//! reused on the next run.
//!
//! Entries live under `oauth_tokens:<user_id>` and are serialized as JSON.
//! Token values are never logged.
//!
//! ## Example
//!
//! ```no_run
//! use core_auth::{OAuthTokens, TokenStore};
//! use std::sync::Arc;
//! # use bridge_traits::storage::SecureStore;
//! # async fn example(secure_store: Arc<dyn SecureStore>) -> core_auth::Result<()> {
//! let token_store = TokenStore::new(secure_store);
//!
//! let tokens = OAuthTokens::new("ya29...".to_string(), Some("1//0g...".to_string()), 3600);
//! token_store.store_tokens("alice", &tokens).await?;
//!
//! let cached = token_store.retrieve_tokens("alice").await?;
//! # Ok(())
//! # }
//! ```

use crate::error::{AuthError, Result};
use crate::types::OAuthTokens;
use bridge_traits::storage::SecureStore;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

const KEY_PREFIX: &str = "oauth_tokens:";

/// User token cache over a platform secure store.
#[derive(Clone)]
pub struct TokenStore {
    secure_store: Arc<dyn SecureStore>,
}

#[derive(Serialize, Deserialize)]
struct StoredTokens {
    access_token: String,
    refresh_token: Option<String>,
    expires_at: i64,
}

impl TokenStore {
    pub fn new(secure_store: Arc<dyn SecureStore>) -> Self {
        Self { secure_store }
    }

    /// Store (or overwrite) the tokens for `user_id`.
    pub async fn store_tokens(&self, user_id: &str, tokens: &OAuthTokens) -> Result<()> {
        let stored = StoredTokens {
            access_token: tokens.access_token().to_string(),
            refresh_token: tokens.refresh_token().map(str::to_string),
            expires_at: tokens.expires_at(),
        };

        let json = serde_json::to_vec(&stored)
            .map_err(|e| AuthError::Other(format!("Failed to serialize tokens: {}", e)))?;

        self.secure_store
            .set_secret(&storage_key(user_id), &json)
            .await
            .map_err(|e| {
                warn!(user_id = user_id, error = %e, "Failed to persist tokens");
                AuthError::SecureStorageUnavailable(e.to_string())
            })?;

        info!(
            user_id = user_id,
            has_refresh_token = stored.refresh_token.is_some(),
            "Tokens cached"
        );
        Ok(())
    }

    /// Load the cached tokens for `user_id`.
    ///
    /// Returns `Ok(None)` when nothing is cached. Undecodable entries are
    /// deleted and reported as [`AuthError::TokenCorrupted`].
    pub async fn retrieve_tokens(&self, user_id: &str) -> Result<Option<OAuthTokens>> {
        let key = storage_key(user_id);

        let data = self.secure_store.get_secret(&key).await.map_err(|e| {
            warn!(user_id = user_id, error = %e, "Failed to read token cache");
            AuthError::SecureStorageUnavailable(e.to_string())
        })?;

        let Some(data) = data else {
            debug!(user_id = user_id, "No cached tokens");
            return Ok(None);
        };

        let stored: StoredTokens = match serde_json::from_slice(&data) {
            Ok(stored) => stored,
            Err(e) => {
                warn!(user_id = user_id, error = %e, "Cached tokens are corrupted, discarding");
                if let Err(delete_err) = self.secure_store.delete_secret(&key).await {
                    warn!(user_id = user_id, error = %delete_err, "Failed to discard corrupted tokens");
                }
                return Err(AuthError::TokenCorrupted {
                    user_id: user_id.to_string(),
                    reason: e.to_string(),
                });
            }
        };

        debug!(user_id = user_id, expires_at = stored.expires_at, "Loaded cached tokens");

        Ok(Some(OAuthTokens::from_parts(
            stored.access_token,
            stored.refresh_token,
            stored.expires_at,
        )))
    }
}

fn storage_key(user_id: &str) -> String {
    format!("{}{}", KEY_PREFIX, user_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tokio::sync::Mutex;

    #[derive(Default)]
    struct MemorySecureStore {
        storage: Mutex<HashMap<String, Vec<u8>>>,
    }

    #[async_trait::async_trait]
    impl SecureStore for MemorySecureStore {
        async fn set_secret(&self, key: &str, value: &[u8]) -> bridge_traits::error::Result<()> {
            self.storage
                .lock()
                .await
                .insert(key.to_string(), value.to_vec());
            Ok(())
        }

        async fn get_secret(&self, key: &str) -> bridge_traits::error::Result<Option<Vec<u8>>> {
            Ok(self.storage.lock().await.get(key).cloned())
        }

        async fn delete_secret(&self, key: &str) -> bridge_traits::error::Result<()> {
            self.storage.lock().await.remove(key);
            Ok(())
        }
    }

    fn store() -> (Arc<MemorySecureStore>, TokenStore) {
        let secure_store = Arc::new(MemorySecureStore::default());
        (secure_store.clone(), TokenStore::new(secure_store))
    }

    #[tokio::test]
    async fn test_store_and_retrieve_tokens() {
        let (_, token_store) = store();
        let tokens = OAuthTokens::new("access".to_string(), Some("refresh".to_string()), 3600);

        token_store.store_tokens("alice", &tokens).await.unwrap();
        let cached = token_store.retrieve_tokens("alice").await.unwrap().unwrap();

        assert_eq!(cached.access_token(), "access");
        assert_eq!(cached.refresh_token(), Some("refresh"));
        assert_eq!(cached.expires_at(), tokens.expires_at());
    }

    #[tokio::test]
    async fn test_users_are_isolated() {
        let (_, token_store) = store();
        let tokens = OAuthTokens::new("access".to_string(), None, 3600);

        token_store.store_tokens("alice", &tokens).await.unwrap();

        assert!(token_store.retrieve_tokens("alice").await.unwrap().is_some());
        assert!(token_store.retrieve_tokens("bob").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_overwrite_tokens() {
        let (_, token_store) = store();

        token_store
            .store_tokens("alice", &OAuthTokens::new("one".to_string(), None, 3600))
            .await
            .unwrap();
        token_store
            .store_tokens("alice", &OAuthTokens::new("two".to_string(), None, 3600))
            .await
            .unwrap();

        let cached = token_store.retrieve_tokens("alice").await.unwrap().unwrap();
        assert_eq!(cached.access_token(), "two");
    }

    #[tokio::test]
    async fn test_corrupted_tokens_are_discarded() {
        let (secure_store, token_store) = store();
        secure_store
            .set_secret("oauth_tokens:alice", b"not json")
            .await
            .unwrap();

        let result = token_store.retrieve_tokens("alice").await;
        assert!(matches!(result, Err(AuthError::TokenCorrupted { .. })));
        assert!(!secure_store.has_secret("oauth_tokens:alice").await.unwrap());
    }
}
