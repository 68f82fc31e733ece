//! # Authentication Module
//!
//! Credentials for the Google Drive transporter.
//!
//! ## Overview
//!
//! Every credential implements [`TokenProvider`], which yields a bearer token
//! for the next request:
//!
//! - [`UserCredential`]: OAuth 2.0 authorization code flow with PKCE, tokens
//!   cached in a platform [`SecureStore`](bridge_traits::storage::SecureStore)
//!   and refreshed when they expire
//! - [`ServiceAccountCredential`]: JWT bearer grant signed with a JSON or
//!   PKCS#12 service account key
//! - [`StaticTokenProvider`]: a token obtained elsewhere
//!
//! Token values, client secrets and private keys never reach the logs.

pub mod client_secret;
pub mod credential;
pub mod error;
pub mod oauth;
pub mod service_account;
pub mod token_store;
pub mod types;

pub use client_secret::ClientSecrets;
pub use credential::{StaticTokenProvider, TokenProvider, UserAuthorization, UserCredential};
pub use error::{AuthError, Result};
pub use oauth::{OAuthConfig, OAuthFlowManager, PkceVerifier};
pub use service_account::{
    validate_key_path, KeyFileKind, ServiceAccountCredential, ServiceAccountKey,
    JWT_BEARER_GRANT, P12_PASSWORD,
};
pub use token_store::TokenStore;
pub use types::{OAuthTokens, EXPIRY_SKEW_SECS};
