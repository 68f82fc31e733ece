//! Authenticated transporter constructors
//!
//! Each function checks its inputs, builds one credential and returns a
//! [`DriveTransporter`] bound to it:
//!
//! - [`authenticate_oauth`]: end-user consent, tokens cached on disk
//! - [`authenticate_service_account_json`]: service account JSON key
//! - [`authenticate_service_account_p12`]: service account PKCS#12 key
//!
//! Input problems are reported as [`DriveError::InvalidConfiguration`] before
//! any key material is read. Failures while building the credential are
//! reported as [`DriveError::CredentialFailed`].

use bridge_traits::auth::AuthorizationCodeReceiver;
use bridge_traits::storage::SecureStore;
use core_auth::{
    validate_key_path, AuthError, ClientSecrets, KeyFileKind, ServiceAccountCredential,
    UserAuthorization, UserCredential,
};
use core_runtime::config::DriveConfig;
use core_runtime::logging::strip_path;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, instrument};

use crate::error::{DriveError, Result};
use crate::transporter::DriveTransporter;

/// Authorize `user_id` through the browser and return a transporter.
///
/// Tokens are cached under `store_path`, one file per user. A cached
/// authorization is reused and refreshed on demand; otherwise the consent
/// page opens in the default browser and this call waits, without a timeout,
/// for the redirect to reach a loopback listener.
#[cfg(feature = "desktop-shims")]
pub async fn authenticate_oauth(
    config: &DriveConfig,
    client_secret_path: impl AsRef<Path>,
    user_id: &str,
    scopes: &[&str],
    store_path: impl AsRef<Path>,
) -> Result<DriveTransporter> {
    use bridge_desktop::{DirectorySecureStore, LoopbackCodeReceiver};

    let store_path = store_path.as_ref();
    if store_path.as_os_str().is_empty() {
        return Err(DriveError::InvalidConfiguration(
            AuthError::InvalidConfiguration("Token store path is required".to_string()),
        ));
    }

    let receiver = LoopbackCodeReceiver::bind()
        .await
        .map_err(|e| DriveError::CredentialFailed {
            source: AuthError::NetworkError(e.to_string()),
        })?;

    authenticate_oauth_with(
        config,
        client_secret_path,
        user_id,
        scopes,
        Arc::new(DirectorySecureStore::new(store_path)),
        &receiver,
    )
    .await
}

/// [`authenticate_oauth`] with an explicit token store and redirect receiver.
#[instrument(skip_all, fields(user_id = %user_id))]
pub async fn authenticate_oauth_with(
    config: &DriveConfig,
    client_secret_path: impl AsRef<Path>,
    user_id: &str,
    scopes: &[&str],
    secure_store: Arc<dyn SecureStore>,
    receiver: &dyn AuthorizationCodeReceiver,
) -> Result<DriveTransporter> {
    let client_secret_path = client_secret_path.as_ref();
    validate_key_path(client_secret_path, KeyFileKind::Json)
        .map_err(DriveError::InvalidConfiguration)?;
    if user_id.is_empty() {
        return Err(DriveError::MissingArgument("user_id"));
    }

    let credential_failed = |source| DriveError::CredentialFailed { source };

    let secrets = ClientSecrets::load(client_secret_path)
        .await
        .map_err(credential_failed)?;

    let params = UserAuthorization {
        secrets,
        scopes: scopes.iter().map(|s| s.to_string()).collect(),
        user_id,
        auth_url: &config.auth_url,
        token_url: &config.token_url,
    };
    let credential =
        UserCredential::authorize(params, secure_store, receiver, config.http_client.clone())
            .await
            .map_err(credential_failed)?;

    info!("User authorized for Google Drive");
    Ok(DriveTransporter::new(config, Arc::new(credential)))
}

/// Authenticate with a service account JSON key file.
#[instrument(skip(config, key_path, scopes), fields(key_file = %strip_path(&key_path.as_ref().to_string_lossy())))]
pub fn authenticate_service_account_json(
    config: &DriveConfig,
    key_path: impl AsRef<Path>,
    scopes: &[&str],
) -> Result<DriveTransporter> {
    let key_path = key_path.as_ref();
    validate_key_path(key_path, KeyFileKind::Json).map_err(DriveError::InvalidConfiguration)?;

    let credential = ServiceAccountCredential::from_json_file(
        key_path,
        scopes,
        &config.token_url,
        config.http_client.clone(),
    )
    .map_err(|source| DriveError::CredentialFailed { source })?;

    info!(client_email = %credential.client_email(), "Service account authenticated");
    Ok(DriveTransporter::new(config, Arc::new(credential)))
}

/// Authenticate with a service account PKCS#12 key file.
///
/// The bundle is decrypted with Google's fixed import password.
#[instrument(skip(config, key_path, service_account_email, scopes), fields(key_file = %strip_path(&key_path.as_ref().to_string_lossy())))]
pub fn authenticate_service_account_p12(
    config: &DriveConfig,
    key_path: impl AsRef<Path>,
    service_account_email: &str,
    scopes: &[&str],
) -> Result<DriveTransporter> {
    let key_path = key_path.as_ref();
    validate_key_path(key_path, KeyFileKind::P12).map_err(DriveError::InvalidConfiguration)?;
    if service_account_email.trim().is_empty() {
        return Err(DriveError::InvalidConfiguration(
            AuthError::InvalidConfiguration("Service account email is required".to_string()),
        ));
    }

    let credential = ServiceAccountCredential::from_p12_file(
        key_path,
        service_account_email,
        scopes,
        &config.token_url,
        config.http_client.clone(),
    )
    .map_err(|source| DriveError::CredentialFailed { source })?;

    info!(client_email = %credential.client_email(), "Service account authenticated");
    Ok(DriveTransporter::new(config, Arc::new(credential)))
}
