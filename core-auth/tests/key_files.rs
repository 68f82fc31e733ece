//! Loading the credential files a Cloud Console project hands out.

use async_trait::async_trait;
use bridge_traits::error::{BridgeError, Result as BridgeResult};
use bridge_traits::http::{HttpClient, HttpRequest, HttpResponse};
use core_auth::{
    validate_key_path, AuthError, ClientSecrets, KeyFileKind, ServiceAccountCredential,
    TokenProvider,
};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

/// Token endpoint that records the URL it was called on.
#[derive(Default)]
struct RecordingTokenEndpoint {
    urls: Mutex<Vec<String>>,
}

#[async_trait]
impl HttpClient for RecordingTokenEndpoint {
    async fn execute(&self, request: HttpRequest) -> BridgeResult<HttpResponse> {
        self.urls.lock().unwrap().push(request.url.clone());
        if request.header_value("Content-Type") != Some("application/x-www-form-urlencoded") {
            return Err(BridgeError::OperationFailed("unexpected content type".into()));
        }
        Ok(HttpResponse::new(
            200,
            r#"{"access_token":"ya29.service","expires_in":3600,"token_type":"Bearer"}"#,
        ))
    }
}

#[tokio::test]
async fn test_client_secret_fixture_loads() {
    let secrets = ClientSecrets::load(fixture("client_secret.json"))
        .await
        .unwrap();

    assert_eq!(secrets.client_id, "1234567890-abc.apps.googleusercontent.com");
    assert_eq!(secrets.client_secret.as_deref(), Some("GOCSPX-test-secret"));
}

#[tokio::test]
async fn test_json_key_posts_to_its_own_token_uri() {
    let endpoint = Arc::new(RecordingTokenEndpoint::default());
    let credential = ServiceAccountCredential::from_json_file(
        fixture("service_account.json"),
        &["https://www.googleapis.com/auth/drive"],
        "https://fallback.example.com/token",
        endpoint.clone(),
    )
    .unwrap();

    assert_eq!(credential.access_token().await.unwrap(), "ya29.service");
    assert_eq!(
        *endpoint.urls.lock().unwrap(),
        vec!["https://oauth2.googleapis.com/token".to_string()]
    );
}

#[tokio::test]
async fn test_p12_key_posts_to_configured_token_url() {
    let endpoint = Arc::new(RecordingTokenEndpoint::default());
    let credential = ServiceAccountCredential::from_p12_file(
        fixture("service_account.p12"),
        "uploader@drive-transporter-test.iam.gserviceaccount.com",
        &["https://www.googleapis.com/auth/drive"],
        "https://oauth2.example.com/token",
        endpoint.clone(),
    )
    .unwrap();

    assert_eq!(credential.access_token().await.unwrap(), "ya29.service");
    assert_eq!(
        *endpoint.urls.lock().unwrap(),
        vec!["https://oauth2.example.com/token".to_string()]
    );
}

#[test]
fn test_key_paths_are_checked_before_loading() {
    assert!(validate_key_path(&fixture("service_account.json"), KeyFileKind::Json).is_ok());
    assert!(matches!(
        validate_key_path(&fixture("client_secret.p12"), KeyFileKind::P12),
        Err(AuthError::InvalidConfiguration(_))
    ));
}
