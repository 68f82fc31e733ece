//! # Transporter Configuration
//!
//! Endpoint and transport settings shared by every Drive transporter.
//!
//! ## Overview
//!
//! `DriveConfig` is assembled with [`DriveConfigBuilder`] and validated
//! fail-fast: a bad endpoint URL or a zero timeout is reported when the
//! configuration is built, not on the first request.
//!
//! ## Dependencies
//!
//! - `HttpClient` - required. With the `desktop-shims` feature a
//!   `bridge_desktop::ReqwestHttpClient` honouring `request_timeout` and
//!   `user_agent` is injected when none is provided.
//!
//! ## Usage
//!
//! ### Desktop defaults
//!
//! ```ignore
//! use core_runtime::config::DriveConfig;
//!
//! let config = DriveConfig::builder().build()?;
//! ```
//!
//! ### Custom endpoints and client
//!
//! ```ignore
//! use core_runtime::config::DriveConfig;
//! use std::sync::Arc;
//!
//! let config = DriveConfig::builder()
//!     .api_base_url("http://127.0.0.1:8080/drive/v3")
//!     .upload_base_url("http://127.0.0.1:8080/upload/drive/v3")
//!     .http_client(Arc::new(MyHttpClient))
//!     .build()?;
//! ```

use crate::error::{Error, Result};
use bridge_traits::http::HttpClient;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

pub const DEFAULT_API_BASE_URL: &str = "https://www.googleapis.com/drive/v3";
pub const DEFAULT_UPLOAD_BASE_URL: &str = "https://www.googleapis.com/upload/drive/v3";
pub const DEFAULT_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
pub const DEFAULT_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

fn default_user_agent() -> String {
    format!("drive-transporter/{}", env!("CARGO_PKG_VERSION"))
}

/// Validated transporter configuration.
#[derive(Clone)]
pub struct DriveConfig {
    /// Drive v3 metadata endpoint, without trailing slash
    pub api_base_url: String,

    /// Drive v3 media upload endpoint, without trailing slash
    pub upload_base_url: String,

    /// OAuth consent page for the installed-app flow
    pub auth_url: String,

    /// OAuth token endpoint used by user credentials
    pub token_url: String,

    pub request_timeout: Duration,

    pub user_agent: String,

    pub http_client: Arc<dyn HttpClient>,
}

impl std::fmt::Debug for DriveConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DriveConfig")
            .field("api_base_url", &self.api_base_url)
            .field("upload_base_url", &self.upload_base_url)
            .field("auth_url", &self.auth_url)
            .field("token_url", &self.token_url)
            .field("request_timeout", &self.request_timeout)
            .field("user_agent", &self.user_agent)
            .field("http_client", &"<dyn HttpClient>")
            .finish()
    }
}

impl DriveConfig {
    pub fn builder() -> DriveConfigBuilder {
        DriveConfigBuilder::default()
    }

    /// Check endpoint URLs and the timeout.
    ///
    /// Every endpoint must be an absolute `http` or `https` URL.
    pub fn validate(&self) -> Result<()> {
        validate_endpoint("api_base_url", &self.api_base_url)?;
        validate_endpoint("upload_base_url", &self.upload_base_url)?;
        validate_endpoint("auth_url", &self.auth_url)?;
        validate_endpoint("token_url", &self.token_url)?;

        if self.request_timeout.is_zero() {
            return Err(Error::Config(
                "Request timeout must be greater than zero".to_string(),
            ));
        }

        if self.user_agent.trim().is_empty() {
            return Err(Error::Config("User agent cannot be empty".to_string()));
        }

        Ok(())
    }
}

fn validate_endpoint(name: &str, value: &str) -> Result<()> {
    let url = Url::parse(value)
        .map_err(|e| Error::Config(format!("{} is not a valid URL ({}): {}", name, value, e)))?;

    match url.scheme() {
        "http" | "https" => Ok(()),
        other => Err(Error::Config(format!(
            "{} must use http or https, got '{}'",
            name, other
        ))),
    }
}

#[cfg(feature = "desktop-shims")]
fn provide_default_http_client(
    timeout: Duration,
    user_agent: &str,
) -> Result<Arc<dyn HttpClient>> {
    use bridge_desktop::ReqwestHttpClient;

    let client = ReqwestHttpClient::with_timeout(timeout, user_agent).map_err(|e| {
        Error::Internal(format!("Failed to initialize default HttpClient: {}", e))
    })?;
    let client: Arc<dyn HttpClient> = Arc::new(client);
    Ok(client)
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_http_client(
    _timeout: Duration,
    _user_agent: &str,
) -> Result<Arc<dyn HttpClient>> {
    Err(Error::CapabilityMissing {
        capability: "HttpClient".to_string(),
        message: "HttpClient implementation is required to reach the Drive API. \
                 Desktop: enable the 'desktop-shims' feature to use the default ReqwestHttpClient. \
                 Other hosts: inject an implementation with .http_client()."
            .to_string(),
    })
}

/// Builder for [`DriveConfig`].
///
/// Unset endpoints fall back to the public Google endpoints.
#[derive(Default)]
pub struct DriveConfigBuilder {
    api_base_url: Option<String>,
    upload_base_url: Option<String>,
    auth_url: Option<String>,
    token_url: Option<String>,
    request_timeout: Option<Duration>,
    user_agent: Option<String>,
    http_client: Option<Arc<dyn HttpClient>>,
}

impl DriveConfigBuilder {
    pub fn api_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = Some(url.into());
        self
    }

    pub fn upload_base_url(mut self, url: impl Into<String>) -> Self {
        self.upload_base_url = Some(url.into());
        self
    }

    pub fn auth_url(mut self, url: impl Into<String>) -> Self {
        self.auth_url = Some(url.into());
        self
    }

    pub fn token_url(mut self, url: impl Into<String>) -> Self {
        self.token_url = Some(url.into());
        self
    }

    /// Global per-request timeout applied by the default HTTP client
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    /// Inject the HTTP client used for every API and token request.
    pub fn http_client(mut self, client: Arc<dyn HttpClient>) -> Self {
        self.http_client = Some(client);
        self
    }

    /// Build and validate the configuration.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] for malformed endpoints, a zero timeout or an
    ///   empty user agent
    /// - [`Error::CapabilityMissing`] when no HTTP client was injected and
    ///   the `desktop-shims` feature is off
    pub fn build(self) -> Result<DriveConfig> {
        let request_timeout = self.request_timeout.unwrap_or(DEFAULT_REQUEST_TIMEOUT);
        let user_agent = self.user_agent.unwrap_or_else(default_user_agent);

        let http_client = match self.http_client {
            Some(client) => client,
            None => provide_default_http_client(request_timeout, &user_agent)?,
        };

        let config = DriveConfig {
            api_base_url: trim_trailing_slash(
                self.api_base_url
                    .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string()),
            ),
            upload_base_url: trim_trailing_slash(
                self.upload_base_url
                    .unwrap_or_else(|| DEFAULT_UPLOAD_BASE_URL.to_string()),
            ),
            auth_url: self.auth_url.unwrap_or_else(|| DEFAULT_AUTH_URL.to_string()),
            token_url: self
                .token_url
                .unwrap_or_else(|| DEFAULT_TOKEN_URL.to_string()),
            request_timeout,
            user_agent,
            http_client,
        };

        config.validate()?;

        Ok(config)
    }
}

fn trim_trailing_slash(mut url: String) -> String {
    while url.ends_with('/') {
        url.pop();
    }
    url
}
