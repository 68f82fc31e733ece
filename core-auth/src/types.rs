use chrono::{DateTime, Duration, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Seconds before expiry at which a token is treated as expired.
pub const EXPIRY_SKEW_SECS: i64 = 60;

/// OAuth 2.0 token set.
///
/// Holds an access token, the optional refresh token and the expiry instant.
/// Service-account tokens never carry a refresh token; they are re-minted
/// instead.
///
/// # Security
///
/// Tokens must never be logged. The `Debug` implementation redacts them.
///
/// # Examples
///
/// ```
/// use core_auth::OAuthTokens;
///
/// let tokens = OAuthTokens::new("ya29.a0...".to_string(), Some("1//0g...".to_string()), 3600);
/// assert!(!tokens.is_expired());
/// ```
#[derive(Clone, Serialize, Deserialize)]
pub struct OAuthTokens {
    access_token: String,
    refresh_token: Option<String>,
    expires_at: DateTime<Utc>,
}

impl OAuthTokens {
    /// Create a token set expiring `expires_in` seconds from now
    pub fn new(access_token: String, refresh_token: Option<String>, expires_in: i64) -> Self {
        Self::issued_at(access_token, refresh_token, Utc::now(), expires_in)
    }

    /// Create a token set issued at `issued_at`
    pub fn issued_at(
        access_token: String,
        refresh_token: Option<String>,
        issued_at: DateTime<Utc>,
        expires_in: i64,
    ) -> Self {
        Self {
            access_token,
            refresh_token,
            expires_at: issued_at + Duration::seconds(expires_in),
        }
    }

    /// Rebuild a token set from persisted parts (`expires_at` as a Unix timestamp)
    pub fn from_parts(access_token: String, refresh_token: Option<String>, expires_at: i64) -> Self {
        let expires_at = Utc
            .timestamp_opt(expires_at, 0)
            .single()
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        Self {
            access_token,
            refresh_token,
            expires_at,
        }
    }

    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    pub fn refresh_token(&self) -> Option<&str> {
        self.refresh_token.as_deref()
    }

    /// Expiry as a Unix timestamp
    pub fn expires_at(&self) -> i64 {
        self.expires_at.timestamp()
    }

    /// Expired, or expiring within [`EXPIRY_SKEW_SECS`]
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at - Duration::seconds(EXPIRY_SKEW_SECS)
    }

    /// Keep the current refresh token when a refresh response omits one
    pub fn with_fallback_refresh_token(mut self, refresh_token: Option<&str>) -> Self {
        if self.refresh_token.is_none() {
            self.refresh_token = refresh_token.map(str::to_string);
        }
        self
    }
}

impl fmt::Debug for OAuthTokens {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OAuthTokens")
            .field("access_token", &"[REDACTED]")
            .field(
                "refresh_token",
                &self.refresh_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("expires_at", &self.expires_at)
            .finish()
    }
}
