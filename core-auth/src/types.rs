use crate::error::{AuthError, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use url::Url;

/// Lifetime assumed when the token endpoint omits `expires_in`.
const DEFAULT_EXPIRES_IN_SECS: i64 = 3600;

/// An authenticated console session.
///
/// A session is either fully populated (all three tokens non-empty) or
/// absent; [`Session::from_token_response`] and the token store both
/// enforce this.
///
/// # Security
///
/// The `Debug` implementation redacts every token.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Bearer token attached to gateway API requests
    pub access_token: String,
    /// OIDC identity token
    pub id_token: String,
    /// Long-lived token used to obtain new access tokens
    pub refresh_token: String,
    /// When the access token expires (UTC)
    pub expires_at: DateTime<Utc>,
}

impl Session {
    /// Build a session from an authorization-code token response received
    /// at `now`.
    ///
    /// # Errors
    ///
    /// [`AuthError::ExchangeFailure`] if the response lacks a token.
    pub fn from_token_response(response: TokenResponse, now: DateTime<Utc>) -> Result<Self> {
        let expires_at = response.expires_at(now)?;

        let id_token = non_empty(response.id_token).ok_or_else(|| {
            AuthError::ExchangeFailure("token response did not include an id_token".to_string())
        })?;
        let refresh_token = non_empty(response.refresh_token).ok_or_else(|| {
            AuthError::ExchangeFailure(
                "token response did not include a refresh_token".to_string(),
            )
        })?;

        if response.access_token.is_empty() {
            return Err(AuthError::ExchangeFailure(
                "token response contained an empty access_token".to_string(),
            ));
        }

        Ok(Self {
            access_token: response.access_token,
            id_token,
            refresh_token,
            expires_at,
        })
    }

    /// Apply a refresh-grant response received at `now`.
    ///
    /// Replaces the access token and expiry, and the refresh token when the
    /// provider rotated it. The id token is kept.
    pub fn apply_refresh(&self, response: TokenResponse, now: DateTime<Utc>) -> Result<Self> {
        if response.access_token.is_empty() {
            return Err(AuthError::ExchangeFailure(
                "refresh response contained an empty access_token".to_string(),
            ));
        }

        let expires_at = response.expires_at(now)?;

        Ok(Self {
            access_token: response.access_token,
            id_token: self.id_token.clone(),
            refresh_token: non_empty(response.refresh_token)
                .unwrap_or_else(|| self.refresh_token.clone()),
            expires_at,
        })
    }

    /// Whether the access token expires within `margin` of `now`.
    pub fn needs_refresh(&self, now: DateTime<Utc>, margin: Duration) -> bool {
        self.expires_at
            .checked_sub_signed(margin)
            .map_or(true, |threshold| threshold <= now)
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    /// Name of the first empty token, if any.
    pub(crate) fn missing_field(&self) -> Option<&'static str> {
        if self.access_token.is_empty() {
            Some("access_token")
        } else if self.id_token.is_empty() {
            Some("id_token")
        } else if self.refresh_token.is_empty() {
            Some("refresh_token")
        } else {
            None
        }
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("access_token", &"[REDACTED]")
            .field("id_token", &"[REDACTED]")
            .field("refresh_token", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

/// JSON body returned by the token endpoint for both grants.
#[derive(Clone, Deserialize, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default = "default_expires_in")]
    pub expires_in: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
}

impl TokenResponse {
    /// `now + expires_in`; an out-of-range lifetime is an
    /// [`AuthError::ExchangeFailure`].
    fn expires_at(&self, now: DateTime<Utc>) -> Result<DateTime<Utc>> {
        Duration::try_seconds(self.expires_in.max(0))
            .and_then(|lifetime| now.checked_add_signed(lifetime))
            .ok_or_else(|| {
                AuthError::ExchangeFailure(format!(
                    "token response has an out-of-range expires_in: {}",
                    self.expires_in
                ))
            })
    }
}

impl fmt::Debug for TokenResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenResponse")
            .field("access_token", &"[REDACTED]")
            .field("has_id_token", &self.id_token.is_some())
            .field("has_refresh_token", &self.refresh_token.is_some())
            .field("expires_in", &self.expires_in)
            .field("token_type", &self.token_type)
            .finish()
    }
}

fn default_expires_in() -> i64 {
    DEFAULT_EXPIRES_IN_SECS
}

/// Query parameters the identity provider appends to the redirect URI.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallbackRequest {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

impl CallbackRequest {
    /// Parse a raw query string (with or without the leading `?`).
    ///
    /// Empty values are treated as absent. Unknown parameters are ignored.
    pub fn from_query(query: &str) -> Self {
        let query = query.strip_prefix('?').unwrap_or(query);
        let mut request = Self::default();

        for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
            let slot = match key.as_ref() {
                "code" => &mut request.code,
                "state" => &mut request.state,
                "error" => &mut request.error,
                "error_description" => &mut request.error_description,
                _ => continue,
            };
            if !value.is_empty() {
                *slot = Some(value.into_owned());
            }
        }

        request
    }

    /// Parse the full redirect URL the browser landed on.
    pub fn from_url(redirect: &str) -> Result<Self> {
        let url = Url::parse(redirect).map_err(|e| AuthError::MalformedRedirect(e.to_string()))?;
        Ok(Self::from_query(url.query().unwrap_or_default()))
    }
}

/// Result of handling a redirect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackOutcome {
    /// The code was exchanged and the session persisted. The host should
    /// navigate to the authenticated landing area.
    SignedIn(Session),
    /// This code was already handled by this handler; nothing was done.
    AlreadyHandled,
}

/// Values generated before redirecting to the identity provider and
/// checked when the redirect comes back.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingAuthorization {
    pub state: String,
    pub code_verifier: String,
    pub created_at: DateTime<Utc>,
}

impl PendingAuthorization {
    /// Pending authorizations older than this are treated as absent.
    pub const MAX_AGE_SECS: i64 = 600;

    pub fn is_stale(&self, now: DateTime<Utc>) -> bool {
        now - self.created_at > Duration::seconds(Self::MAX_AGE_SECS)
    }
}

impl fmt::Debug for PendingAuthorization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingAuthorization")
            .field("state", &"[REDACTED]")
            .field("code_verifier", &"[REDACTED]")
            .field("created_at", &self.created_at)
            .finish()
    }
}
