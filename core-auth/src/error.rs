use thiserror::Error;

/// Errors produced by the session core.
///
/// Payloads are plain strings so a single refresh result can be cloned to
/// every caller waiting on it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// The redirect lacked `code` or `state` and carried no `error`.
    #[error("Missing required redirect parameter: {0}")]
    MissingParameter(&'static str),

    /// The identity provider redirected back with `error`, passed through
    /// verbatim.
    #[error("Identity provider returned '{error}'{}", .description.as_deref().map(|d| format!(": {}", d)).unwrap_or_default())]
    ProviderError {
        error: String,
        description: Option<String>,
    },

    /// Network failure or provider rejection during a code or refresh
    /// exchange. Retryable by restarting sign-in; never retried
    /// automatically.
    #[error("Token exchange failed: {0}")]
    ExchangeFailure(String),

    /// The refresh token is invalid or expired. The session has been
    /// cleared.
    #[error("Session expired; sign in again")]
    ReauthenticationRequired,

    #[error("Authorization state mismatch")]
    StateMismatch,

    #[error("Not authenticated")]
    NotAuthenticated,

    /// A session missing one of its tokens was offered to the token store.
    #[error("Session is missing {0}")]
    IncompleteSession(&'static str),

    #[error("Stored session is corrupted: {0}")]
    TokenCorrupted(String),

    #[error("Secure storage unavailable: {0}")]
    SecureStorageUnavailable(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Malformed redirect URL: {0}")]
    MalformedRedirect(String),
}

impl AuthError {
    /// Whether the user-visible recovery path is "start sign-in again".
    pub fn requires_sign_in(&self) -> bool {
        matches!(
            self,
            AuthError::ReauthenticationRequired
                | AuthError::NotAuthenticated
                | AuthError::StateMismatch
                | AuthError::ProviderError { .. }
                | AuthError::MissingParameter(_)
                | AuthError::ExchangeFailure(_)
                | AuthError::TokenCorrupted(_)
                | AuthError::MalformedRedirect(_)
        )
    }

    /// Whether repeating the same call may succeed without user action.
    pub fn is_transient(&self) -> bool {
        matches!(self, AuthError::SecureStorageUnavailable(_))
    }
}

impl From<core_runtime::Error> for AuthError {
    fn from(err: core_runtime::Error) -> Self {
        AuthError::InvalidConfig(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AuthError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_error_display() {
        let err = AuthError::ProviderError {
            error: "access_denied".to_string(),
            description: Some("User cancelled".to_string()),
        };
        assert_eq!(
            err.to_string(),
            "Identity provider returned 'access_denied': User cancelled"
        );

        let err = AuthError::ProviderError {
            error: "server_error".to_string(),
            description: None,
        };
        assert_eq!(err.to_string(), "Identity provider returned 'server_error'");
    }

    #[test]
    fn test_requires_sign_in() {
        assert!(AuthError::ReauthenticationRequired.requires_sign_in());
        assert!(AuthError::StateMismatch.requires_sign_in());
        assert!(AuthError::ExchangeFailure("503".into()).requires_sign_in());
        assert!(!AuthError::SecureStorageUnavailable("locked".into()).requires_sign_in());
        assert!(!AuthError::InvalidConfig("no client id".into()).requires_sign_in());
    }

    #[test]
    fn test_runtime_error_conversion() {
        let err: AuthError = core_runtime::Error::Config("bad namespace".to_string()).into();
        assert!(matches!(err, AuthError::InvalidConfig(ref m) if m.contains("bad namespace")));
    }
}
