//! Session accessor
//!
//! The surface the rest of the console uses to ask "who am I" and to attach
//! credentials to gateway API calls. It never navigates; callers that get
//! [`AuthError::ReauthenticationRequired`] send the user back to sign-in.

use crate::error::{AuthError, Result};
use crate::refresher::TokenRefresher;
use crate::token_store::TokenStore;
use crate::types::Session;
use bridge_traits::http::HttpRequest;
use tracing::{debug, instrument, warn};

#[derive(Clone)]
pub struct SessionAccessor {
    token_store: TokenStore,
    refresher: TokenRefresher,
}

impl SessionAccessor {
    pub fn new(token_store: TokenStore, refresher: TokenRefresher) -> Self {
        Self {
            token_store,
            refresher,
        }
    }

    /// Whether a session is stored.
    ///
    /// Best effort: a session whose refresh token has been revoked still
    /// counts until the next refresh attempt fails. Unreadable storage
    /// counts as signed out.
    pub async fn is_authenticated(&self) -> bool {
        match self.token_store.load().await {
            Ok(session) => session.is_some(),
            Err(e) => {
                warn!(error = %e, "Could not read session");
                false
            }
        }
    }

    /// A currently valid access token, or `None` when signed out.
    ///
    /// Refreshes transparently when the stored token is near expiry.
    #[instrument(skip(self))]
    pub async fn get_access_token(&self) -> Result<Option<String>> {
        match self.refresher.get_valid_access_token().await {
            Ok(token) => Ok(Some(token)),
            Err(AuthError::NotAuthenticated) => {
                debug!("No session");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// The stored session without triggering a refresh.
    pub async fn current_session(&self) -> Result<Option<Session>> {
        self.token_store.load().await
    }

    /// Attach `Authorization: Bearer <token>` to a gateway request.
    ///
    /// # Errors
    ///
    /// [`AuthError::NotAuthenticated`] when signed out, plus any refresh
    /// error.
    pub async fn authorize(&self, request: HttpRequest) -> Result<HttpRequest> {
        let token = self
            .get_access_token()
            .await?
            .ok_or(AuthError::NotAuthenticated)?;
        Ok(request.bearer_token(token))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oauth::{OAuthClient, OAuthConfig};
    use crate::test_support::{base_time, MemoryStore, ScriptedHttpClient, TestClock};
    use bridge_traits::http::HttpMethod;
    use chrono::Duration;
    use core_runtime::events::EventBus;
    use std::sync::Arc;

    fn accessor() -> (Arc<MemoryStore>, Arc<ScriptedHttpClient>, TokenStore, SessionAccessor) {
        let backing = Arc::new(MemoryStore::default());
        let http = Arc::new(ScriptedHttpClient::default());
        let store = TokenStore::new(backing.clone(), "gateway_console");
        let oauth = Arc::new(OAuthClient::new(
            OAuthConfig::cognito("auth.example.com", "client", "https://c.example.com/cb"),
            http.clone(),
            std::time::Duration::from_secs(5),
        ));
        let refresher = TokenRefresher::new(
            oauth,
            store.clone(),
            Arc::new(TestClock::new(base_time())),
            EventBus::default(),
            Duration::seconds(60),
        );
        (backing, http, store.clone(), SessionAccessor::new(store, refresher))
    }

    fn session(expires_in: Duration) -> Session {
        Session {
            access_token: "access-1".to_string(),
            id_token: "id-1".to_string(),
            refresh_token: "refresh-1".to_string(),
            expires_at: base_time() + expires_in,
        }
    }

    #[tokio::test]
    async fn test_signed_out() {
        let (_, http, _, accessor) = accessor();

        assert!(!accessor.is_authenticated().await);
        assert_eq!(accessor.get_access_token().await.unwrap(), None);
        assert_eq!(accessor.current_session().await.unwrap(), None);
        assert_eq!(
            accessor
                .authorize(HttpRequest::new(HttpMethod::Get, "https://api.example.com/keys"))
                .await
                .unwrap_err(),
            AuthError::NotAuthenticated
        );
        assert_eq!(http.calls(), 0);
    }

    #[tokio::test]
    async fn test_signed_in() {
        let (_, _, store, accessor) = accessor();
        store.save(&session(Duration::hours(1))).await.unwrap();

        assert!(accessor.is_authenticated().await);
        assert_eq!(
            accessor.get_access_token().await.unwrap().as_deref(),
            Some("access-1")
        );

        let request = accessor
            .authorize(HttpRequest::new(HttpMethod::Get, "https://api.example.com/keys"))
            .await
            .unwrap();
        assert_eq!(request.header_value("authorization"), Some("Bearer access-1"));
    }

    #[tokio::test]
    async fn test_expired_session_still_counts_as_authenticated() {
        let (_, _, store, accessor) = accessor();
        store.save(&session(Duration::hours(-1))).await.unwrap();

        assert!(accessor.is_authenticated().await);
    }

    #[tokio::test]
    async fn test_rejected_refresh_propagates() {
        let (_, http, store, accessor) = accessor();
        store.save(&session(Duration::hours(-1))).await.unwrap();
        http.push_json(400, r#"{"error":"invalid_grant"}"#);

        assert_eq!(
            accessor.get_access_token().await.unwrap_err(),
            AuthError::ReauthenticationRequired
        );
        assert!(!accessor.is_authenticated().await);
    }

    #[tokio::test]
    async fn test_corrupted_storage_is_signed_out() {
        let (backing, _, _, accessor) = accessor();
        backing.put_raw("gateway_console:session", b"garbage");

        assert!(!accessor.is_authenticated().await);
    }
}
