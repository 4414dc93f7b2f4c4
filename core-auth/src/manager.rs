//! # Authentication Manager
//!
//! Owns the console session for one browser context.
//!
//! ## Overview
//!
//! `AuthManager` wires the [`OAuthClient`], [`TokenStore`],
//! [`CallbackHandler`], [`TokenRefresher`] and [`SessionAccessor`] together
//! from a [`CoreConfig`] and an [`OAuthConfig`]. There is no global auth
//! state: the host constructs one manager at startup (which picks up any
//! session persisted by a previous run) and hands out the accessor to code
//! that calls the gateway API.
//!
//! ## Flow
//!
//! 1. [`begin_sign_in`](AuthManager::begin_sign_in) stores a fresh `state`
//!    and PKCE verifier and returns the provider's authorize URL
//! 2. The provider redirects back;
//!    [`handle_redirect`](AuthManager::handle_redirect) exchanges the code
//!    and persists the session
//! 3. API code calls [`SessionAccessor::get_access_token`], which refreshes
//!    on demand
//! 4. [`sign_out`](AuthManager::sign_out) clears everything and returns the
//!    provider logout URL
//!
//! Every transition is published on the [`EventBus`].
//!
//! ## Usage
//!
//! ```no_run
//! use core_auth::{AuthManager, CallbackOutcome, OAuthConfig};
//! use core_runtime::config::CoreConfig;
//!
//! # async fn example(config: CoreConfig) -> core_auth::Result<()> {
//! let manager = AuthManager::new(&config, OAuthConfig::from_env()?)?;
//!
//! let authorize_url = manager.begin_sign_in().await?;
//! // ...browser round trip...
//! # let redirect = String::new();
//! match manager.handle_redirect(&redirect).await? {
//!     CallbackOutcome::SignedIn(_) => { /* go to the dashboard */ }
//!     CallbackOutcome::AlreadyHandled => {}
//! }
//!
//! let token = manager.accessor().get_access_token().await?;
//! # Ok(())
//! # }
//! ```

use crate::accessor::SessionAccessor;
use crate::callback::CallbackHandler;
use crate::error::{AuthError, Result};
use crate::oauth::{OAuthClient, OAuthConfig, PkceVerifier};
use crate::refresher::TokenRefresher;
use crate::token_store::TokenStore;
use crate::types::{CallbackOutcome, CallbackRequest, PendingAuthorization};
use bridge_traits::time::Clock;
use core_runtime::config::CoreConfig;
use core_runtime::events::{AuthEvent, CoreEvent, EventBus};
use core_runtime::logging::strip_query;
use std::sync::Arc;
use tokio::sync::broadcast::Receiver;
use tracing::{debug, info, instrument, warn};

/// Session lifecycle orchestrator.
pub struct AuthManager {
    oauth: Arc<OAuthClient>,
    token_store: TokenStore,
    clock: Arc<dyn Clock>,
    event_bus: EventBus,
    callback: CallbackHandler,
    refresher: TokenRefresher,
    accessor: SessionAccessor,
}

impl AuthManager {
    /// Build a manager with its own event bus.
    ///
    /// # Errors
    ///
    /// [`AuthError::InvalidConfig`] if either configuration fails
    /// validation.
    pub fn new(config: &CoreConfig, oauth_config: OAuthConfig) -> Result<Self> {
        Self::with_event_bus(
            config,
            oauth_config,
            EventBus::new(config.event_buffer_size),
        )
    }

    /// Build a manager publishing on an existing event bus.
    pub fn with_event_bus(
        config: &CoreConfig,
        oauth_config: OAuthConfig,
        event_bus: EventBus,
    ) -> Result<Self> {
        config.validate()?;
        oauth_config.validate()?;

        let margin = chrono::Duration::from_std(config.refresh_margin)
            .map_err(|e| AuthError::InvalidConfig(format!("Invalid refresh margin: {}", e)))?;

        let oauth = Arc::new(OAuthClient::new(
            oauth_config,
            Arc::clone(&config.http_client),
            config.exchange_timeout,
        ));
        let token_store = TokenStore::new(
            Arc::clone(&config.secure_store),
            &config.storage_namespace,
        );
        let callback = CallbackHandler::new(
            Arc::clone(&oauth),
            token_store.clone(),
            Arc::clone(&config.clock),
            event_bus.clone(),
        );
        let refresher = TokenRefresher::new(
            Arc::clone(&oauth),
            token_store.clone(),
            Arc::clone(&config.clock),
            event_bus.clone(),
            margin,
        );
        let accessor = SessionAccessor::new(token_store.clone(), refresher.clone());

        info!(
            client_id = %oauth.config().client_id,
            namespace = %config.storage_namespace,
            "AuthManager initialized"
        );

        Ok(Self {
            oauth,
            token_store,
            clock: Arc::clone(&config.clock),
            event_bus,
            callback,
            refresher,
            accessor,
        })
    }

    /// Prepare a new authorization request and return the URL the browser
    /// should be sent to.
    ///
    /// Replaces any earlier pending authorization, so only the most recent
    /// redirect can complete.
    #[instrument(skip(self))]
    pub async fn begin_sign_in(&self) -> Result<String> {
        let pkce = PkceVerifier::new();
        let url = self.oauth.authorization_url(&pkce)?;

        self.token_store
            .save_pending(&PendingAuthorization {
                state: pkce.state().to_string(),
                code_verifier: pkce.verifier().to_string(),
                created_at: self.clock.now(),
            })
            .await?;

        info!("Sign-in started");
        let _ = self.event_bus.emit(CoreEvent::Auth(AuthEvent::SigningIn));

        Ok(url)
    }

    /// Complete sign-in from parsed redirect parameters.
    pub async fn complete_sign_in(&self, request: &CallbackRequest) -> Result<CallbackOutcome> {
        let outcome = self.callback.handle(request).await?;
        if matches!(outcome, CallbackOutcome::SignedIn(_)) {
            // A refresh of the previous session must not overwrite this one.
            self.refresher.reset();
        }
        Ok(outcome)
    }

    /// Complete sign-in from the full URL the browser was redirected to.
    pub async fn handle_redirect(&self, redirect_url: &str) -> Result<CallbackOutcome> {
        debug!(redirect = strip_query(redirect_url), "Handling redirect");
        let request = CallbackRequest::from_url(redirect_url)?;
        self.complete_sign_in(&request).await
    }

    /// Clear the session and any pending authorization.
    ///
    /// Returns the provider logout URL when a logout redirect is configured;
    /// the host navigates there to end the provider-side session too.
    #[instrument(skip(self))]
    pub async fn sign_out(&self) -> Result<Option<String>> {
        self.refresher.reset();
        self.token_store.clear().await?;

        if let Err(e) = self.token_store.clear_pending().await {
            warn!(error = %e, "Failed to clear pending authorization");
        }

        info!("Signed out");
        let _ = self.event_bus.emit(CoreEvent::Auth(AuthEvent::SignedOut));

        Ok(self.oauth.logout_url())
    }

    pub fn accessor(&self) -> SessionAccessor {
        self.accessor.clone()
    }

    pub fn refresher(&self) -> &TokenRefresher {
        &self.refresher
    }

    pub fn callback_handler(&self) -> &CallbackHandler {
        &self.callback
    }

    pub fn token_store(&self) -> &TokenStore {
        &self.token_store
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    pub fn subscribe_events(&self) -> Receiver<CoreEvent> {
        self.event_bus.subscribe()
    }
}
