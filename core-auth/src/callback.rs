//! Redirect callback handling
//!
//! Turns the query parameters the identity provider appends to the redirect
//! URI into a persisted [`Session`].
//!
//! The authorization code doubles as an idempotency key: it is recorded as
//! consumed before the token exchange starts, so a handler invoked twice for
//! the same redirect sends a single token-endpoint request.

use crate::error::{AuthError, Result};
use crate::oauth::OAuthClient;
use crate::token_store::TokenStore;
use crate::types::{CallbackOutcome, CallbackRequest, Session};
use bridge_traits::time::Clock;
use core_runtime::events::{AuthEvent, CoreEvent, EventBus};
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use tracing::{debug, info, instrument, warn};

/// Completes the Authorization Code flow for one redirect.
pub struct CallbackHandler {
    oauth: Arc<OAuthClient>,
    token_store: TokenStore,
    clock: Arc<dyn Clock>,
    event_bus: EventBus,
    /// SHA-256 digests of every code this handler has consumed
    consumed: Mutex<HashSet<[u8; 32]>>,
}

impl CallbackHandler {
    pub fn new(
        oauth: Arc<OAuthClient>,
        token_store: TokenStore,
        clock: Arc<dyn Clock>,
        event_bus: EventBus,
    ) -> Self {
        Self {
            oauth,
            token_store,
            clock,
            event_bus,
            consumed: Mutex::new(HashSet::new()),
        }
    }

    /// Handle a redirect.
    ///
    /// In order:
    ///
    /// 1. An `error` parameter is returned as [`AuthError::ProviderError`]
    ///    without exchanging anything, even when `code` is also present.
    /// 2. A missing `code` or `state` is [`AuthError::MissingParameter`].
    /// 3. A code this handler has already seen yields
    ///    [`CallbackOutcome::AlreadyHandled`].
    /// 4. `state` must match the pending authorization saved by
    ///    `begin_sign_in`, otherwise [`AuthError::StateMismatch`].
    /// 5. The code is exchanged with exactly one token-endpoint request.
    /// 6. The resulting session is persisted and returned.
    ///
    /// A code stays consumed even when its exchange fails; the user restarts
    /// sign-in to obtain a new one.
    #[instrument(skip(self, request), fields(has_code = request.code.is_some(), has_error = request.error.is_some()))]
    pub async fn handle(&self, request: &CallbackRequest) -> Result<CallbackOutcome> {
        if let Some(error) = &request.error {
            let err = AuthError::ProviderError {
                error: error.clone(),
                description: request.error_description.clone(),
            };
            warn!(error = %error, "Identity provider rejected the authorization request");
            self.emit_failure(&err);
            return Err(err);
        }

        let code = request
            .code
            .as_deref()
            .ok_or(AuthError::MissingParameter("code"))?;
        let state = request
            .state
            .as_deref()
            .ok_or(AuthError::MissingParameter("state"))?;

        if !self.mark_consumed(code) {
            debug!("Authorization code already handled, skipping exchange");
            return Ok(CallbackOutcome::AlreadyHandled);
        }

        let pending = match self.token_store.take_pending().await {
            Ok(pending) => pending,
            Err(AuthError::TokenCorrupted(reason)) => {
                warn!(%reason, "Pending authorization unreadable");
                None
            }
            Err(e) => return Err(self.fail(e)),
        };

        let now = self.clock.now();
        let pending = match pending {
            Some(pending) if pending.is_stale(now) => {
                warn!(created_at = %pending.created_at, "Pending authorization expired");
                None
            }
            other => other,
        };

        let verifier = match pending {
            Some(pending) if pending.state == state => pending.code_verifier,
            Some(_) => {
                warn!("Callback state does not match pending authorization");
                return Err(self.fail(AuthError::StateMismatch));
            }
            None => {
                warn!("No pending authorization for callback");
                return Err(self.fail(AuthError::StateMismatch));
            }
        };

        let tokens = self
            .oauth
            .exchange_code(code, &verifier)
            .await
            .map_err(|e| self.fail(e))?;

        let session = Session::from_token_response(tokens, self.clock.now())
            .map_err(|e| self.fail(e))?;

        self.token_store
            .save(&session)
            .await
            .map_err(|e| self.fail(e))?;

        info!(expires_at = %session.expires_at, "Sign-in completed");
        let _ = self
            .event_bus
            .emit(CoreEvent::Auth(AuthEvent::SignedIn {
                expires_at: session.expires_at.timestamp(),
            }));

        Ok(CallbackOutcome::SignedIn(session))
    }

    /// Whether `code` has been consumed by this handler.
    pub fn is_consumed(&self, code: &str) -> bool {
        self.consumed_codes().contains(&digest(code))
    }

    /// Record `code` as consumed. Returns `false` if it already was.
    fn mark_consumed(&self, code: &str) -> bool {
        self.consumed_codes().insert(digest(code))
    }

    fn consumed_codes(&self) -> std::sync::MutexGuard<'_, HashSet<[u8; 32]>> {
        // The set is only ever inserted into; a poisoned guard still holds a
        // consistent value.
        self.consumed
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn fail(&self, err: AuthError) -> AuthError {
        self.emit_failure(&err);
        err
    }

    fn emit_failure(&self, err: &AuthError) {
        let _ = self.event_bus.emit(CoreEvent::Auth(AuthEvent::AuthError {
            message: err.to_string(),
            recoverable: err.is_transient(),
        }));
    }
}

fn digest(code: &str) -> [u8; 32] {
    Sha256::digest(code.as_bytes()).into()
}
