//! Access token refresh
//!
//! [`TokenRefresher::get_valid_access_token`] returns the stored access
//! token while it is comfortably inside its lifetime and otherwise runs a
//! refresh-grant exchange.
//!
//! ## Single flight
//!
//! At most one refresh exchange runs at a time. The first caller that needs
//! a refresh installs a shared future in the refresher; every caller that
//! arrives while it is pending awaits that same future and receives a clone
//! of its result. The future removes itself from the slot when it completes.
//!
//! The refresh future re-reads the store before calling the provider, so a
//! caller holding a session loaded just before another refresh finished does
//! not trigger a second exchange.
//!
//! ## Failure handling
//!
//! | Provider outcome               | Session  | Error                       |
//! |--------------------------------|----------|-----------------------------|
//! | 4xx (except 429)               | cleared  | `ReauthenticationRequired`  |
//! | `invalid_client` error body    | retained | `ExchangeFailure`           |
//! | 429, 5xx, transport, timeout   | retained | `ExchangeFailure`           |
//! | out-of-range `expires_in`      | retained | `ExchangeFailure`           |

use crate::error::{AuthError, Result};
use crate::oauth::OAuthClient;
use crate::token_store::TokenStore;
use bridge_traits::time::Clock;
use chrono::Duration;
use core_runtime::events::{AuthEvent, CoreEvent, EventBus};
use futures::future::{BoxFuture, FutureExt, Shared};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, error, info, instrument, warn};

type SharedRefresh = Shared<BoxFuture<'static, Result<String>>>;

#[derive(Default)]
struct RefreshSlot {
    /// Bumped by `reset`; a refresh started under an older epoch never
    /// writes to the store.
    epoch: u64,
    in_flight: Option<SharedRefresh>,
}

struct Inner {
    oauth: Arc<OAuthClient>,
    token_store: TokenStore,
    clock: Arc<dyn Clock>,
    event_bus: EventBus,
    margin: Duration,
    slot: Mutex<RefreshSlot>,
}

/// Hands out valid access tokens, refreshing them when needed.
///
/// Cheap to clone; clones share the in-flight refresh.
#[derive(Clone)]
pub struct TokenRefresher {
    inner: Arc<Inner>,
}

impl TokenRefresher {
    pub fn new(
        oauth: Arc<OAuthClient>,
        token_store: TokenStore,
        clock: Arc<dyn Clock>,
        event_bus: EventBus,
        margin: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                oauth,
                token_store,
                clock,
                event_bus,
                margin,
                slot: Mutex::new(RefreshSlot::default()),
            }),
        }
    }

    /// Return an access token valid for at least the refresh margin.
    ///
    /// # Errors
    ///
    /// - [`AuthError::NotAuthenticated`] if no session is stored
    /// - [`AuthError::ReauthenticationRequired`] if the provider rejected the
    ///   refresh token; the session has been cleared
    /// - [`AuthError::ExchangeFailure`] if the provider could not be reached;
    ///   the session is kept
    #[instrument(skip(self))]
    pub async fn get_valid_access_token(&self) -> Result<String> {
        let session = self
            .inner
            .token_store
            .load()
            .await?
            .ok_or(AuthError::NotAuthenticated)?;

        if !session.needs_refresh(self.inner.clock.now(), self.inner.margin) {
            return Ok(session.access_token);
        }

        debug!(expires_at = %session.expires_at, "Access token near expiry");
        self.join_or_start().await
    }

    /// Whether a refresh exchange is currently pending.
    pub fn is_refreshing(&self) -> bool {
        self.inner.lock_slot().in_flight.is_some()
    }

    /// Detach any in-flight refresh. Its result is still delivered to the
    /// callers already waiting on it, but it will not write to the store.
    pub fn reset(&self) {
        let mut slot = self.inner.lock_slot();
        slot.epoch = slot.epoch.wrapping_add(1);
        if slot.in_flight.take().is_some() {
            debug!("Detached in-flight refresh");
        }
    }

    fn join_or_start(&self) -> SharedRefresh {
        let mut slot = self.inner.lock_slot();

        if let Some(in_flight) = &slot.in_flight {
            debug!("Joining in-flight refresh");
            return in_flight.clone();
        }

        let epoch = slot.epoch;
        let inner = Arc::clone(&self.inner);
        let refresh = async move {
            let result = inner.refresh(epoch).await;
            inner.finish(epoch);
            result
        }
        .boxed()
        .shared();

        slot.in_flight = Some(refresh.clone());
        refresh
    }
}

impl Inner {
    fn lock_slot(&self) -> MutexGuard<'_, RefreshSlot> {
        // Never held across an await; the slot is valid even if a holder
        // panicked.
        self.slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn is_current(&self, epoch: u64) -> bool {
        self.lock_slot().epoch == epoch
    }

    fn finish(&self, epoch: u64) {
        let mut slot = self.lock_slot();
        if slot.epoch == epoch {
            slot.in_flight = None;
        }
    }

    fn emit(&self, event: AuthEvent) {
        let _ = self.event_bus.emit(CoreEvent::Auth(event));
    }

    async fn refresh(&self, epoch: u64) -> Result<String> {
        let session = self
            .token_store
            .load()
            .await?
            .ok_or(AuthError::NotAuthenticated)?;

        if !session.needs_refresh(self.clock.now(), self.margin) {
            debug!("Session was refreshed concurrently");
            return Ok(session.access_token);
        }

        self.emit(AuthEvent::TokenRefreshing);

        let tokens = match self.oauth.refresh(&session.refresh_token).await {
            Ok(tokens) => tokens,
            Err(AuthError::ReauthenticationRequired) => {
                if self.is_current(epoch) {
                    if let Err(e) = self.token_store.clear().await {
                        error!(error = %e, "Failed to clear rejected session");
                    }
                    self.emit(AuthEvent::ReauthenticationRequired);
                }
                return Err(AuthError::ReauthenticationRequired);
            }
            Err(e) => {
                self.emit(AuthEvent::AuthError {
                    message: e.to_string(),
                    recoverable: true,
                });
                return Err(e);
            }
        };

        let updated = session.apply_refresh(tokens, self.clock.now())?;

        if !self.is_current(epoch) {
            warn!("Session was reset during refresh, discarding new token");
            return Err(AuthError::NotAuthenticated);
        }

        self.token_store.save(&updated).await?;

        info!(expires_at = %updated.expires_at, "Access token refreshed");
        self.emit(AuthEvent::TokenRefreshed {
            expires_at: updated.expires_at.timestamp(),
        });

        Ok(updated.access_token)
    }
}
