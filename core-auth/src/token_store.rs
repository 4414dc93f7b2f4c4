//! Session Persistence
//!
//! Persists the console session, and the pending authorization that bridges
//! the redirect to the identity provider, through the `SecureStore` bridge.
//!
//! ## Storage layout
//!
//! | Key                                  | Value                           |
//! |--------------------------------------|---------------------------------|
//! | `{namespace}:session`                | JSON [`Session`]                |
//! | `{namespace}:pending_authorization`  | JSON [`PendingAuthorization`]   |
//!
//! Each record is one document written with one `set_secret` call, so a
//! reader never observes a partially updated session.
//!
//! ## Example
//!
//! ```no_run
//! use core_auth::TokenStore;
//! use std::sync::Arc;
//! # use bridge_traits::storage::SecureStore;
//! # async fn example(secure_store: Arc<dyn SecureStore>, session: core_auth::Session) -> core_auth::Result<()> {
//! let store = TokenStore::new(secure_store, "gateway_console");
//!
//! store.save(&session).await?;
//! assert!(store.load().await?.is_some());
//! store.clear().await?;
//! # Ok(())
//! # }
//! ```

use crate::error::{AuthError, Result};
use crate::types::{PendingAuthorization, Session};
use bridge_traits::storage::SecureStore;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

const SESSION_RECORD: &str = "session";
const PENDING_RECORD: &str = "pending_authorization";

/// Secure storage for the console session.
///
/// Token values are never logged. Corrupted records are deleted on read and
/// reported as [`AuthError::TokenCorrupted`].
#[derive(Clone)]
pub struct TokenStore {
    secure_store: Arc<dyn SecureStore>,
    session_key: String,
    pending_key: String,
}

impl TokenStore {
    pub fn new(secure_store: Arc<dyn SecureStore>, namespace: &str) -> Self {
        debug!(namespace, "Initializing TokenStore");
        Self {
            secure_store,
            session_key: format!("{}:{}", namespace, SESSION_RECORD),
            pending_key: format!("{}:{}", namespace, PENDING_RECORD),
        }
    }

    pub fn session_key(&self) -> &str {
        &self.session_key
    }

    pub fn pending_key(&self) -> &str {
        &self.pending_key
    }

    /// Persist the session, replacing any previous one.
    ///
    /// # Errors
    ///
    /// - [`AuthError::IncompleteSession`] if any token is empty; nothing is
    ///   written
    /// - [`AuthError::SecureStorageUnavailable`] if the write fails
    pub async fn save(&self, session: &Session) -> Result<()> {
        if let Some(field) = session.missing_field() {
            warn!(field, "Refusing to persist incomplete session");
            return Err(AuthError::IncompleteSession(field));
        }

        self.write(&self.session_key, session).await?;

        info!(expires_at = %session.expires_at, "Session stored");
        Ok(())
    }

    /// Load the persisted session.
    ///
    /// Returns `Ok(None)` when no session is stored.
    pub async fn load(&self) -> Result<Option<Session>> {
        let session: Option<Session> = self.read(&self.session_key).await?;

        match session {
            Some(session) => match session.missing_field() {
                None => Ok(Some(session)),
                Some(field) => {
                    self.discard_corrupted(&self.session_key).await;
                    Err(AuthError::TokenCorrupted(format!(
                        "stored session has an empty {}",
                        field
                    )))
                }
            },
            None => Ok(None),
        }
    }

    /// Remove the session. Succeeds when no session is stored.
    pub async fn clear(&self) -> Result<()> {
        self.delete(&self.session_key).await?;
        info!("Session cleared");
        Ok(())
    }

    pub async fn save_pending(&self, pending: &PendingAuthorization) -> Result<()> {
        self.write(&self.pending_key, pending).await?;
        debug!("Pending authorization stored");
        Ok(())
    }

    /// Load and delete the pending authorization in one step, so a given
    /// state value can be verified at most once.
    pub async fn take_pending(&self) -> Result<Option<PendingAuthorization>> {
        let pending = self.read(&self.pending_key).await?;
        if pending.is_some() {
            self.delete(&self.pending_key).await?;
        }
        Ok(pending)
    }

    pub async fn clear_pending(&self) -> Result<()> {
        self.delete(&self.pending_key).await
    }

    async fn write<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        let json = serde_json::to_vec(value).map_err(|e| {
            AuthError::SecureStorageUnavailable(format!("failed to serialize {}: {}", key, e))
        })?;

        self.secure_store.set_secret(key, &json).await.map_err(|e| {
            warn!(key, error = %e, "Failed to write to secure storage");
            AuthError::SecureStorageUnavailable(e.to_string())
        })
    }

    async fn read<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let data = self.secure_store.get_secret(key).await.map_err(|e| {
            warn!(key, error = %e, "Failed to read from secure storage");
            AuthError::SecureStorageUnavailable(e.to_string())
        })?;

        let Some(data) = data else {
            return Ok(None);
        };

        match serde_json::from_slice(&data) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                warn!(key, error = %e, "Failed to deserialize record, it may be corrupted");
                self.discard_corrupted(key).await;
                Err(AuthError::TokenCorrupted(e.to_string()))
            }
        }
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.secure_store.delete_secret(key).await.map_err(|e| {
            warn!(key, error = %e, "Failed to delete from secure storage");
            AuthError::SecureStorageUnavailable(e.to_string())
        })
    }

    async fn discard_corrupted(&self, key: &str) {
        if let Err(e) = self.secure_store.delete_secret(key).await {
            warn!(key, error = %e, "Failed to delete corrupted record");
        }
    }
}
