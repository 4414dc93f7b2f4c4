//! Client-side Storage Abstraction
//!
//! Provides the platform-agnostic trait used to persist the authenticated
//! session between restarts of the host.

use async_trait::async_trait;

use crate::error::Result;

/// Secure credential storage trait
///
/// Abstracts the storage that holds session material:
/// - Desktop: a private JSON file under the user's data directory, or the OS
///   keychain
/// - Browser: `localStorage` scoped to the console's origin
/// - Tests: an in-memory map
///
/// # Requirements
///
/// Implementations MUST:
/// - Make `set_secret` replace the previous value in a single step, so a
///   reader never observes a half-written value
/// - Survive restarts of the host within the same user profile
/// - Never log or expose stored values
///
/// # Example
///
/// ```ignore
/// use bridge_traits::storage::SecureStore;
///
/// async fn remember(store: &dyn SecureStore, session_json: &[u8]) -> Result<()> {
///     store.set_secret("gateway_console:session", session_json).await?;
///     Ok(())
/// }
/// ```
#[async_trait]
pub trait SecureStore: Send + Sync {
    /// Store a secret value, replacing any previous value for `key`.
    async fn set_secret(&self, key: &str, value: &[u8]) -> Result<()>;

    /// Retrieve a secret value
    ///
    /// Returns `Ok(None)` if the key doesn't exist.
    async fn get_secret(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Delete a secret. Deleting a missing key succeeds.
    async fn delete_secret(&self, key: &str) -> Result<()>;

    /// Check if a secret exists without retrieving it
    async fn has_secret(&self, key: &str) -> Result<bool> {
        Ok(self.get_secret(key).await?.is_some())
    }

    /// List all secret keys (without values)
    async fn list_keys(&self) -> Result<Vec<String>>;

    /// Clear all secrets
    async fn clear_all(&self) -> Result<()>;
}
