//! # Core Configuration Module
//!
//! Holds the injected bridges and the session settings the auth core runs
//! with.
//!
//! ## Overview
//!
//! `CoreConfig` is built with [`CoreConfigBuilder`], which enforces
//! fail-fast validation: every bridge must be provided, or the
//! `desktop-shims` feature must be enabled so desktop defaults can be
//! injected.
//!
//! ## Dependencies
//!
//! - `HttpClient` - token endpoint calls (desktop default: reqwest)
//! - `SecureStore` - session persistence (desktop default: JSON file under
//!   the user's data directory)
//! - `Clock` - expiry decisions (default: system clock, always available)
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::CoreConfig;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! let config = CoreConfig::builder()
//!     .http_client(Arc::new(MyHttpClient))
//!     .secure_store(Arc::new(MySecureStore))
//!     .refresh_margin(Duration::from_secs(120))
//!     .build()?;
//! ```

use crate::error::{Error, Result};
use crate::events::DEFAULT_EVENT_BUFFER_SIZE;
use bridge_traits::{Clock, HttpClient, SecureStore, SystemClock};
use std::sync::Arc;
use std::time::Duration;

/// Refresh when the access token expires within this window.
pub const DEFAULT_REFRESH_MARGIN: Duration = Duration::from_secs(60);

/// Upper bound on a single token-endpoint exchange.
pub const DEFAULT_EXCHANGE_TIMEOUT: Duration = Duration::from_secs(30);

/// Prefix for every key the session core writes to the secure store.
pub const DEFAULT_STORAGE_NAMESPACE: &str = "gateway_console";

/// Core configuration for the session core.
#[derive(Clone)]
pub struct CoreConfig {
    pub http_client: Arc<dyn HttpClient>,

    pub secure_store: Arc<dyn SecureStore>,

    pub clock: Arc<dyn Clock>,

    /// Refresh the access token once it is within this window of expiry
    pub refresh_margin: Duration,

    /// Timeout applied to every code and refresh exchange
    pub exchange_timeout: Duration,

    /// Secure store key prefix (`"{namespace}:session"`)
    pub storage_namespace: String,

    /// Per-subscriber buffer of the auth event bus
    pub event_buffer_size: usize,
}

impl std::fmt::Debug for CoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreConfig")
            .field("http_client", &"HttpClient { ... }")
            .field("secure_store", &"SecureStore { ... }")
            .field("clock", &"Clock { ... }")
            .field("refresh_margin", &self.refresh_margin)
            .field("exchange_timeout", &self.exchange_timeout)
            .field("storage_namespace", &self.storage_namespace)
            .field("event_buffer_size", &self.event_buffer_size)
            .finish()
    }
}

impl CoreConfig {
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::default()
    }

    /// Validates the configuration.
    ///
    /// This checks:
    /// - The storage namespace is non-empty and contains no `:` separator
    /// - The exchange timeout is non-zero
    /// - The refresh margin is shorter than one hour
    /// - The event buffer holds at least one event
    pub fn validate(&self) -> Result<()> {
        if self.storage_namespace.trim().is_empty() {
            return Err(Error::Config(
                "Storage namespace cannot be empty".to_string(),
            ));
        }

        if self.storage_namespace.contains(':') {
            return Err(Error::Config(format!(
                "Storage namespace '{}' must not contain ':'",
                self.storage_namespace
            )));
        }

        if self.exchange_timeout.is_zero() {
            return Err(Error::Config(
                "Exchange timeout must be greater than zero".to_string(),
            ));
        }

        if self.refresh_margin >= Duration::from_secs(3600) {
            return Err(Error::Config(
                "Refresh margin must be shorter than one hour; \
                 otherwise every access token would be refreshed immediately"
                    .to_string(),
            ));
        }

        if self.event_buffer_size == 0 {
            return Err(Error::Config(
                "Event buffer size must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }

    /// Secure store key for a record owned by the session core.
    pub fn storage_key(&self, record: &str) -> String {
        format!("{}:{}", self.storage_namespace, record)
    }
}

#[cfg(not(feature = "desktop-shims"))]
fn http_client_missing_error() -> Error {
    Error::CapabilityMissing {
        capability: "HttpClient".to_string(),
        message: "HttpClient implementation is required to reach the token endpoint. \
                 Desktop: enable the 'desktop-shims' feature to use the default ReqwestHttpClient. \
                 Other hosts: inject a client backed by the platform's HTTP stack."
            .to_string(),
    }
}

#[cfg(not(feature = "desktop-shims"))]
fn secure_store_missing_error() -> Error {
    Error::CapabilityMissing {
        capability: "SecureStore".to_string(),
        message: "SecureStore implementation is required for session persistence. \
                 Desktop: enable the 'desktop-shims' feature to use the default FileSecureStore. \
                 Browser: inject a localStorage-backed store."
            .to_string(),
    }
}

#[cfg(feature = "desktop-shims")]
fn provide_default_http_client() -> Result<Arc<dyn HttpClient>> {
    use bridge_desktop::ReqwestHttpClient;

    let client: Arc<dyn HttpClient> = Arc::new(ReqwestHttpClient::new());
    Ok(client)
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_http_client() -> Result<Arc<dyn HttpClient>> {
    Err(http_client_missing_error())
}

#[cfg(feature = "desktop-shims")]
fn provide_default_secure_store() -> Result<Arc<dyn SecureStore>> {
    use bridge_desktop::FileSecureStore;

    let store: Arc<dyn SecureStore> = Arc::new(FileSecureStore::new());
    Ok(store)
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_secure_store() -> Result<Arc<dyn SecureStore>> {
    Err(secure_store_missing_error())
}

/// Builder for constructing [`CoreConfig`] instances.
#[derive(Default)]
pub struct CoreConfigBuilder {
    http_client: Option<Arc<dyn HttpClient>>,
    secure_store: Option<Arc<dyn SecureStore>>,
    clock: Option<Arc<dyn Clock>>,
    refresh_margin: Option<Duration>,
    exchange_timeout: Option<Duration>,
    storage_namespace: Option<String>,
    event_buffer_size: Option<usize>,
}

impl CoreConfigBuilder {
    pub fn http_client(mut self, client: Arc<dyn HttpClient>) -> Self {
        self.http_client = Some(client);
        self
    }

    pub fn secure_store(mut self, store: Arc<dyn SecureStore>) -> Self {
        self.secure_store = Some(store);
        self
    }

    /// Override the time source (tests pin "now" with a fixed clock).
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn refresh_margin(mut self, margin: Duration) -> Self {
        self.refresh_margin = Some(margin);
        self
    }

    pub fn exchange_timeout(mut self, timeout: Duration) -> Self {
        self.exchange_timeout = Some(timeout);
        self
    }

    pub fn storage_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.storage_namespace = Some(namespace.into());
        self
    }

    pub fn event_buffer_size(mut self, size: usize) -> Self {
        self.event_buffer_size = Some(size);
        self
    }

    /// Builds and validates the configuration.
    ///
    /// # Errors
    ///
    /// - [`Error::CapabilityMissing`] when a bridge is absent and no desktop
    ///   default is compiled in
    /// - [`Error::Config`] when a setting fails [`CoreConfig::validate`]
    pub fn build(self) -> Result<CoreConfig> {
        let http_client = match self.http_client {
            Some(client) => client,
            None => provide_default_http_client()?,
        };

        let secure_store = match self.secure_store {
            Some(store) => store,
            None => provide_default_secure_store()?,
        };

        let config = CoreConfig {
            http_client,
            secure_store,
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
            refresh_margin: self.refresh_margin.unwrap_or(DEFAULT_REFRESH_MARGIN),
            exchange_timeout: self.exchange_timeout.unwrap_or(DEFAULT_EXCHANGE_TIMEOUT),
            storage_namespace: self
                .storage_namespace
                .unwrap_or_else(|| DEFAULT_STORAGE_NAMESPACE.to_string()),
            event_buffer_size: self.event_buffer_size.unwrap_or(DEFAULT_EVENT_BUFFER_SIZE),
        };

        config.validate()?;

        Ok(config)
    }
}
