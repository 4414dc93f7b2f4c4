//! # Desktop Bridge Implementations
//!
//! Default implementations of bridge traits for desktop hosts
//! (macOS, Windows, Linux).
//!
//! ## Overview
//!
//! - `HttpClient` using `reqwest`
//! - `SecureStore` backed by a private JSON file under the user's data
//!   directory (`FileSecureStore`)
//! - `SecureStore` backed by the OS keychain (`KeyringSecureStore`, behind
//!   the `keyring-store` feature)
//!
//! ## Feature Flags
//!
//! - `keyring-store`: Enable OS keychain integration
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_desktop::{FileSecureStore, ReqwestHttpClient};
//!
//! #[tokio::main]
//! async fn main() {
//!     let http_client = ReqwestHttpClient::new();
//!     let store = FileSecureStore::new();
//!
//!     // Hand both to CoreConfig::builder()
//! }
//! ```

mod file_store;
mod http;

#[cfg(feature = "keyring-store")]
mod secure_store;

pub use file_store::FileSecureStore;
pub use http::ReqwestHttpClient;

#[cfg(feature = "keyring-store")]
pub use secure_store::KeyringSecureStore;
