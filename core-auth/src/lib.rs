//! # Session Core
//!
//! OAuth 2.0 Authorization Code (PKCE) sign-in and token lifecycle for the
//! gateway console.
//!
//! ## Overview
//!
//! Components, leaves first:
//!
//! - [`TokenStore`] - persists the session as one document in the host's
//!   secure store
//! - [`TokenRefresher`] - returns a valid access token, running at most one
//!   refresh exchange at a time
//! - [`CallbackHandler`] - turns the provider redirect into a session,
//!   exchanging each authorization code at most once
//! - [`SessionAccessor`] - what API-calling code uses to get a bearer token
//!
//! [`AuthManager`] wires them together and adds sign-in initiation and
//! sign-out. Auth transitions are published as
//! [`AuthEvent`](core_runtime::events::AuthEvent)s.
//!
//! ## Security
//!
//! - `state` is generated before the redirect and verified on return
//! - Token-endpoint requests are never retried automatically
//! - Token values never reach logs; `Debug` output is redacted

pub mod accessor;
pub mod callback;
pub mod error;
pub mod manager;
pub mod oauth;
pub mod refresher;
pub mod token_store;
pub mod types;

#[cfg(test)]
mod test_support;

pub use accessor::SessionAccessor;
pub use callback::CallbackHandler;
pub use error::{AuthError, Result};
pub use manager::AuthManager;
pub use oauth::{OAuthClient, OAuthConfig, PkceVerifier};
pub use refresher::TokenRefresher;
pub use token_store::TokenStore;
pub use types::{CallbackOutcome, CallbackRequest, PendingAuthorization, Session, TokenResponse};
