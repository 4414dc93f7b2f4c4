//! Gateway console session core.
//!
//! Facade over the workspace crates so a host can depend on
//! `gateway-console` alone:
//!
//! - [`auth`]: sign-in, token refresh and the session accessor (`core-auth`)
//! - [`runtime`]: configuration, events and logging (`core-runtime`)
//! - [`bridge`]: host abstraction traits (`bridge-traits`)
//! - [`desktop`]: reqwest and file/keyring backed bridges, with the
//!   `desktop-shims` feature
//! - [`api_keys`]: hashing and display helpers for gateway API keys

pub mod api_keys;

pub use bridge_traits as bridge;
pub use core_auth as auth;
pub use core_runtime as runtime;

#[cfg(feature = "desktop-shims")]
pub use bridge_desktop as desktop;

pub use core_auth::{AuthError, AuthManager, CallbackOutcome, SessionAccessor};
pub use core_runtime::config::CoreConfig;
