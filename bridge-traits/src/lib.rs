//! # Host Bridge Traits
//!
//! Platform abstraction traits that must be implemented by each host of the
//! gateway console session core.
//!
//! ## Overview
//!
//! This crate defines the contract between the session core and the
//! environment it runs in. The core never talks to the network, the clock or
//! persistent storage directly; it goes through the traits below so that each
//! host (desktop shell, test harness, browser shim) can supply its own
//! implementation.
//!
//! ## Traits
//!
//! - [`HttpClient`](http::HttpClient) - Async HTTP operations against the
//!   identity provider and the gateway backend
//! - [`SecureStore`](storage::SecureStore) - Client-side persistence for the
//!   session and the pending authorization
//! - [`Clock`](time::Clock) - Time source for deterministic expiry checks
//! - [`LoggerSink`](time::LoggerSink) - Forward structured logs to host logging
//!
//! ## Platform Requirements
//!
//! | Platform | Implementation Crate | Status |
//! |----------|---------------------|--------|
//! | Desktop  | `bridge-desktop`    | ✅ Available |
//! | Browser  | TBD                 | 📋 Planned |
//!
//! ## Error Handling
//!
//! All bridge traits use the [`BridgeError`](error::BridgeError) type. Platform
//! implementations should convert their native errors into it and keep the
//! message actionable. Secret values must never appear in error messages.
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync` so that implementations can be shared
//! across async tasks behind an `Arc`.

pub mod error;
pub mod http;
pub mod storage;
pub mod time;

pub use error::BridgeError;

// Re-export commonly used types
pub use http::{HttpClient, HttpMethod, HttpRequest, HttpResponse, RetryPolicy};
pub use storage::SecureStore;
pub use time::{Clock, ConsoleLogger, LogEntry, LogLevel, LoggerSink, SystemClock};
