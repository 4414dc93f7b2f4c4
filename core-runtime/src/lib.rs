//! # Core Runtime Module
//!
//! Provides foundational runtime infrastructure for the gateway console's
//! session core:
//! - Logging and tracing infrastructure
//! - Configuration management (injected bridges plus session settings)
//! - Event bus system for authentication state changes
//!
//! ## Overview
//!
//! `core-auth` depends on this crate for its configuration and for
//! broadcasting sign-in, refresh and sign-out events to whatever renders
//! them.

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use error::{Error, Result};
