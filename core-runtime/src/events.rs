//! # Event Bus System
//!
//! Broadcasts authentication state changes using `tokio::sync::broadcast`.
//!
//! ## Overview
//!
//! The session core never renders anything itself. Sign-in progress, refresh
//! activity and failures are published as [`CoreEvent`]s and whatever drives
//! the console (a router, a status bar, a CLI) subscribes and reacts.
//!
//! ```text
//! ┌─────────────────┐     emit      ┌───────────┐     subscribe    ┌────────────┐
//! │ CallbackHandler ├──────────────>│           ├─────────────────>│   Router   │
//! └─────────────────┘               │ EventBus  │                  └────────────┘
//! ┌─────────────────┐     emit      │ (broadcast│     subscribe    ┌────────────┐
//! │ TokenRefresher  ├──────────────>│  channel) ├─────────────────>│ Status bar │
//! └─────────────────┘               └───────────┘                  └────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use core_runtime::events::{AuthEvent, CoreEvent, EventBus};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let event_bus = EventBus::new(16);
//! let mut subscriber = event_bus.subscribe();
//!
//! event_bus.emit(CoreEvent::Auth(AuthEvent::SignedOut)).ok();
//!
//! let event = subscriber.recv().await.unwrap();
//! assert_eq!(event, CoreEvent::Auth(AuthEvent::SignedOut));
//! # }
//! ```
//!
//! ## Error Handling
//!
//! - **`RecvError::Lagged(n)`**: the subscriber missed `n` events; keep reading.
//! - **`RecvError::Closed`**: every sender was dropped; treat as shutdown.
//!
//! Emitting with no subscribers returns `Err(SendError)`. Publishers in the
//! session core ignore that result.

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;

pub use tokio::sync::broadcast::error::{RecvError, SendError};
pub use tokio::sync::broadcast::Receiver;

/// Default buffer size for the event bus channel.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 64;

// ============================================================================
// Core Event Types
// ============================================================================

/// Top-level event enum published through the event bus.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "payload")]
pub enum CoreEvent {
    /// Authentication-related events
    Auth(AuthEvent),
}

impl CoreEvent {
    /// Returns a human-readable description of the event.
    pub fn description(&self) -> &str {
        match self {
            CoreEvent::Auth(e) => e.description(),
        }
    }

    /// Returns the severity level of the event.
    pub fn severity(&self) -> EventSeverity {
        match self {
            CoreEvent::Auth(AuthEvent::AuthError { .. }) => EventSeverity::Error,
            CoreEvent::Auth(AuthEvent::ReauthenticationRequired) => EventSeverity::Warning,
            CoreEvent::Auth(AuthEvent::SignedIn { .. } | AuthEvent::SignedOut) => {
                EventSeverity::Info
            }
            _ => EventSeverity::Debug,
        }
    }
}

/// Event severity levels for filtering and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventSeverity {
    Debug,
    Info,
    Warning,
    Error,
}

// ============================================================================
// Authentication Events
// ============================================================================

/// Events describing the lifecycle of the console session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum AuthEvent {
    /// An authorization request was prepared; the host should navigate to
    /// the provider's authorize URL.
    SigningIn,
    /// A code exchange succeeded and the session was persisted.
    SignedIn {
        /// Access token expiry (Unix epoch seconds).
        expires_at: i64,
    },
    /// An access token refresh started.
    TokenRefreshing,
    /// A refresh completed and the new token was persisted.
    TokenRefreshed {
        /// New access token expiry (Unix epoch seconds).
        expires_at: i64,
    },
    /// The session was cleared by the user.
    SignedOut,
    /// The provider rejected the refresh token; the session was cleared and
    /// the user must sign in again.
    ReauthenticationRequired,
    /// A sign-in or refresh attempt failed.
    AuthError {
        /// Human-readable error message.
        message: String,
        /// Whether retrying the same operation may succeed.
        recoverable: bool,
    },
}

impl AuthEvent {
    fn description(&self) -> &str {
        match self {
            AuthEvent::SigningIn => "Authentication in progress",
            AuthEvent::SignedIn { .. } => "User signed in successfully",
            AuthEvent::TokenRefreshing => "Refreshing access token",
            AuthEvent::TokenRefreshed { .. } => "Token refreshed successfully",
            AuthEvent::SignedOut => "User signed out",
            AuthEvent::ReauthenticationRequired => "Sign-in required",
            AuthEvent::AuthError { .. } => "Authentication error",
        }
    }
}

// ============================================================================
// Event Bus
// ============================================================================

/// Central broadcast channel for [`CoreEvent`]s.
///
/// Cloning the bus clones the sender; all clones publish into the same
/// channel.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    /// Creates a new event bus buffering at most `capacity` events per
    /// subscriber. A zero capacity is raised to one.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publishes an event to all subscribers.
    ///
    /// Returns the number of subscribers that received the event, or an
    /// error if there are none.
    pub fn emit(&self, event: CoreEvent) -> Result<usize, SendError<CoreEvent>> {
        self.sender.send(event)
    }

    /// Creates a new subscriber. Past events are not replayed.
    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_event_bus_creation() {
        let bus = EventBus::new(10);
        assert_eq!(bus.subscriber_count(), 0);

        let _sub = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 1);
    }

    #[tokio::test]
    async fn test_event_emission_no_subscribers() {
        let bus = EventBus::default();
        assert!(bus.emit(CoreEvent::Auth(AuthEvent::SigningIn)).is_err());
    }

    #[tokio::test]
    async fn test_multiple_subscribers_receive_same_event() {
        let bus = EventBus::new(10);
        let mut sub1 = bus.subscribe();
        let mut sub2 = bus.subscribe();

        let event = CoreEvent::Auth(AuthEvent::SignedIn {
            expires_at: 1_700_000_000,
        });
        assert_eq!(bus.emit(event.clone()).unwrap(), 2);

        assert_eq!(sub1.recv().await.unwrap(), event);
        assert_eq!(sub2.recv().await.unwrap(), event);
    }

    #[tokio::test]
    async fn test_lagged_subscriber() {
        let bus = EventBus::new(2);
        let mut sub = bus.subscribe();

        for i in 0..5 {
            bus.emit(CoreEvent::Auth(AuthEvent::TokenRefreshed {
                expires_at: 1_700_000_000 + i,
            }))
            .ok();
        }

        assert!(matches!(sub.recv().await, Err(RecvError::Lagged(_))));
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        let bus = EventBus::new(0);
        let _sub = bus.subscribe();
        assert!(bus.emit(CoreEvent::Auth(AuthEvent::SignedOut)).is_ok());
    }

    #[test]
    fn test_event_severity() {
        let error_event = CoreEvent::Auth(AuthEvent::AuthError {
            message: "Token exchange failed".to_string(),
            recoverable: true,
        });
        assert_eq!(error_event.severity(), EventSeverity::Error);
        assert_eq!(
            CoreEvent::Auth(AuthEvent::ReauthenticationRequired).severity(),
            EventSeverity::Warning
        );
        assert_eq!(
            CoreEvent::Auth(AuthEvent::SignedOut).severity(),
            EventSeverity::Info
        );
        assert_eq!(
            CoreEvent::Auth(AuthEvent::TokenRefreshing).severity(),
            EventSeverity::Debug
        );
    }

    #[test]
    fn test_event_description() {
        let event = CoreEvent::Auth(AuthEvent::SignedIn { expires_at: 0 });
        assert_eq!(event.description(), "User signed in successfully");
    }

    #[test]
    fn test_event_serialization() {
        let event = CoreEvent::Auth(AuthEvent::AuthError {
            message: "state mismatch".to_string(),
            recoverable: false,
        });

        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""type":"Auth""#));
        assert!(json.contains(r#""event":"AuthError""#));

        let deserialized: CoreEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized, event);
    }
}
