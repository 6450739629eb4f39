//! Transport layer.
//!
//! The bridge never touches a global message bus directly. It talks to an
//! injected [`Transport`] (post a message, subscribe to raw inbound
//! messages) and learns whether it is embedded through a [`Frame`].
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐                              ┌─────────────────┐
//! │  Host page      │                              │  Mini-app frame │
//! │                 │     post_message / subscribe │                 │
//! │  Bridge (host)  │◄────────────────────────────►│  Bridge (app)   │
//! │                 │   unordered, unauthenticated │  MiniApp        │
//! └─────────────────┘                              └─────────────────┘
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `memory` | In-process linked port pair, used in tests and demos |

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::error::Result;

// ============================================================================
// Submodules
// ============================================================================

/// In-memory transport.
pub mod memory;

// ============================================================================
// Re-exports
// ============================================================================

pub use memory::{MemoryChannel, MemoryPort};

// ============================================================================
// Types
// ============================================================================

/// Callback receiving every raw inbound message.
pub type RawListener = Arc<dyn Fn(&RawMessage) + Send + Sync>;

/// A message as the transport delivers it, before any validation.
#[derive(Debug, Clone, PartialEq)]
pub struct RawMessage {
    /// Origin of the sending context, as reported by the transport.
    pub origin: String,
    /// Message body. Anything may arrive here.
    pub data: Value,
}

impl RawMessage {
    /// Creates a raw message.
    #[inline]
    #[must_use]
    pub fn new(origin: impl Into<String>, data: Value) -> Self {
        Self {
            origin: origin.into(),
            data,
        }
    }
}

// ============================================================================
// Transport
// ============================================================================

/// Bidirectional, fire-and-forget channel to one remote context.
pub trait Transport: Send + Sync {
    /// Posts `message` to the remote context.
    ///
    /// `target_origin` restricts delivery; `"*"` delivers regardless of the
    /// remote origin. Delivery is not acknowledged.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Transport`](crate::Error::Transport) if the remote
    /// context is unreachable.
    fn post_message(&self, message: Value, target_origin: &str) -> Result<()>;

    /// Subscribes to raw inbound messages.
    ///
    /// The listener stays attached until the returned [`Subscription`] is
    /// cancelled or dropped.
    fn subscribe(&self, listener: RawListener) -> Subscription;
}

// ============================================================================
// Frame
// ============================================================================

/// The local execution context.
pub trait Frame: Send + Sync {
    /// Returns a transport bound to the parent context, or `None` when the
    /// local context is top-level.
    fn parent(&self) -> Option<Arc<dyn Transport>>;
}

/// A top-level context with no parent.
#[derive(Debug, Clone, Copy, Default)]
pub struct TopLevel;

impl Frame for TopLevel {
    fn parent(&self) -> Option<Arc<dyn Transport>> {
        None
    }
}

// ============================================================================
// Subscription
// ============================================================================

/// Detaches a transport listener when cancelled or dropped.
pub struct Subscription {
    /// Pending unsubscribe action.
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    /// Creates a subscription that runs `cancel` once.
    #[must_use]
    pub fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    /// Detaches the listener. Safe to call more than once.
    pub fn cancel(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }

    /// Returns `true` while the listener is still attached.
    #[inline]
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.cancel.is_some()
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.is_active())
            .finish()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel();
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_subscription_cancels_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);

        let mut subscription = Subscription::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        assert!(subscription.is_active());

        subscription.cancel();
        subscription.cancel();
        drop(subscription);

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_subscription_cancels_on_drop() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);

        drop(Subscription::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_top_level_has_no_parent() {
        assert!(TopLevel.parent().is_none());
    }
}
