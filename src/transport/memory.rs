//! In-memory transport.
//!
//! [`MemoryChannel`] links two [`MemoryPort`]s, one for the host page and
//! one for the embedded mini-app. It behaves like a window message channel
//! reduced to what the bridge relies on:
//!
//! - messages carry the sender's origin
//! - a non-wildcard `target_origin` that does not match the receiver drops
//!   the message silently
//! - delivery is synchronous, in subscription order
//!
//! # Example
//!
//! ```ignore
//! let channel = MemoryChannel::new("https://exode.ru", "https://quiz.exode.ru");
//! let host = channel.host();
//! let app = channel.app();
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use serde_json::Value;
use tracing::trace;

use crate::error::{Error, Result};
use crate::protocol::WILDCARD_ORIGIN;

use super::{Frame, RawListener, RawMessage, Subscription, Transport};

// ============================================================================
// Constants
// ============================================================================

/// Index of the host end.
const HOST: usize = 0;

/// Index of the mini-app end.
const APP: usize = 1;

// ============================================================================
// Types
// ============================================================================

/// One end of the channel.
struct End {
    /// Origin this end sends from.
    origin: String,
    /// Listeners in subscription order.
    listeners: Mutex<Vec<(u64, RawListener)>>,
}

/// State shared by both ports.
struct ChannelInner {
    /// Host and app ends.
    ends: [End; 2],
    /// Set once the channel is closed.
    closed: AtomicBool,
    /// Source of listener keys.
    next_listener: AtomicU64,
}

// ============================================================================
// MemoryChannel
// ============================================================================

/// A linked host/mini-app port pair.
#[derive(Clone)]
pub struct MemoryChannel {
    /// Shared channel state.
    inner: Arc<ChannelInner>,
}

impl MemoryChannel {
    /// Creates a channel between a host at `host_origin` and a mini-app at
    /// `app_origin`.
    #[must_use]
    pub fn new(host_origin: impl Into<String>, app_origin: impl Into<String>) -> Self {
        let end = |origin: String| End {
            origin,
            listeners: Mutex::new(Vec::new()),
        };

        Self {
            inner: Arc::new(ChannelInner {
                ends: [end(host_origin.into()), end(app_origin.into())],
                closed: AtomicBool::new(false),
                next_listener: AtomicU64::new(1),
            }),
        }
    }

    /// Returns the host-side port (a top-level frame).
    #[inline]
    #[must_use]
    pub fn host(&self) -> MemoryPort {
        MemoryPort {
            inner: Arc::clone(&self.inner),
            side: HOST,
        }
    }

    /// Returns the mini-app-side port (a frame whose parent is the host).
    #[inline]
    #[must_use]
    pub fn app(&self) -> MemoryPort {
        MemoryPort {
            inner: Arc::clone(&self.inner),
            side: APP,
        }
    }

    /// Closes the channel. Further posts fail with a transport error.
    pub fn close(&self) {
        self.inner.closed.store(true, Ordering::SeqCst);
    }
}

// ============================================================================
// MemoryPort
// ============================================================================

/// One side of a [`MemoryChannel`].
#[derive(Clone)]
pub struct MemoryPort {
    /// Shared channel state.
    inner: Arc<ChannelInner>,
    /// Which end this port is.
    side: usize,
}

impl MemoryPort {
    /// Returns the origin this port sends from.
    #[inline]
    #[must_use]
    pub fn origin(&self) -> &str {
        &self.inner.ends[self.side].origin
    }

    /// Returns the number of attached listeners on this port.
    #[inline]
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.inner.ends[self.side].listeners.lock().len()
    }

    /// Delivers an arbitrary raw message to this port's listeners, as if it
    /// had arrived from `origin`.
    pub fn deliver(&self, origin: impl Into<String>, data: Value) {
        let message = RawMessage::new(origin, data);
        Self::dispatch(&self.inner.ends[self.side], &message);
    }

    /// Calls every listener of `end` with `message`.
    fn dispatch(end: &End, message: &RawMessage) {
        let listeners: Vec<RawListener> = end
            .listeners
            .lock()
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();

        for listener in listeners {
            listener(message);
        }
    }

    /// Removes the listener registered under `key` from end `side`.
    fn unsubscribe(inner: &Weak<ChannelInner>, side: usize, key: u64) {
        if let Some(inner) = inner.upgrade() {
            inner.ends[side]
                .listeners
                .lock()
                .retain(|(existing, _)| *existing != key);
        }
    }
}

// ============================================================================
// MemoryPort - Transport
// ============================================================================

impl Transport for MemoryPort {
    fn post_message(&self, message: Value, target_origin: &str) -> Result<()> {
        if self.inner.closed.load(Ordering::SeqCst) {
            return Err(Error::transport("memory channel is closed"));
        }

        let peer = &self.inner.ends[1 - self.side];
        if target_origin != WILDCARD_ORIGIN && target_origin != peer.origin {
            trace!(
                target_origin,
                peer_origin = %peer.origin,
                "Message dropped: target origin does not match receiver"
            );
            return Ok(());
        }

        let raw = RawMessage::new(self.origin(), message);
        Self::dispatch(peer, &raw);
        Ok(())
    }

    fn subscribe(&self, listener: RawListener) -> Subscription {
        let key = self.inner.next_listener.fetch_add(1, Ordering::Relaxed);
        self.inner.ends[self.side]
            .listeners
            .lock()
            .push((key, listener));

        let weak = Arc::downgrade(&self.inner);
        let side = self.side;
        Subscription::new(move || Self::unsubscribe(&weak, side, key))
    }
}

// ============================================================================
// MemoryPort - Frame
// ============================================================================

impl Frame for MemoryPort {
    fn parent(&self) -> Option<Arc<dyn Transport>> {
        if self.side == APP {
            Some(Arc::new(self.clone()))
        } else {
            None
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
