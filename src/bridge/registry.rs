//! Listener registry.
//!
//! Maps an envelope type to the handlers registered for it. Handlers are
//! kept in registration order and compared by `Arc` identity, so adding
//! the same handler twice is a no-op while two distinct closures with
//! identical code stay separate.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use rustc_hash::FxHashMap;

use super::MessageHandler;

// ============================================================================
// HandlerRegistry
// ============================================================================

/// Type → handlers mapping with set semantics per type.
#[derive(Default)]
pub(crate) struct HandlerRegistry {
    /// Handlers by envelope type, in registration order.
    handlers: FxHashMap<String, Vec<MessageHandler>>,
}

impl HandlerRegistry {
    /// Adds `handler` under `message_type`.
    ///
    /// Returns `false` if that exact handler was already registered.
    pub(crate) fn insert(&mut self, message_type: String, handler: MessageHandler) -> bool {
        let entry = self.handlers.entry(message_type).or_default();
        if entry.iter().any(|existing| Arc::ptr_eq(existing, &handler)) {
            return false;
        }
        entry.push(handler);
        true
    }

    /// Removes `handler` from `message_type`.
    ///
    /// Returns `true` if it was registered.
    pub(crate) fn remove(&mut self, message_type: &str, handler: &MessageHandler) -> bool {
        let Some(entry) = self.handlers.get_mut(message_type) else {
            return false;
        };

        let before = entry.len();
        entry.retain(|existing| !Arc::ptr_eq(existing, handler));
        let removed = entry.len() != before;

        if entry.is_empty() {
            self.handlers.remove(message_type);
        }
        removed
    }

    /// Returns a snapshot of the handlers for `message_type`.
    ///
    /// Dispatch iterates the snapshot so handlers may register or remove
    /// listeners while running.
    pub(crate) fn snapshot(&self, message_type: &str) -> Vec<MessageHandler> {
        self.handlers
            .get(message_type)
            .map(|entry| entry.to_vec())
            .unwrap_or_default()
    }

    /// Returns the number of handlers for `message_type`.
    #[inline]
    pub(crate) fn count(&self, message_type: &str) -> usize {
        self.handlers.get(message_type).map_or(0, Vec::len)
    }

    /// Returns the number of handlers across all types.
    #[inline]
    pub(crate) fn total(&self) -> usize {
        self.handlers.values().map(Vec::len).sum()
    }

    /// Drops every handler.
    #[inline]
    pub(crate) fn clear(&mut self) {
        self.handlers.clear();
    }
}

// ============================================================================
// Tests
// ============================================================================
