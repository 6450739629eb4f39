//! Type-safe identifiers.
//!
//! Newtype wrappers keep correlation identifiers and subscription handles
//! from being mixed up with arbitrary strings or integers.
//!
//! | Type | Wraps | Source |
//! |------|-------|--------|
//! | [`RequestId`] | `String` | time + sequence + random |
//! | [`SubscriptionId`] | `u64` | process-wide counter |

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// Counters
// ============================================================================

/// Monotonic component of every minted request ID.
static REQUEST_SEQUENCE: AtomicU64 = AtomicU64::new(1);

/// Source of subscription IDs.
static SUBSCRIPTION_SEQUENCE: AtomicU64 = AtomicU64::new(1);

// ============================================================================
// RequestId
// ============================================================================

/// Correlation identifier pairing a request envelope with its result.
///
/// Minted as `<message-type>:<unix-millis>:<sequence>:<random>`. The
/// sequence is process-wide and strictly increasing, so two IDs minted in
/// the same process never collide; the random part covers the remote side
/// minting IDs of its own.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(String);

impl RequestId {
    /// Mints a fresh identifier for a request of `message_type`.
    #[must_use]
    pub fn generate(message_type: &str) -> Self {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or_default();
        let sequence = REQUEST_SEQUENCE.fetch_add(1, Ordering::Relaxed);
        let random = Uuid::new_v4().simple().to_string();

        Self(format!("{message_type}:{millis}:{sequence}:{random}"))
    }

    /// Wraps an identifier received from the wire.
    #[inline]
    #[must_use]
    pub fn from_wire(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Returns the identifier as a string slice.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RequestId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

// ============================================================================
// SubscriptionId
// ============================================================================

/// Handle for one event subscription on the facade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    /// Returns the next process-wide subscription ID.
    #[inline]
    #[must_use]
    pub fn next() -> Self {
        Self(SUBSCRIPTION_SEQUENCE.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the raw value.
    #[inline]
    #[must_use]
    pub const fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Tests
// ============================================================================
