//! Error types for the mini-app bridge.
//!
//! This module defines every error surfaced to callers of the crate.
//! Inbound frames that fail validation are *not* errors: they are dropped
//! at the bridge boundary (see [`crate::protocol::Rejection`]).
//!
//! # Usage
//!
//! All fallible operations return [`Result<T>`] which uses [`Error`]:
//!
//! ```ignore
//! use exode_miniapp::{MiniApp, Result};
//!
//! async fn example(app: &MiniApp) -> Result<()> {
//!     app.navigate("/courses", None).await?;
//!     Ok(())
//! }
//! ```
//!
//! # Error Categories
//!
//! | Category | Variants |
//! |----------|----------|
//! | Configuration | [`Error::Config`] |
//! | Lifecycle | [`Error::NotInitialized`], [`Error::AlreadyInitialized`], [`Error::NotEmbedded`], [`Error::Destroyed`] |
//! | Correlation | [`Error::RequestTimeout`], [`Error::ChannelClosed`] |
//! | Transport | [`Error::Transport`], [`Error::Protocol`] |
//! | External | [`Error::Json`] |

// ============================================================================
// Imports
// ============================================================================

use std::result::Result as StdResult;

use thiserror::Error;
use tokio::sync::oneshot::error::RecvError;

use crate::identifiers::RequestId;

// ============================================================================
// Result Alias
// ============================================================================

/// Result type alias using crate [`enum@Error`].
pub type Result<T> = StdResult<T, Error>;

// ============================================================================
// Error Enum
// ============================================================================

/// Main error type for the crate.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Configuration error.
    ///
    /// Returned by [`MiniAppBuilder::build`](crate::MiniAppBuilder::build)
    /// when the configuration is invalid.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },

    // ========================================================================
    // Lifecycle Errors
    // ========================================================================
    /// A command was issued before `init()` completed.
    #[error("Mini-app is not initialized. Call init() first")]
    NotInitialized,

    /// `init()` was called more than once.
    #[error("Mini-app is already initialized")]
    AlreadyInitialized,

    /// The local context has no parent frame to talk to.
    #[error("Mini-app must be embedded in a parent frame")]
    NotEmbedded,

    /// The bridge or facade has been torn down.
    #[error("Bridge is destroyed")]
    Destroyed,

    // ========================================================================
    // Correlation Errors
    // ========================================================================
    /// No matching result arrived before the deadline.
    #[error("Request \"{message_type}\" ({request_id}) timed out after {timeout_ms}ms")]
    RequestTimeout {
        /// Correlation identifier of the request.
        request_id: RequestId,
        /// Message type the request was sent with.
        message_type: String,
        /// Milliseconds waited before timeout.
        timeout_ms: u64,
    },

    // ========================================================================
    // Transport Errors
    // ========================================================================
    /// The transport refused or failed to deliver a message.
    #[error("Transport failure: {message}")]
    Transport {
        /// Description of the transport failure.
        message: String,
    },

    /// The remote side answered with something we cannot use.
    #[error("Protocol error: {message}")]
    Protocol {
        /// Description of the protocol violation.
        message: String,
    },

    // ========================================================================
    // External Errors
    // ========================================================================
    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Correlation channel dropped without a result.
    #[error("Channel closed")]
    ChannelClosed(#[from] RecvError),
}

// ============================================================================
// Error Constructors
// ============================================================================

impl Error {
    /// Creates a configuration error.
    #[inline]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates a request timeout error.
    #[inline]
    pub fn request_timeout(
        request_id: RequestId,
        message_type: impl Into<String>,
        timeout_ms: u64,
    ) -> Self {
        Self::RequestTimeout {
            request_id,
            message_type: message_type.into(),
            timeout_ms,
        }
    }

    /// Creates a transport error.
    #[inline]
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    /// Creates a protocol error.
    #[inline]
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }
}

// ============================================================================
// Error Predicates
// ============================================================================

impl Error {
    /// Returns `true` if this is a timeout error.
    #[inline]
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::RequestTimeout { .. })
    }

    /// Returns `true` if this error comes from the facade lifecycle.
    #[inline]
    #[must_use]
    pub fn is_lifecycle_error(&self) -> bool {
        matches!(
            self,
            Self::NotInitialized | Self::AlreadyInitialized | Self::NotEmbedded | Self::Destroyed
        )
    }

    /// Returns `true` if this error may succeed when the caller re-invokes.
    ///
    /// Nothing is retried automatically.
    #[inline]
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::RequestTimeout { .. } | Self::Transport { .. })
    }
}

// ============================================================================
// Tests
// ============================================================================
