//! Wire protocol message types.
//!
//! This module defines the message format exchanged between the host page
//! and the embedded mini-app.
//!
//! # Protocol Overview
//!
//! Every frame on the transport is an [`Envelope`]:
//!
//! ```json
//! { "type": "command:navigate", "requestId": "...", "payload": { ... }, "source": "exode-miniapp" }
//! ```
//!
//! | Message Type | Direction | Purpose |
//! |--------------|-----------|---------|
//! | `init` | App → Host | Handshake, answered with the initial context |
//! | `command:<name>` | App → Host | Command request |
//! | `<type>:result` | Remote → Local | Result of a correlated request |
//! | `event` | Host → App | Pub/sub notification wrapping `{type, payload}` |
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `command` | Outbound command catalog |
//! | `context` | Session snapshot shapes and merge |
//! | `envelope` | Envelope, sender identity, inbound validation |
//! | `event` | Inbound event catalog |

// ============================================================================
// Submodules
// ============================================================================

/// Outbound command catalog.
pub mod command;

/// Session snapshot shapes.
pub mod context;

/// Envelope and inbound validation.
pub mod envelope;

/// Inbound event catalog.
pub mod event;

// ============================================================================
// Re-exports
// ============================================================================

pub use command::{
    Ack, Close, Command, InitRequest, InitResult, Navigate, NavigateBack, SetHeaderVisible,
    SetTabbarVisible, ShowSnackbar, SnackbarKind,
};
pub use context::{AppConfig, Avatar, ColorScheme, Context, ContextUpdate, Platform, Theme, User};
pub use envelope::{
    COMMAND_PREFIX, EVENT_TYPE, Envelope, INIT_TYPE, RESULT_SUFFIX, Rejection, Source,
    WILDCARD_ORIGIN, check_origin, command_type, result_type,
};
pub use event::{
    CONTEXT_UPDATED, ContextUpdated, EventKind, EventMessage, RouteChange, RouteChanged,
    ThemeChanged, UserUpdated, Visibility, VisibilityChanged,
};
