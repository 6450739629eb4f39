//! Exode mini-app bridge - Typed host/mini-app messaging.
//!
//! This library lets a mini-app embedded in a host page talk to that host
//! over a window-message style channel that is unordered, unauthenticated
//! and shared with anything else on the page.
//!
//! # Architecture
//!
//! Three layers, bottom to top:
//!
//! - **Transport Guard** ([`Bridge`]): tags outbound envelopes with the
//!   local identity, drops malformed, foreign-origin and echoed frames,
//!   fans valid ones out to listeners
//! - **Request Correlator** ([`Correlator`]): pairs each request with its
//!   `<type>:result` by a unique request ID, with a timeout per call
//! - **Session Facade** ([`MiniApp`]): handshake, lifecycle, the
//!   [`Context`] snapshot, typed events and typed commands
//!
//! Key design principles:
//!
//! - Never trust the channel: every inbound frame is validated first
//! - One in-flight request never resolves another, even with equal types
//! - Teardown rejects everything still waiting, nothing hangs
//! - Snapshots are immutable; updates replace them
//!
//! # Quick Start
//!
//! ```ignore
//! use exode_miniapp::{MiniApp, Result, ShowSnackbar, ThemeChanged};
//!
//! async fn run(frame: std::sync::Arc<dyn exode_miniapp::Frame>) -> Result<()> {
//!     let app = MiniApp::builder()
//!         .app_id("quiz")
//!         .target_origin("https://exode.ru")
//!         .build(frame)?;
//!
//!     let context = app.init().await?;
//!     println!("Hello, user {}", context.user.id);
//!
//!     let _theme = app.on::<ThemeChanged, _>(|theme| {
//!         println!("Dark mode: {}", theme.scheme.is_dark());
//!     });
//!
//!     app.show_snackbar(ShowSnackbar::new("Loaded")).await?;
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`bridge`] | Guarded endpoint and correlated requests |
//! | [`client`] | Mini-app session: [`MiniApp`], builder, commands |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`identifiers`] | Request and subscription IDs |
//! | [`protocol`] | Envelope, context, event and command types |
//! | [`transport`] | Transport seam and in-memory channel |

// ============================================================================
// Modules
// ============================================================================

/// Guarded message endpoint.
///
/// Used directly by hosts, and internally by [`MiniApp`].
pub mod bridge;

/// Mini-app session facade.
///
/// Use [`MiniApp::builder()`] to create a session.
pub mod client;

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Request and subscription identifiers.
pub mod identifiers;

/// Wire types.
pub mod protocol;

/// Transport seam.
///
/// Implement [`Transport`] and [`Frame`] to run over a real window channel.
pub mod transport;

// ============================================================================
// Re-exports
// ============================================================================

// Bridge types
pub use bridge::{Bridge, MessageHandler};

// Client types
pub use client::{
    Correlator, EventHandler, MiniApp, MiniAppBuilder, MiniAppConfig, State, Unsubscribe,
};

// Error types
pub use error::{Error, Result};

// Identifier types
pub use identifiers::{RequestId, SubscriptionId};

// Protocol types
pub use protocol::{
    Ack, AppConfig, ColorScheme, Command, Context, ContextUpdate, Envelope, EventKind,
    EventMessage, Navigate, Platform, RouteChange, RouteChanged, ShowSnackbar, SnackbarKind,
    Source, Theme, ThemeChanged, User, UserUpdated, Visibility, VisibilityChanged,
};

// Transport types
pub use transport::{Frame, MemoryChannel, MemoryPort, RawMessage, Subscription, TopLevel, Transport};
