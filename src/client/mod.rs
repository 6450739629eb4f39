//! Mini-app client.
//!
//! The typed session API a mini-app talks to.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `config` | [`MiniAppConfig`] and its builder |
//! | `core` | [`MiniApp`] lifecycle, snapshot and event subscriptions |
//! | `commands` | Named host command wrappers |
//! | `correlator` | `command:<name>` requests with per-call timeouts |

// ============================================================================
// Submodules
// ============================================================================

/// Host command wrappers.
mod commands;

/// Configuration and builder.
pub mod config;

/// Session facade.
pub mod core;

/// Command correlation.
pub mod correlator;

// ============================================================================
// Re-exports
// ============================================================================

pub use config::{DEFAULT_TIMEOUT, MiniAppBuilder, MiniAppConfig};
pub use core::{EventHandler, MiniApp, State, Unsubscribe};
pub use correlator::Correlator;
