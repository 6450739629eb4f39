//! Command definitions.
//!
//! Commands are sent by the mini-app as `command:<name>` envelopes and
//! confirmed by the host with `command:<name>:result`.
//!
//! # Commands
//!
//! | Name | Payload |
//! |------|---------|
//! | `navigate` | `{ path, params? }` |
//! | `navigate:back` | none |
//! | `showSnackbar` | `{ message, type? }` |
//! | `setTabbarVisible` | `{ visible }` |
//! | `setHeaderVisible` | `{ visible }` |
//! | `close` | none |

// ============================================================================
// Imports
// ============================================================================

use std::collections::BTreeMap;

use serde::de::{DeserializeOwned, IgnoredAny};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::error::Result;

use super::context::Context;

// ============================================================================
// Command Trait
// ============================================================================

/// A command the mini-app may invoke on the host.
pub trait Command: Serialize {
    /// Command name, without the `command:` prefix.
    const NAME: &'static str;

    /// What the host answers with.
    type Output: DeserializeOwned;

    /// Serializes the payload. Unit commands carry none.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`](crate::Error::Json) if serialization fails.
    fn payload(&self) -> Result<Option<Value>> {
        match serde_json::to_value(self)? {
            Value::Null => Ok(None),
            value => Ok(Some(value)),
        }
    }
}

// ============================================================================
// Ack
// ============================================================================

/// Output of commands the host only confirms.
///
/// Deserializes from any value, including an absent payload.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Ack;

impl<'de> Deserialize<'de> for Ack {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        IgnoredAny::deserialize(deserializer)?;
        Ok(Self)
    }
}

// ============================================================================
// Navigation
// ============================================================================

/// Navigate the host to `path`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Navigate {
    /// Host route path.
    pub path: String,
    /// Route parameters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<BTreeMap<String, String>>,
}

impl Navigate {
    /// Creates a navigation to `path` without parameters.
    #[inline]
    #[must_use]
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            params: None,
        }
    }

    /// Attaches route parameters.
    #[must_use]
    pub fn with_params(mut self, params: BTreeMap<String, String>) -> Self {
        self.params = Some(params);
        self
    }
}

impl Command for Navigate {
    const NAME: &'static str = "navigate";
    type Output = Ack;
}

/// Navigate the host back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NavigateBack;

impl Command for NavigateBack {
    const NAME: &'static str = "navigate:back";
    type Output = Ack;
}

// ============================================================================
// UI
// ============================================================================

/// Snackbar flavour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SnackbarKind {
    Success,
    Error,
    Info,
}

/// Show a snackbar in the host UI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShowSnackbar {
    /// Text to show.
    pub message: String,
    /// Optional flavour.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<SnackbarKind>,
}

impl ShowSnackbar {
    /// Creates a plain snackbar.
    #[inline]
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            kind: None,
        }
    }

    /// Sets the flavour.
    #[inline]
    #[must_use]
    pub fn with_kind(mut self, kind: SnackbarKind) -> Self {
        self.kind = Some(kind);
        self
    }
}

impl Command for ShowSnackbar {
    const NAME: &'static str = "showSnackbar";
    type Output = Ack;
}

/// Show or hide the host tab bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetTabbarVisible {
    pub visible: bool,
}

impl Command for SetTabbarVisible {
    const NAME: &'static str = "setTabbarVisible";
    type Output = Ack;
}

/// Show or hide the host header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetHeaderVisible {
    pub visible: bool,
}

impl Command for SetHeaderVisible {
    const NAME: &'static str = "setHeaderVisible";
    type Output = Ack;
}

/// Close the mini-app.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Close;

impl Command for Close {
    const NAME: &'static str = "close";
    type Output = Ack;
}

// ============================================================================
// Handshake
// ============================================================================

/// Payload of the `init` request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitRequest {
    /// Mini-app identifier registered with the host.
    pub app_id: String,
}

/// Payload of the `init:result` reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InitResult {
    /// Initial session snapshot.
    pub context: Context,
}

// ============================================================================
// Tests
// ============================================================================
