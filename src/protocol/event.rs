//! Event message types.
//!
//! Events are pushed by the host inside an `"event"` envelope whose payload
//! is `{ "type": ..., "payload": ... }`.
//!
//! # Event Types
//!
//! | Type | Payload |
//! |------|---------|
//! | `theme:changed` | [`Theme`] |
//! | `user:updated` | [`User`] |
//! | `route:changed` | [`RouteChange`] |
//! | `context:updated` | [`ContextUpdate`] (also merged into the snapshot) |
//! | `visibility:changed` | [`Visibility`] |

// ============================================================================
// Imports
// ============================================================================

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use super::context::{ContextUpdate, Theme, User};

// ============================================================================
// Constants
// ============================================================================

/// Reserved event type whose payload is merged into the session snapshot.
pub const CONTEXT_UPDATED: &str = "context:updated";

// ============================================================================
// EventMessage
// ============================================================================

/// Inner shape of an `"event"` envelope.
///
/// # Format
///
/// ```json
/// { "type": "theme:changed", "payload": { "scheme": "dark" } }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventMessage {
    /// Event name.
    #[serde(rename = "type")]
    pub event_type: String,

    /// Event-specific data.
    #[serde(default)]
    pub payload: Value,
}

impl EventMessage {
    /// Creates a new event message.
    #[inline]
    #[must_use]
    pub fn new(event_type: impl Into<String>, payload: Value) -> Self {
        Self {
            event_type: event_type.into(),
            payload,
        }
    }

    /// Unpacks the payload of an `"event"` envelope.
    ///
    /// Returns `None` unless the payload is an object with a string `type`.
    #[must_use]
    pub fn unpack(envelope_payload: Option<&Value>) -> Option<Self> {
        let object = envelope_payload?.as_object()?;
        let event_type = object.get("type")?.as_str()?.to_string();
        let payload = object.get("payload").cloned().unwrap_or(Value::Null);

        Some(Self {
            event_type,
            payload,
        })
    }

    /// Packs this event into an envelope payload.
    #[inline]
    #[must_use]
    pub fn to_payload(&self) -> Value {
        json!({ "type": self.event_type, "payload": self.payload })
    }

    /// Returns `true` for the reserved snapshot-merge event.
    #[inline]
    #[must_use]
    pub fn is_context_update(&self) -> bool {
        self.event_type == CONTEXT_UPDATED
    }
}

// ============================================================================
// EventKind
// ============================================================================

/// An event the host may push, with its typed payload.
///
/// Used with [`MiniApp::on`](crate::MiniApp::on):
///
/// ```ignore
/// app.on::<ThemeChanged, _>(|theme| println!("dark: {}", theme.scheme.is_dark()));
/// ```
pub trait EventKind {
    /// Event name on the wire.
    const TYPE: &'static str;

    /// Payload type.
    type Payload: DeserializeOwned;
}

/// `theme:changed`
#[derive(Debug, Clone, Copy)]
pub struct ThemeChanged;

impl EventKind for ThemeChanged {
    const TYPE: &'static str = "theme:changed";
    type Payload = Theme;
}

/// `user:updated`
#[derive(Debug, Clone, Copy)]
pub struct UserUpdated;

impl EventKind for UserUpdated {
    const TYPE: &'static str = "user:updated";
    type Payload = User;
}

/// `route:changed`
#[derive(Debug, Clone, Copy)]
pub struct RouteChanged;

impl EventKind for RouteChanged {
    const TYPE: &'static str = "route:changed";
    type Payload = RouteChange;
}

/// `context:updated`
#[derive(Debug, Clone, Copy)]
pub struct ContextUpdated;

impl EventKind for ContextUpdated {
    const TYPE: &'static str = CONTEXT_UPDATED;
    type Payload = ContextUpdate;
}

/// `visibility:changed`
#[derive(Debug, Clone, Copy)]
pub struct VisibilityChanged;

impl EventKind for VisibilityChanged {
    const TYPE: &'static str = "visibility:changed";
    type Payload = Visibility;
}

// ============================================================================
// Payloads
// ============================================================================

/// Host route change.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteChange {
    pub path: String,
    #[serde(default)]
    pub params: BTreeMap<String, String>,
}

/// Mini-app visibility change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Visibility {
    pub visible: bool,
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use crate::protocol::context::ColorScheme;

    #[test]
    fn test_unpack_event() {
        let payload = json!({"type": "theme:changed", "payload": {"scheme": "dark"}});
        let event = EventMessage::unpack(Some(&payload)).expect("event");

        assert_eq!(event.event_type, ThemeChanged::TYPE);
        let theme: Theme = serde_json::from_value(event.payload).expect("theme");
        assert_eq!(theme.scheme, ColorScheme::Dark);
    }

    #[test]
    fn test_unpack_rejects_bad_shapes() {
        assert!(EventMessage::unpack(None).is_none());
        assert!(EventMessage::unpack(Some(&json!("theme:changed"))).is_none());
        assert!(EventMessage::unpack(Some(&json!({"payload": 1}))).is_none());
        assert!(EventMessage::unpack(Some(&json!({"type": 3}))).is_none());
    }

    #[test]
    fn test_unpack_without_payload() {
        let event = EventMessage::unpack(Some(&json!({"type": "ping"}))).expect("event");
        assert_eq!(event.payload, Value::Null);
    }

    #[test]
    fn test_to_payload_matches_unpack() {
        let event = EventMessage::new(CONTEXT_UPDATED, json!({"platform": "ios"}));
        let packed = event.to_payload();
        assert_eq!(EventMessage::unpack(Some(&packed)), Some(event.clone()));
        assert!(event.is_context_update());
    }

    #[test]
    fn test_route_change_params_default() {
        let change: RouteChange = serde_json::from_value(json!({"path": "/a"})).expect("route");
        assert!(change.params.is_empty());
    }
}
