//! Envelope message type and inbound validation.
//!
//! Defines the single frame shape exchanged over the transport, the two
//! sender identities, and the rules an inbound frame must pass before it
//! reaches any listener.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::result::Result as StdResult;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::identifiers::RequestId;

// ============================================================================
// Constants
// ============================================================================

/// Envelope type carrying a pub/sub event.
pub const EVENT_TYPE: &str = "event";

/// Envelope type of the handshake request.
pub const INIT_TYPE: &str = "init";

/// Prefix of every outbound command type.
pub const COMMAND_PREFIX: &str = "command:";

/// Suffix marking the result of a correlated request.
pub const RESULT_SUFFIX: &str = ":result";

/// Origin value that disables origin checks.
pub const WILDCARD_ORIGIN: &str = "*";

/// Returns the result type answering `message_type`.
///
/// ```
/// assert_eq!(exode_miniapp::protocol::result_type("init"), "init:result");
/// ```
#[inline]
#[must_use]
pub fn result_type(message_type: &str) -> String {
    format!("{message_type}{RESULT_SUFFIX}")
}

/// Returns the envelope type for the command `name`.
#[inline]
#[must_use]
pub fn command_type(name: &str) -> String {
    format!("{COMMAND_PREFIX}{name}")
}

// ============================================================================
// Source
// ============================================================================

/// Sender identity tag.
///
/// Exactly two identities exist, one per side of the channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Source {
    /// The page embedding the mini-app.
    #[serde(rename = "exode-host")]
    Host,
    /// The embedded mini-app.
    #[serde(rename = "exode-miniapp")]
    MiniApp,
}

impl Source {
    /// Returns the wire tag.
    #[inline]
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Host => "exode-host",
            Self::MiniApp => "exode-miniapp",
        }
    }

    /// Parses a wire tag. Unknown tags yield `None`.
    #[inline]
    #[must_use]
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "exode-host" => Some(Self::Host),
            "exode-miniapp" => Some(Self::MiniApp),
            _ => None,
        }
    }

    /// Returns the identity on the other side of the channel.
    #[inline]
    #[must_use]
    pub const fn peer(&self) -> Self {
        match self {
            Self::Host => Self::MiniApp,
            Self::MiniApp => Self::Host,
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Envelope
// ============================================================================

/// The unit exchanged over the transport.
///
/// # Format
///
/// ```json
/// {
///   "type": "command:navigate",
///   "requestId": "command:navigate:1718000000000:7:3f2a...",
///   "payload": { "path": "/courses" },
///   "source": "exode-miniapp"
/// }
/// ```
///
/// `requestId` and `payload` are omitted when absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Identifies payload semantics. Never empty once validated.
    #[serde(rename = "type")]
    pub message_type: String,

    /// Correlation identifier, present only for request/result pairs.
    #[serde(rename = "requestId", default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<RequestId>,

    /// Message payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,

    /// Sender identity.
    pub source: Source,
}

impl Envelope {
    /// Creates a fire-and-forget envelope.
    #[inline]
    #[must_use]
    pub fn new(message_type: impl Into<String>, payload: Option<Value>, source: Source) -> Self {
        Self {
            message_type: message_type.into(),
            request_id: None,
            payload,
            source,
        }
    }

    /// Attaches a correlation identifier.
    #[inline]
    #[must_use]
    pub fn with_request_id(mut self, request_id: RequestId) -> Self {
        self.request_id = Some(request_id);
        self
    }

    /// Returns `true` if this envelope answers a correlated request.
    #[inline]
    #[must_use]
    pub fn is_result(&self) -> bool {
        self.message_type.ends_with(RESULT_SUFFIX)
    }

    /// Validates a raw inbound frame addressed to `local`.
    ///
    /// Checks, in order: the frame is an object, `type` is a non-empty
    /// string, `source` is a known identity and `source` is not `local`.
    /// A non-string `requestId` is treated as absent: it can never match a
    /// pending request.
    ///
    /// # Errors
    ///
    /// Returns the [`Rejection`] explaining why the frame was dropped.
    pub fn from_inbound(data: &Value, local: Source) -> StdResult<Self, Rejection> {
        let object = data.as_object().ok_or(Rejection::NotAnObject)?;

        let message_type = match object.get("type") {
            Some(Value::String(t)) if !t.is_empty() => t.clone(),
            Some(Value::String(_)) => return Err(Rejection::EmptyType),
            Some(_) => return Err(Rejection::InvalidType),
            None => return Err(Rejection::MissingType),
        };

        let source = Self::parse_source(object)?;
        if source == local {
            return Err(Rejection::Echo);
        }

        let request_id = object
            .get("requestId")
            .and_then(Value::as_str)
            .map(RequestId::from_wire);

        let payload = match object.get("payload") {
            None | Some(Value::Null) => None,
            Some(value) => Some(value.clone()),
        };

        Ok(Self {
            message_type,
            request_id,
            payload,
            source,
        })
    }

    /// Reads and checks the `source` tag.
    fn parse_source(object: &Map<String, Value>) -> StdResult<Source, Rejection> {
        match object.get("source") {
            Some(Value::String(tag)) => {
                Source::from_tag(tag).ok_or_else(|| Rejection::UnknownSource { tag: tag.clone() })
            }
            _ => Err(Rejection::UnknownSource {
                tag: String::new(),
            }),
        }
    }
}

// ============================================================================
// Rejection
// ============================================================================

/// Why an inbound frame never reached a listener.
///
/// Rejections are logged and dropped; no caller ever observes them.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    /// Frame is not a JSON object.
    #[error("frame is not an object")]
    NotAnObject,

    /// `type` field is missing.
    #[error("missing type")]
    MissingType,

    /// `type` field is not a string.
    #[error("type is not a string")]
    InvalidType,

    /// `type` field is an empty string.
    #[error("type is empty")]
    EmptyType,

    /// `source` is not one of the two known identities.
    #[error("unknown source \"{tag}\"")]
    UnknownSource {
        /// The tag that was received (empty when missing or not a string).
        tag: String,
    },

    /// Frame was sent by the local identity itself.
    #[error("echo of own message")]
    Echo,

    /// Sender origin differs from the configured origin.
    #[error("origin mismatch: expected {expected}, got {actual}")]
    OriginMismatch {
        /// Configured origin.
        expected: String,
        /// Origin the transport reported.
        actual: String,
    },
}

impl Rejection {
    /// Returns `true` if the frame itself was malformed.
    #[inline]
    #[must_use]
    pub fn is_malformed(&self) -> bool {
        !matches!(self, Self::Echo | Self::OriginMismatch { .. })
    }
}

/// Checks the transport-level origin against the configured one.
///
/// # Errors
///
/// Returns [`Rejection::OriginMismatch`] unless `expected` is the wildcard
/// or matches `actual` exactly.
pub fn check_origin(expected: &str, actual: &str) -> StdResult<(), Rejection> {
    if expected == WILDCARD_ORIGIN || expected == actual {
        return Ok(());
    }

    Err(Rejection::OriginMismatch {
        expected: expected.to_string(),
        actual: actual.to_string(),
    })
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    #[test]
    fn test_envelope_serialization_omits_absent_fields() {
        let envelope = Envelope::new("close", None, Source::MiniApp);
        let json = serde_json::to_value(&envelope).expect("serialize");
        assert_eq!(json, json!({"type": "close", "source": "exode-miniapp"}));
    }

    #[test]
    fn test_envelope_serialization_with_request_id() {
        let envelope = Envelope::new("init", Some(json!({"appId": "quiz"})), Source::MiniApp)
            .with_request_id(RequestId::from("init:1:1:ab"));
        let json = serde_json::to_value(&envelope).expect("serialize");

        assert_eq!(json["requestId"], "init:1:1:ab");
        assert_eq!(json["payload"]["appId"], "quiz");
    }

    #[test]
    fn test_from_inbound_accepts_peer_frame() {
        let data = json!({
            "type": "ping:result",
            "requestId": "ping:1:1:ab",
            "payload": {"y": 2},
            "source": "exode-host"
        });

        let envelope = Envelope::from_inbound(&data, Source::MiniApp).expect("valid");
        assert_eq!(envelope.message_type, "ping:result");
        assert_eq!(envelope.request_id, Some(RequestId::from("ping:1:1:ab")));
        assert_eq!(envelope.payload, Some(json!({"y": 2})));
        assert!(envelope.is_result());
    }

    #[test]
    fn test_from_inbound_rejections() {
        let local = Source::MiniApp;
        let cases = [
            (json!("string frame"), Rejection::NotAnObject),
            (json!({"source": "exode-host"}), Rejection::MissingType),
            (json!({"type": 7, "source": "exode-host"}), Rejection::InvalidType),
            (json!({"type": "", "source": "exode-host"}), Rejection::EmptyType),
            (
                json!({"type": "event", "source": "someone-else"}),
                Rejection::UnknownSource {
                    tag: "someone-else".into(),
                },
            ),
            (json!({"type": "event", "source": "exode-miniapp"}), Rejection::Echo),
        ];

        for (data, expected) in cases {
            assert_eq!(Envelope::from_inbound(&data, local), Err(expected));
        }
    }

    #[test]
    fn test_non_string_request_id_is_ignored() {
        let data = json!({"type": "ping:result", "requestId": 5, "source": "exode-host"});
        let envelope = Envelope::from_inbound(&data, Source::MiniApp).expect("valid");
        assert!(envelope.request_id.is_none());
    }

    #[test]
    fn test_check_origin() {
        assert!(check_origin("*", "https://evil.example").is_ok());
        assert!(check_origin("https://exode.ru", "https://exode.ru").is_ok());

        let err = check_origin("https://exode.ru", "https://evil.example").unwrap_err();
        assert!(!err.is_malformed());
        assert!(err.to_string().contains("evil.example"));
    }

    #[test]
    fn test_source_peer_and_tags() {
        assert_eq!(Source::Host.peer(), Source::MiniApp);
        assert_eq!(Source::from_tag("exode-miniapp"), Some(Source::MiniApp));
        assert_eq!(Source::from_tag("exode"), None);
        assert_eq!(Source::Host.to_string(), "exode-host");
    }

    #[test]
    fn test_type_helpers() {
        assert_eq!(command_type("navigate"), "command:navigate");
        assert_eq!(result_type("command:navigate"), "command:navigate:result");
    }
}
