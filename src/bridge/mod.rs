//! Transport guard.
//!
//! [`Bridge`] sits between "anything could arrive on this channel" and
//! "validated envelopes destined for registered listeners". It tags every
//! outbound envelope with the local identity and filters every inbound
//! frame before dispatch.
//!
//! # Inbound Pipeline
//!
//! 1. Drop everything once the bridge is destroyed
//! 2. Validate shape (`type`, `source`), dropping malformed frames
//! 3. Drop frames whose origin differs from a non-wildcard target origin
//! 4. Drop echoes of our own identity
//! 5. Fan out to the listeners for `type`, in registration order, with a
//!    panic in one listener contained to that listener
//!
//! Malformed frames are logged at `debug`, foreign-origin and echoed ones at
//! `trace`. No rejection surfaces to callers.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `registry` | Type → handlers map with set semantics |
//! | `request` | Correlated request/result over `send` + `on` |

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use serde_json::Value;
use tracing::{debug, trace, warn};

use crate::error::{Error, Result};
use crate::identifiers::RequestId;
use crate::protocol::{
    EVENT_TYPE, Envelope, EventMessage, Source, check_origin, result_type,
};
use crate::transport::{RawMessage, Subscription, Transport};

use self::registry::HandlerRegistry;
use self::request::CorrelationMap;

// ============================================================================
// Submodules
// ============================================================================

/// Listener registry.
mod registry;

/// Request/result correlation.
mod request;

// ============================================================================
// Types
// ============================================================================

/// Listener for one envelope type.
///
/// Identity is the `Arc` allocation: keep a clone to remove it with
/// [`Bridge::off`].
pub type MessageHandler = Arc<dyn Fn(&Envelope) + Send + Sync>;

/// State reachable from the transport callback.
pub(crate) struct Shared {
    /// Local sender identity.
    source: Source,
    /// Origin we post to and accept from (`"*"` for any).
    target_origin: String,
    /// Set once by `destroy`.
    destroyed: AtomicBool,
    /// Inbound listeners.
    handlers: Mutex<HandlerRegistry>,
    /// In-flight correlated requests.
    correlation: Mutex<CorrelationMap>,
}

// ============================================================================
// Bridge
// ============================================================================

/// Guarded endpoint of a host/mini-app channel.
///
/// The same type serves both sides; `source` decides which.
///
/// # Example
///
/// ```ignore
/// let bridge = Bridge::new(transport, Source::MiniApp, "https://exode.ru");
///
/// let handler: MessageHandler = Arc::new(|envelope| println!("{:?}", envelope.payload));
/// bridge.on("event", Arc::clone(&handler));
///
/// let context = bridge.send_request("init", Some(json!({"appId": "quiz"})), timeout).await?;
/// ```
#[derive(Clone)]
pub struct Bridge {
    /// State shared with the transport callback.
    shared: Arc<Shared>,
    /// Outbound transport.
    transport: Arc<dyn Transport>,
    /// Inbound subscription, released on destroy.
    subscription: Arc<Mutex<Option<Subscription>>>,
}

impl fmt::Debug for Bridge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bridge")
            .field("source", &self.shared.source)
            .field("target_origin", &self.shared.target_origin)
            .field("destroyed", &self.is_destroyed())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Bridge - Constructor
// ============================================================================

impl Bridge {
    /// Creates a bridge and subscribes it to `transport`.
    ///
    /// # Arguments
    ///
    /// * `transport` - Channel to the remote context
    /// * `source` - Local identity stamped on outbound envelopes
    /// * `target_origin` - Remote origin, or `"*"` to skip origin checks
    #[must_use]
    pub fn new(
        transport: Arc<dyn Transport>,
        source: Source,
        target_origin: impl Into<String>,
    ) -> Self {
        let shared = Arc::new(Shared {
            source,
            target_origin: target_origin.into(),
            destroyed: AtomicBool::new(false),
            handlers: Mutex::new(HandlerRegistry::default()),
            correlation: Mutex::new(CorrelationMap::default()),
        });

        let inbound = Arc::clone(&shared);
        let subscription = transport.subscribe(Arc::new(move |raw: &RawMessage| {
            inbound.handle_inbound(raw);
        }));

        debug!(%source, target_origin = %shared.target_origin, "Bridge created");

        Self {
            shared,
            transport,
            subscription: Arc::new(Mutex::new(Some(subscription))),
        }
    }
}

// ============================================================================
// Bridge - Accessors
// ============================================================================

impl Bridge {
    /// Returns the local identity.
    #[inline]
    #[must_use]
    pub fn source(&self) -> Source {
        self.shared.source
    }

    /// Returns the configured target origin.
    #[inline]
    #[must_use]
    pub fn target_origin(&self) -> &str {
        &self.shared.target_origin
    }

    /// Returns `true` once [`destroy`](Self::destroy) has run.
    #[inline]
    #[must_use]
    pub fn is_destroyed(&self) -> bool {
        self.shared.destroyed.load(Ordering::SeqCst)
    }

    /// Returns the number of listeners for `message_type`.
    #[inline]
    #[must_use]
    pub fn listener_count(&self, message_type: &str) -> usize {
        self.shared.handlers.lock().count(message_type)
    }

    /// Returns the number of listeners across all types.
    #[inline]
    #[must_use]
    pub fn total_listeners(&self) -> usize {
        self.shared.handlers.lock().total()
    }

    /// Returns the number of in-flight correlated requests.
    #[inline]
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.shared.correlation.lock().len()
    }
}

// ============================================================================
// Bridge - Messaging
// ============================================================================

impl Bridge {
    /// Sends an envelope tagged with the local identity.
    ///
    /// No acknowledgement is awaited. After [`destroy`](Self::destroy) this
    /// is a no-op that returns `Ok(())`.
    ///
    /// # Errors
    ///
    /// - [`Error::Json`] if the envelope cannot be serialized
    /// - [`Error::Transport`] if the transport refuses the message
    pub fn send(
        &self,
        message_type: &str,
        payload: Option<Value>,
        request_id: Option<RequestId>,
    ) -> Result<()> {
        if self.is_destroyed() {
            trace!(message_type, "Send skipped: bridge destroyed");
            return Ok(());
        }

        let envelope = Envelope {
            message_type: message_type.to_string(),
            request_id,
            payload,
            source: self.shared.source,
        };

        let message = serde_json::to_value(&envelope)?;
        self.transport
            .post_message(message, &self.shared.target_origin)?;

        trace!(message_type, request_id = ?envelope.request_id, "Envelope sent");
        Ok(())
    }

    /// Registers `handler` for inbound envelopes of `message_type`.
    ///
    /// Registering the same handler twice for one type has no extra effect.
    pub fn on(&self, message_type: impl Into<String>, handler: MessageHandler) {
        let message_type = message_type.into();
        if self.is_destroyed() {
            trace!(%message_type, "Listener ignored: bridge destroyed");
            return;
        }

        let added = self
            .shared
            .handlers
            .lock()
            .insert(message_type.clone(), handler);
        trace!(%message_type, added, "Listener registered");
    }

    /// Removes `handler` from `message_type`.
    pub fn off(&self, message_type: &str, handler: &MessageHandler) {
        let removed = self.shared.handlers.lock().remove(message_type, handler);
        trace!(message_type, removed, "Listener removed");
    }

    /// Answers a correlated request with `<type>:result`.
    ///
    /// # Errors
    ///
    /// - [`Error::Protocol`] if `request` has no correlation identifier
    /// - Any error of [`send`](Self::send)
    pub fn reply(&self, request: &Envelope, payload: Option<Value>) -> Result<()> {
        let request_id = request.request_id.clone().ok_or_else(|| {
            Error::protocol(format!(
                "Cannot reply to \"{}\": envelope has no requestId",
                request.message_type
            ))
        })?;

        self.send(
            &result_type(&request.message_type),
            payload,
            Some(request_id),
        )
    }

    /// Pushes an event wrapped in an `"event"` envelope.
    ///
    /// # Errors
    ///
    /// Any error of [`send`](Self::send).
    pub fn emit_event(&self, event_type: &str, payload: Value) -> Result<()> {
        let event = EventMessage::new(event_type, payload);
        self.send(EVENT_TYPE, Some(event.to_payload()), None)
    }
}

// ============================================================================
// Bridge - Lifecycle
// ============================================================================

impl Bridge {
    /// Tears the bridge down.
    ///
    /// Marks it inert, detaches the transport subscription, drops every
    /// listener and fails every in-flight request with
    /// [`Error::Destroyed`]. Idempotent.
    pub fn destroy(&self) {
        if self.shared.destroyed.swap(true, Ordering::SeqCst) {
            return;
        }

        let subscription = self.subscription.lock().take();
        if let Some(mut subscription) = subscription {
            subscription.cancel();
        }

        self.shared.handlers.lock().clear();
        let failed = self.shared.fail_pending();

        debug!(source = %self.shared.source, failed, "Bridge destroyed");
    }
}

// ============================================================================
// Shared - Inbound
// ============================================================================

impl Shared {
    /// Filters one raw message and dispatches it.
    fn handle_inbound(&self, raw: &RawMessage) {
        if self.destroyed.load(Ordering::SeqCst) {
            return;
        }

        let envelope = match Envelope::from_inbound(&raw.data, self.source)
            .and_then(|envelope| check_origin(&self.target_origin, &raw.origin).map(|()| envelope))
        {
            Ok(envelope) => envelope,
            Err(rejection) if rejection.is_malformed() => {
                debug!(origin = %raw.origin, reason = %rejection, "Malformed inbound message dropped");
                return;
            }
            Err(rejection) => {
                trace!(origin = %raw.origin, reason = %rejection, "Inbound message dropped");
                return;
            }
        };

        let handlers = self.handlers.lock().snapshot(&envelope.message_type);
        if handlers.is_empty() {
            trace!(message_type = %envelope.message_type, "No listeners for inbound message");
            return;
        }

        for handler in handlers {
            if catch_unwind(AssertUnwindSafe(|| handler(&envelope))).is_err() {
                warn!(
                    message_type = %envelope.message_type,
                    "Listener panicked; continuing dispatch"
                );
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
