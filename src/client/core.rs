//! Mini-app session facade.
//!
//! [`MiniApp`] owns the lifecycle of one embedded session: the handshake
//! that yields the initial [`Context`], the snapshot kept current by
//! `context:updated` events, typed event subscriptions and typed commands.
//!
//! # Lifecycle
//!
//! ```text
//! Uninitialized ──init()──► Initializing ──result──► Ready
//!                                 │                    │
//!                                 └──error──► Failed   │
//!                                                      ▼
//!                    (any state) ──destroy()──► Destroyed
//! ```
//!
//! Commands are accepted only in `Ready`. `Destroyed` is terminal.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};
use rustc_hash::FxHashMap;
use serde_json::Value;
use tracing::{debug, info, trace, warn};

use crate::bridge::{Bridge, MessageHandler};
use crate::error::{Error, Result};
use crate::identifiers::SubscriptionId;
use crate::protocol::{
    Command, Context, ContextUpdate, EVENT_TYPE, Envelope, EventKind, EventMessage, INIT_TYPE,
    InitRequest, InitResult, Source,
};
use crate::transport::Frame;

use super::config::{MiniAppBuilder, MiniAppConfig};
use super::correlator::{Correlator, decode};

// ============================================================================
// Types
// ============================================================================

/// Callback for one event type, receiving the raw event payload.
pub type EventHandler = Arc<dyn Fn(&Value) + Send + Sync>;

/// Subscribers by event type, in subscription order.
type SubscriberMap = FxHashMap<String, Vec<(SubscriptionId, EventHandler)>>;

/// Observable lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum State {
    /// Created, `init()` not called yet.
    Uninitialized,
    /// Handshake in flight.
    Initializing,
    /// Handshake done; commands accepted.
    Ready,
    /// Handshake failed.
    Failed,
    /// Torn down.
    Destroyed,
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Uninitialized => "uninitialized",
            Self::Initializing => "initializing",
            Self::Ready => "ready",
            Self::Failed => "failed",
            Self::Destroyed => "destroyed",
        };
        f.write_str(name)
    }
}

/// Bridge and correlator created by `init()`.
#[derive(Debug, Clone)]
struct Session {
    bridge: Bridge,
    correlator: Correlator,
}

/// Lifecycle state together with the session it owns.
enum Phase {
    Uninitialized,
    Initializing(Session),
    Ready(Session),
    Failed(Session),
    Destroyed,
}

impl Phase {
    fn state(&self) -> State {
        match self {
            Self::Uninitialized => State::Uninitialized,
            Self::Initializing(_) => State::Initializing,
            Self::Ready(_) => State::Ready,
            Self::Failed(_) => State::Failed,
            Self::Destroyed => State::Destroyed,
        }
    }
}

/// State shared between the facade and its bridge listener.
struct Inner {
    /// Validated configuration.
    config: MiniAppConfig,
    /// Local execution context.
    frame: Arc<dyn Frame>,
    /// Lifecycle.
    phase: Mutex<Phase>,
    /// Latest session snapshot; `None` until the handshake succeeds.
    context: RwLock<Option<Arc<Context>>>,
    /// Event subscribers.
    subscribers: Mutex<SubscriberMap>,
}

// ============================================================================
// MiniApp
// ============================================================================

/// One embedded mini-app session.
///
/// Cloning is cheap and every clone drives the same session.
///
/// # Example
///
/// ```ignore
/// let app = MiniApp::builder().app_id("quiz").build(frame)?;
/// let context = app.init().await?;
///
/// let _theme = app.on::<ThemeChanged, _>(|theme| println!("{:?}", theme.scheme));
/// app.show_snackbar(ShowSnackbar::new("Saved")).await?;
/// ```
#[derive(Clone)]
pub struct MiniApp {
    inner: Arc<Inner>,
}

impl fmt::Debug for MiniApp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MiniApp")
            .field("app_id", &self.inner.config.app_id)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// MiniApp - Constructor
// ============================================================================

impl MiniApp {
    /// Creates a new builder.
    #[inline]
    #[must_use]
    pub fn builder() -> MiniAppBuilder {
        MiniAppBuilder::new()
    }

    /// Creates an uninitialized session from a validated configuration.
    #[must_use]
    pub fn new(config: MiniAppConfig, frame: Arc<dyn Frame>) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                frame,
                phase: Mutex::new(Phase::Uninitialized),
                context: RwLock::new(None),
                subscribers: Mutex::new(FxHashMap::default()),
            }),
        }
    }
}

// ============================================================================
// MiniApp - Accessors
// ============================================================================

impl MiniApp {
    /// Returns the configuration.
    #[inline]
    #[must_use]
    pub fn config(&self) -> &MiniAppConfig {
        &self.inner.config
    }

    /// Returns the current lifecycle state.
    #[inline]
    #[must_use]
    pub fn state(&self) -> State {
        self.inner.phase.lock().state()
    }

    /// Returns `true` once the handshake has succeeded and until destroy.
    #[inline]
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.state() == State::Ready
    }

    /// Returns the latest session snapshot.
    ///
    /// `None` before a successful handshake and after destroy. The returned
    /// snapshot never changes; later updates replace it.
    #[must_use]
    pub fn context(&self) -> Option<Arc<Context>> {
        self.inner.context.read().clone()
    }

    /// Returns the number of subscribers for `event_type`.
    #[must_use]
    pub fn subscriber_count(&self, event_type: &str) -> usize {
        self.inner
            .subscribers
            .lock()
            .get(event_type)
            .map_or(0, Vec::len)
    }
}

// ============================================================================
// MiniApp - Lifecycle
// ============================================================================

impl MiniApp {
    /// Performs the handshake with the host.
    ///
    /// Opens a bridge to the parent frame, starts routing host events and
    /// sends `init` with the app ID. On success the returned context becomes
    /// the session snapshot and the state becomes `Ready`.
    ///
    /// # Errors
    ///
    /// - [`Error::NotEmbedded`] if there is no parent frame (state unchanged)
    /// - [`Error::AlreadyInitialized`] if `init()` was already called
    /// - [`Error::Destroyed`] if the session was destroyed before or during the handshake
    /// - [`Error::RequestTimeout`] if the host does not answer (state becomes `Failed`)
    /// - [`Error::Protocol`] if the answer carries no usable context (state becomes `Failed`)
    pub async fn init(&self) -> Result<Arc<Context>> {
        let config = &self.inner.config;
        let request = serde_json::to_value(InitRequest {
            app_id: config.app_id.clone(),
        })?;

        let session = {
            let mut phase = self.inner.phase.lock();
            match *phase {
                Phase::Uninitialized => {}
                Phase::Destroyed => return Err(Error::Destroyed),
                _ => return Err(Error::AlreadyInitialized),
            }

            let transport = self.inner.frame.parent().ok_or(Error::NotEmbedded)?;
            let bridge = Bridge::new(transport, Source::MiniApp, config.target_origin.as_str());
            bridge.on(EVENT_TYPE, self.event_listener());

            let session = Session {
                correlator: Correlator::new(bridge.clone(), config.timeout),
                bridge,
            };
            *phase = Phase::Initializing(session.clone());
            session
        };

        debug!(app_id = %config.app_id, "Handshake started");
        let outcome = session
            .bridge
            .send_request(INIT_TYPE, Some(request), config.timeout)
            .await
            .and_then(|payload| {
                decode::<InitResult>(payload)
                    .map_err(|e| Error::protocol(format!("Invalid init result: {e}")))
            });

        let mut phase = self.inner.phase.lock();
        if !matches!(*phase, Phase::Initializing(_)) {
            return Err(Error::Destroyed);
        }

        match outcome {
            Ok(InitResult { context }) => {
                let context = Arc::new(context);
                *self.inner.context.write() = Some(Arc::clone(&context));
                *phase = Phase::Ready(session);
                info!(app_id = %config.app_id, "Mini-app ready");
                Ok(context)
            }
            Err(e) => {
                *phase = Phase::Failed(session);
                warn!(app_id = %config.app_id, error = %e, "Handshake failed");
                Err(e)
            }
        }
    }

    /// Tears the session down.
    ///
    /// Destroys the bridge (failing in-flight commands with
    /// [`Error::Destroyed`]), drops the snapshot and every subscriber.
    /// Idempotent.
    pub fn destroy(&self) {
        let previous = std::mem::replace(&mut *self.inner.phase.lock(), Phase::Destroyed);

        let session = match previous {
            Phase::Destroyed => return,
            Phase::Uninitialized => None,
            Phase::Initializing(session) | Phase::Ready(session) | Phase::Failed(session) => {
                Some(session)
            }
        };

        if let Some(session) = session {
            session.bridge.destroy();
        }
        *self.inner.context.write() = None;
        self.inner.subscribers.lock().clear();

        info!(app_id = %self.inner.config.app_id, "Mini-app destroyed");
    }
}

// ============================================================================
// MiniApp - Commands
// ============================================================================

impl MiniApp {
    /// Returns the correlator of a ready session.
    fn correlator(&self) -> Result<Correlator> {
        match &*self.inner.phase.lock() {
            Phase::Ready(session) => Ok(session.correlator.clone()),
            Phase::Destroyed => Err(Error::Destroyed),
            _ => Err(Error::NotInitialized),
        }
    }

    /// Invokes a typed command.
    ///
    /// # Errors
    ///
    /// - [`Error::NotInitialized`] unless the session is ready
    /// - [`Error::Destroyed`] if the session is, or becomes, destroyed
    /// - [`Error::RequestTimeout`] if the host does not answer in time
    /// - [`Error::Json`] if the result does not fit `C::Output`
    pub async fn invoke<C: Command>(&self, command: &C) -> Result<C::Output> {
        self.correlator()?.call(command).await
    }

    /// Invokes a command by name and returns the raw result payload.
    ///
    /// # Errors
    ///
    /// Same as [`invoke`](Self::invoke), without the decoding step.
    pub async fn invoke_raw(&self, command: &str, payload: Option<Value>) -> Result<Option<Value>> {
        self.correlator()?.invoke(command, payload).await
    }
}

// ============================================================================
// MiniApp - Events
// ============================================================================

impl MiniApp {
    /// Subscribes to a typed host event.
    ///
    /// Payloads that do not decode as `E::Payload` are logged and skipped.
    /// After destroy this registers nothing.
    pub fn on<E, F>(&self, handler: F) -> Unsubscribe
    where
        E: EventKind + 'static,
        F: Fn(E::Payload) + Send + Sync + 'static,
    {
        self.on_raw(E::TYPE, move |payload: &Value| {
            match serde_json::from_value::<E::Payload>(payload.clone()) {
                Ok(payload) => handler(payload),
                Err(e) => warn!(event_type = E::TYPE, error = %e, "Event payload skipped"),
            }
        })
    }

    /// Subscribes to a host event by name, receiving the raw payload.
    pub fn on_raw<F>(&self, event_type: impl Into<String>, handler: F) -> Unsubscribe
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        let event_type = event_type.into();
        let id = SubscriptionId::next();

        if self.state() == State::Destroyed {
            trace!(%event_type, "Subscription ignored: mini-app destroyed");
        } else {
            let handler: EventHandler = Arc::new(handler);
            self.inner
                .subscribers
                .lock()
                .entry(event_type.clone())
                .or_default()
                .push((id, handler));
            trace!(%event_type, %id, "Subscribed");
        }

        Unsubscribe {
            inner: Arc::downgrade(&self.inner),
            event_type,
            id,
        }
    }

    /// Creates the bridge listener for `"event"` envelopes.
    fn event_listener(&self) -> MessageHandler {
        let inner = Arc::downgrade(&self.inner);
        Arc::new(move |envelope: &Envelope| {
            if let Some(inner) = inner.upgrade() {
                inner.route_event(envelope);
            }
        })
    }
}

// ============================================================================
// Inner - Event Routing
// ============================================================================

impl Inner {
    /// Merges `context:updated` into the snapshot, then notifies subscribers.
    fn route_event(&self, envelope: &Envelope) {
        let Some(event) = EventMessage::unpack(envelope.payload.as_ref()) else {
            trace!("Event dropped: payload has no event type");
            return;
        };

        if event.is_context_update() {
            self.merge_context(&event.payload);
        }
        self.dispatch(&event);
    }

    /// Replaces the snapshot with `current ⊕ update`.
    ///
    /// Each top-level key applies on its own; a key that does not fit is
    /// skipped. Without a snapshot (handshake not done) nothing is merged.
    fn merge_context(&self, payload: &Value) {
        let Some(fields) = payload.as_object() else {
            warn!("Context update not merged: payload is not an object");
            return;
        };

        let (update, rejected) = ContextUpdate::from_fields(fields);
        for (key, e) in &rejected {
            warn!(key = *key, error = %e, "Context update field skipped");
        }
        if update.is_empty() {
            return;
        }

        let mut snapshot = self.context.write();
        let merged = snapshot
            .as_deref()
            .map(|current| Arc::new(current.merged(&update)));

        match merged {
            Some(merged) => {
                *snapshot = Some(merged);
                debug!("Context updated");
            }
            None => trace!("Context update before handshake; not merged"),
        }
    }

    /// Calls every subscriber of the event, isolating panics.
    fn dispatch(&self, event: &EventMessage) {
        let handlers: Vec<EventHandler> = self
            .subscribers
            .lock()
            .get(&event.event_type)
            .map(|entry| entry.iter().map(|(_, h)| Arc::clone(h)).collect())
            .unwrap_or_default();

        trace!(event_type = %event.event_type, subscribers = handlers.len(), "Dispatching event");

        for handler in handlers {
            if catch_unwind(AssertUnwindSafe(|| handler(&event.payload))).is_err() {
                warn!(event_type = %event.event_type, "Event subscriber panicked");
            }
        }
    }

    /// Removes one subscriber.
    fn unsubscribe(&self, event_type: &str, id: SubscriptionId) -> bool {
        let mut subscribers = self.subscribers.lock();
        let Some(entry) = subscribers.get_mut(event_type) else {
            return false;
        };

        let before = entry.len();
        entry.retain(|(existing, _)| *existing != id);
        let removed = entry.len() != before;

        if entry.is_empty() {
            subscribers.remove(event_type);
        }
        removed
    }
}

// ============================================================================
// Unsubscribe
// ============================================================================

/// Handle returned by [`MiniApp::on`] and [`MiniApp::on_raw`].
///
/// Dropping the handle keeps the subscription; call
/// [`unsubscribe`](Self::unsubscribe) to end it.
#[derive(Debug)]
#[must_use = "dropping the handle keeps the subscription; call unsubscribe() to end it"]
pub struct Unsubscribe {
    inner: Weak<Inner>,
    event_type: String,
    id: SubscriptionId,
}

impl Unsubscribe {
    /// Returns the subscription identifier.
    #[inline]
    #[must_use]
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Ends the subscription.
    ///
    /// Returns `true` if it was still active.
    pub fn unsubscribe(self) -> bool {
        self.inner
            .upgrade()
            .is_some_and(|inner| inner.unsubscribe(&self.event_type, self.id))
    }
}

// ============================================================================
// Tests
// ============================================================================
