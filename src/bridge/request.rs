//! Request/result correlation.
//!
//! [`Bridge::send_request`] turns a fire-and-forget `send` into an awaitable
//! call:
//!
//! 1. Mint a fresh [`RequestId`]
//! 2. Store a oneshot sender in the correlation map
//! 3. Register a one-shot listener on `<type>:result`
//! 4. Send the request envelope
//! 5. Race the oneshot against the timeout
//!
//! Whoever removes the correlation entry first (a matching result, the
//! timeout, `destroy`, or the caller dropping the future) decides the
//! outcome; every later attempt finds nothing to complete. The listener is
//! removed on every path.

// ============================================================================
// Imports
// ============================================================================

use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use rustc_hash::FxHashMap;
use serde_json::Value;
use tokio::sync::oneshot;
use tokio::time::timeout;
use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::identifiers::RequestId;
use crate::protocol::{Envelope, result_type};

use super::{Bridge, MessageHandler, Shared};

// ============================================================================
// Types
// ============================================================================

/// Map of request IDs to waiting callers.
pub(crate) type CorrelationMap = FxHashMap<RequestId, PendingRequest>;

/// One in-flight correlated call.
pub(crate) struct PendingRequest {
    /// Type the request was sent with.
    message_type: String,
    /// Completes the caller's future.
    response_tx: oneshot::Sender<Result<Option<Value>>>,
    /// When the request was registered.
    sent_at: Instant,
}

// ============================================================================
// Bridge - Requests
// ============================================================================

impl Bridge {
    /// Sends a request and waits for the matching `<type>:result`.
    ///
    /// Resolves with the result envelope's payload (`None` if it carried
    /// none). Dropping the returned future cancels the request.
    ///
    /// # Arguments
    ///
    /// * `message_type` - Request type, e.g. `"command:close"`
    /// * `payload` - Request payload
    /// * `request_timeout` - Maximum time to wait for the result
    ///
    /// # Errors
    ///
    /// - [`Error::Destroyed`] if the bridge is, or becomes, destroyed
    /// - [`Error::RequestTimeout`] if no result arrives in time
    /// - [`Error::Transport`] / [`Error::Json`] if sending fails
    pub async fn send_request(
        &self,
        message_type: &str,
        payload: Option<Value>,
        request_timeout: Duration,
    ) -> Result<Option<Value>> {
        let request_id = RequestId::generate(message_type);
        let result_type = result_type(message_type);
        let (response_tx, response_rx) = oneshot::channel();

        {
            // Checked under the lock: `destroy` sets the flag before draining.
            let mut correlation = self.shared.correlation.lock();
            if self.is_destroyed() {
                return Err(Error::Destroyed);
            }
            correlation.insert(
                request_id.clone(),
                PendingRequest {
                    message_type: message_type.to_string(),
                    response_tx,
                    sent_at: Instant::now(),
                },
            );
        }

        let listener = result_listener(Arc::downgrade(&self.shared), request_id.clone());
        self.on(result_type.clone(), Arc::clone(&listener));

        let _guard = PendingGuard {
            bridge: self,
            request_id: request_id.clone(),
            result_type,
            listener,
        };

        self.send(message_type, payload, Some(request_id.clone()))?;
        trace!(%request_id, message_type, "Request sent");

        match timeout(request_timeout, response_rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(closed)) => Err(closed.into()),
            Err(_) => {
                let timeout_ms = u64::try_from(request_timeout.as_millis()).unwrap_or(u64::MAX);
                debug!(%request_id, message_type, timeout_ms, "Request timed out");
                Err(Error::request_timeout(request_id, message_type, timeout_ms))
            }
        }
    }
}

// ============================================================================
// Shared - Correlation
// ============================================================================

impl Shared {
    /// Completes the request `request_id` with `payload`.
    ///
    /// Returns `false` if the request already completed.
    fn complete(&self, request_id: &RequestId, payload: Option<Value>) -> bool {
        let Some(pending) = self.correlation.lock().remove(request_id) else {
            return false;
        };

        trace!(
            %request_id,
            message_type = %pending.message_type,
            elapsed_ms = pending.sent_at.elapsed().as_millis() as u64,
            "Request resolved"
        );
        let _ = pending.response_tx.send(Ok(payload));
        true
    }

    /// Fails every in-flight request with [`Error::Destroyed`].
    ///
    /// Returns how many were failed.
    pub(super) fn fail_pending(&self) -> usize {
        let pending: Vec<_> = self.correlation.lock().drain().collect();
        let count = pending.len();

        for (_, request) in pending {
            let _ = request.response_tx.send(Err(Error::Destroyed));
        }

        count
    }
}

// ============================================================================
// Listener
// ============================================================================

/// Builds the one-shot listener for `request_id`.
///
/// Holds the shared state weakly: the listener lives inside that state.
fn result_listener(shared: Weak<Shared>, request_id: RequestId) -> MessageHandler {
    Arc::new(move |envelope: &Envelope| {
        if envelope.request_id.as_ref() != Some(&request_id) {
            return;
        }

        if let Some(shared) = shared.upgrade() {
            shared.complete(&request_id, envelope.payload.clone());
        }
    })
}

// ============================================================================
// PendingGuard
// ============================================================================

/// Cleans up one request however its future ends.
struct PendingGuard<'a> {
    /// Bridge the request was sent on.
    bridge: &'a Bridge,
    /// Correlation entry to remove.
    request_id: RequestId,
    /// Type the listener is registered under.
    result_type: String,
    /// The one-shot listener.
    listener: MessageHandler,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.bridge.shared.correlation.lock().remove(&self.request_id);
        self.bridge.off(&self.result_type, &self.listener);
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use parking_lot::Mutex;
    use serde_json::json;
    use tokio_test::{assert_err, assert_ok};

    use crate::protocol::Source;
    use crate::transport::{MemoryChannel, RawMessage, Subscription, Transport};

    const HOST_ORIGIN: &str = "https://exode.ru";
    const APP_ORIGIN: &str = "https://quiz.exode.ru";

    /// App-side bridge plus a host-side bridge that records every request.
    struct Fixture {
        app: Bridge,
        host: Bridge,
        requests: Arc<Mutex<Vec<Envelope>>>,
    }

    fn fixture(request_type: &str) -> Fixture {
        let channel = MemoryChannel::new(HOST_ORIGIN, APP_ORIGIN);
        let app = Bridge::new(Arc::new(channel.app()), Source::MiniApp, HOST_ORIGIN);
        let host = Bridge::new(Arc::new(channel.host()), Source::Host, APP_ORIGIN);

        let requests = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&requests);
        host.on(
            request_type,
            Arc::new(move |envelope: &Envelope| sink.lock().push(envelope.clone())),
        );

        Fixture {
            app,
            host,
            requests,
        }
    }

    /// Host bridge that answers `request_type` immediately with `answer`.
    fn auto_responder(host: &Bridge, request_type: &str, answer: Value) {
        let responder = host.clone();
        host.on(
            request_type,
            Arc::new(move |envelope: &Envelope| {
                responder
                    .reply(envelope, Some(answer.clone()))
                    .expect("reply");
            }),
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_rejects_and_deregisters() {
        let fixture = fixture("ping");

        let err = fixture
            .app
            .send_request("ping", Some(json!({})), Duration::from_millis(50))
            .await
            .unwrap_err();

        assert!(err.is_timeout());
        assert!(matches!(err, Error::RequestTimeout { timeout_ms: 50, .. }));
        assert_eq!(fixture.app.listener_count("ping:result"), 0);
        assert_eq!(fixture.app.pending_count(), 0);
        assert_eq!(fixture.requests.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_resolves_with_matching_result() {
        let fixture = fixture("ping");
        auto_responder(&fixture.host, "ping", json!({"y": 2}));

        let result = fixture
            .app
            .send_request("ping", Some(json!({"x": 1})), Duration::from_secs(1))
            .await;

        assert_eq!(assert_ok!(result), Some(json!({"y": 2})));
        assert_eq!(fixture.app.listener_count("ping:result"), 0);

        let requests = fixture.requests.lock();
        assert_eq!(requests[0].payload, Some(json!({"x": 1})));
        assert!(requests[0].request_id.is_some());
    }

    #[tokio::test]
    async fn test_hand_written_result_frame_resolves() {
        let channel = MemoryChannel::new(HOST_ORIGIN, APP_ORIGIN);
        let app = Bridge::new(Arc::new(channel.app()), Source::MiniApp, "*");
        let host_port = channel.host();

        let request_id = Arc::new(Mutex::new(None));
        let sink = Arc::clone(&request_id);
        let _subscription: Subscription = host_port.subscribe(Arc::new(move |raw: &RawMessage| {
            *sink.lock() = raw.data["requestId"].as_str().map(str::to_string);
        }));

        let call = app.send_request("ping", Some(json!({"x": 1})), Duration::from_secs(1));
        tokio::pin!(call);

        // Drive the request until it is on the wire.
        assert!(
            tokio::time::timeout(Duration::from_millis(1), &mut call)
                .await
                .is_err()
        );

        let id = request_id.lock().clone().expect("request sent");
        host_port
            .post_message(
                json!({"type": "ping:result", "requestId": id, "payload": {"y": 2}, "source": "exode-host"}),
                "*",
            )
            .expect("post");

        assert_eq!(call.await.expect("resolved"), Some(json!({"y": 2})));
    }

    #[tokio::test]
    async fn test_concurrent_requests_never_cross_resolve() {
        let fixture = fixture("ping");
        let responder = fixture.host.clone();
        let requests = Arc::clone(&fixture.requests);

        let first = fixture
            .app
            .send_request("ping", Some(json!({"n": 1})), Duration::from_secs(5));
        let second = fixture
            .app
            .send_request("ping", Some(json!({"n": 2})), Duration::from_secs(5));

        let answer = async move {
            // Both requests are on the wire once the yield returns.
            while requests.lock().len() < 2 {
                tokio::task::yield_now().await;
            }

            // Answer in reverse order, echoing each request's own payload.
            let sent: Vec<Envelope> = requests.lock().clone();
            for request in sent.iter().rev() {
                responder
                    .reply(request, request.payload.clone())
                    .expect("reply");
            }
        };

        let (first, second, ()) = tokio::join!(first, second, answer);
        assert_eq!(first.expect("first"), Some(json!({"n": 1})));
        assert_eq!(second.expect("second"), Some(json!({"n": 2})));
        assert_eq!(fixture.app.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_result_with_foreign_id_is_ignored() {
        let fixture = fixture("ping");
        let responder = fixture.host.clone();
        fixture.host.on(
            "ping",
            Arc::new(move |envelope: &Envelope| {
                let mut forged = envelope.clone();
                forged.request_id = Some(RequestId::from("someone-else"));
                responder.reply(&forged, Some(json!("wrong"))).expect("reply");
                responder.reply(envelope, Some(json!("right"))).expect("reply");
            }),
        );

        let result = fixture
            .app
            .send_request("ping", None, Duration::from_secs(1))
            .await;
        assert_eq!(assert_ok!(result), Some(json!("right")));
    }

    #[tokio::test]
    async fn test_duplicate_result_has_no_effect() {
        let fixture = fixture("ping");
        let responder = fixture.host.clone();
        fixture.host.on(
            "ping",
            Arc::new(move |envelope: &Envelope| {
                responder.reply(envelope, Some(json!(1))).expect("reply");
                responder.reply(envelope, Some(json!(2))).expect("reply");
            }),
        );

        let result = fixture
            .app
            .send_request("ping", None, Duration::from_secs(1))
            .await;
        assert_eq!(assert_ok!(result), Some(json!(1)));
    }

    #[tokio::test]
    async fn test_destroy_rejects_pending_requests() {
        let fixture = fixture("ping");
        let app = fixture.app.clone();

        let call = fixture
            .app
            .send_request("ping", None, Duration::from_secs(30));
        let teardown = async move {
            while app.pending_count() == 0 {
                tokio::task::yield_now().await;
            }
            app.destroy();
        };

        let (result, ()) = tokio::join!(call, teardown);
        assert!(matches!(result, Err(Error::Destroyed)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_destroy_from_another_thread_never_times_out() {
        let fixture = fixture("ping");

        let calls: Vec<_> = (0..64)
            .map(|_| {
                let app = fixture.app.clone();
                tokio::spawn(async move {
                    app.send_request("ping", None, Duration::from_secs(30)).await
                })
            })
            .collect();

        let app = fixture.app.clone();
        tokio::spawn(async move { app.destroy() })
            .await
            .expect("destroy task");

        for call in calls {
            let result = tokio::time::timeout(Duration::from_secs(5), call)
                .await
                .expect("request settled before its own timeout")
                .expect("request task");
            assert!(matches!(result, Err(Error::Destroyed)));
        }
        assert_eq!(fixture.app.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_request_after_destroy_fails() {
        let fixture = fixture("ping");
        fixture.app.destroy();

        let result = fixture
            .app
            .send_request("ping", None, Duration::from_secs(1))
            .await;
        assert!(matches!(assert_err!(result), Error::Destroyed));
        assert!(fixture.requests.lock().is_empty());
    }

    #[tokio::test]
    async fn test_dropped_future_cleans_up() {
        let fixture = fixture("ping");

        {
            let call = fixture
                .app
                .send_request("ping", None, Duration::from_secs(30));
            tokio::pin!(call);
            let _ = tokio::time::timeout(Duration::from_millis(1), &mut call).await;
            assert_eq!(fixture.app.pending_count(), 1);
        }

        assert_eq!(fixture.app.pending_count(), 0);
        assert_eq!(fixture.app.listener_count("ping:result"), 0);
    }

    #[tokio::test]
    async fn test_transport_failure_surfaces_immediately() {
        let channel = MemoryChannel::new(HOST_ORIGIN, APP_ORIGIN);
        let app = Bridge::new(Arc::new(channel.app()), Source::MiniApp, "*");
        channel.close();

        let result = app.send_request("ping", None, Duration::from_secs(30)).await;
        assert!(matches!(result, Err(Error::Transport { .. })));
        assert_eq!(app.pending_count(), 0);
        assert_eq!(app.listener_count("ping:result"), 0);
    }
}
