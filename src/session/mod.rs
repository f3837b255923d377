//! Protocol session: command correlation and event demultiplexing.
//!
//! A [`Session`] owns one transport and runs one receive loop. Any
//! number of callers may send commands concurrently; each suspends on
//! its own reply channel until the message with its id arrives, so
//! replies resolve strictly by id regardless of arrival order.
//! Messages without an id are events and fan out to every listener
//! subscribed to their method name, in subscription order.
//!
//! # Event Loop
//!
//! The spawned task multiplexes:
//!
//! - Incoming messages from the browser (replies, events)
//! - Outgoing requests from callers
//! - Shutdown, which fails every outstanding call with
//!   [`Error::ConnectionClosed`]
//!
//! All session state (pending-call table, listener registry) is behind
//! short-lived locks touched only from this loop and from registry
//! mutations; listener callbacks run outside the registry lock so a
//! listener may subscribe or unsubscribe from within its own
//! invocation.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use serde_json::{Value, from_str, to_string};
use tokio::sync::{mpsc, oneshot};
use tokio::time::timeout;
use tracing::{debug, trace, warn};

use crate::error::{Error, Result};
use crate::identifiers::{ListenerId, RequestId};
use crate::protocol::{Command, EventMessage, ProtocolEvent, Reply, Request};
use crate::transport::{Transport, WebSocketTransport};

// ============================================================================
// Constants
// ============================================================================

/// Safety cap on any single in-flight command.
const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(30);

// ============================================================================
// Types
// ============================================================================

/// Map of request IDs to reply channels.
type PendingMap = FxHashMap<RequestId, oneshot::Sender<Result<Reply>>>;

/// Event listener callback type.
pub type EventCallback = Arc<dyn Fn(&Value) + Send + Sync>;

/// One subscribed listener.
struct EventListener {
    id: ListenerId,
    callback: EventCallback,
}

/// Map of event method names to ordered listener lists.
type ListenerMap = FxHashMap<String, Vec<EventListener>>;

// ============================================================================
// SessionCommand
// ============================================================================

/// Internal commands for the event loop.
enum SessionCommand {
    /// Send a request and resolve the reply channel when its id matches.
    Send {
        request: Request,
        reply_tx: oneshot::Sender<Result<Reply>>,
    },
    /// Remove a timed-out pending entry.
    RemovePending(RequestId),
    /// Shutdown the session.
    Shutdown,
}

// ============================================================================
// Session
// ============================================================================

/// A protocol session over one persistent duplex socket.
///
/// Cheap to clone; all clones share the same transport, pending-call
/// table, and listener registry.
///
/// # Example
///
/// ```ignore
/// let session = Session::connect("ws://127.0.0.1:9222/devtools/page/ABC").await?;
/// let doc = session.send(dom::GetDocument::full()).await?;
/// ```
pub struct Session {
    /// Channel into the event loop.
    command_tx: mpsc::UnboundedSender<SessionCommand>,
    /// Pending-call table (shared with the event loop).
    pending: Arc<Mutex<PendingMap>>,
    /// Listener registry (shared with the event loop).
    listeners: Arc<Mutex<ListenerMap>>,
    /// Monotonic request id source.
    next_request_id: Arc<AtomicU64>,
    /// Monotonic listener id source.
    next_listener_id: Arc<AtomicU64>,
    /// Set once the session is closed; makes sends fail fast.
    closed: Arc<AtomicBool>,
}

impl Clone for Session {
    fn clone(&self) -> Self {
        Self {
            command_tx: self.command_tx.clone(),
            pending: Arc::clone(&self.pending),
            listeners: Arc::clone(&self.listeners),
            next_request_id: Arc::clone(&self.next_request_id),
            next_listener_id: Arc::clone(&self.next_listener_id),
            closed: Arc::clone(&self.closed),
        }
    }
}

// ============================================================================
// Session - Construction
// ============================================================================

impl Session {
    /// Creates a session over an established transport.
    ///
    /// Spawns the receive loop task internally.
    pub fn new<T: Transport + 'static>(transport: T) -> Self {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let pending: Arc<Mutex<PendingMap>> = Arc::new(Mutex::new(PendingMap::default()));
        let listeners: Arc<Mutex<ListenerMap>> = Arc::new(Mutex::new(ListenerMap::default()));
        let closed = Arc::new(AtomicBool::new(false));

        tokio::spawn(Self::run_event_loop(
            transport,
            command_rx,
            Arc::clone(&pending),
            Arc::clone(&listeners),
            Arc::clone(&closed),
        ));

        Self {
            command_tx,
            pending,
            listeners,
            next_request_id: Arc::new(AtomicU64::new(1)),
            next_listener_id: Arc::new(AtomicU64::new(1)),
            closed,
        }
    }

    /// Connects to a remote-debugging WebSocket endpoint.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidEndpoint`] for a malformed URL
    /// - [`Error::WebSocket`] if the handshake fails
    pub async fn connect(endpoint: &str) -> Result<Self> {
        let transport = WebSocketTransport::connect(endpoint).await?;
        Ok(Self::new(transport))
    }
}

// ============================================================================
// Session - Commands
// ============================================================================

impl Session {
    /// Sends a typed command and decodes its reply.
    ///
    /// Phase 1 builds the params payload, phase 2 decodes the raw
    /// reply; the session itself stays agnostic of the command shape.
    ///
    /// # Errors
    ///
    /// - [`Error::Protocol`] if the browser returned an error payload
    /// - [`Error::ConnectionClosed`] if the session is closed
    /// - [`Error::RequestTimeout`] if no reply arrives in time
    pub async fn send<C: Command>(&self, command: C) -> Result<C::Output> {
        let params = command.build_params()?;
        let raw = self.send_raw(command.method(), params).await?;
        C::decode_reply(raw)
    }

    /// Sends a raw command and returns the raw result payload.
    ///
    /// Escape hatch for methods outside the built-in vocabulary.
    pub async fn send_raw(&self, method: &str, params: Option<Value>) -> Result<Value> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(Error::ConnectionClosed);
        }

        let id = RequestId::new(self.next_request_id.fetch_add(1, Ordering::SeqCst));
        let request = Request::new(id, method, params);

        let (reply_tx, reply_rx) = oneshot::channel();
        self.command_tx
            .send(SessionCommand::Send { request, reply_tx })
            .map_err(|_| Error::ConnectionClosed)?;

        match timeout(DEFAULT_COMMAND_TIMEOUT, reply_rx).await {
            Ok(Ok(reply)) => reply?.into_result(),
            Ok(Err(_)) => Err(Error::ConnectionClosed),
            Err(_) => {
                // Timed out; clean up the pending entry.
                let _ = self.command_tx.send(SessionCommand::RemovePending(id));
                Err(Error::request_timeout(
                    id,
                    DEFAULT_COMMAND_TIMEOUT.as_millis() as u64,
                ))
            }
        }
    }

    /// Returns the number of in-flight requests.
    #[inline]
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }

    /// Returns `true` once the session has been closed.
    #[inline]
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Closes the session.
    ///
    /// Fails every outstanding call with [`Error::ConnectionClosed`],
    /// stops the receive loop, and makes every subsequent send fail
    /// immediately with the same error.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        let _ = self.command_tx.send(SessionCommand::Shutdown);
    }
}

// ============================================================================
// Session - Events
// ============================================================================

impl Session {
    /// Subscribes a listener to an event method name.
    ///
    /// All listeners for a name are invoked for every dispatched
    /// occurrence, in subscription order. A listener may subscribe or
    /// unsubscribe (itself included) from within its own invocation.
    pub fn subscribe<F>(&self, method: impl Into<String>, listener: F) -> ListenerId
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        let id = ListenerId::new(self.next_listener_id.fetch_add(1, Ordering::SeqCst));
        let mut listeners = self.listeners.lock();
        listeners.entry(method.into()).or_default().push(EventListener {
            id,
            callback: Arc::new(listener),
        });
        id
    }

    /// Subscribes a typed listener via the event's decode contract.
    ///
    /// Payloads that fail to decode are logged and dropped.
    pub fn subscribe_event<E, F>(&self, listener: F) -> ListenerId
    where
        E: ProtocolEvent,
        F: Fn(E) + Send + Sync + 'static,
    {
        self.subscribe(E::METHOD, move |params: &Value| {
            match serde_json::from_value::<E>(params.clone()) {
                Ok(event) => listener(event),
                Err(e) => warn!(method = E::METHOD, error = %e, "Undecodable event payload"),
            }
        })
    }

    /// Removes a listener from an event method name.
    ///
    /// Returns `true` if the listener was present.
    pub fn unsubscribe(&self, method: &str, id: ListenerId) -> bool {
        let mut listeners = self.listeners.lock();
        let Some(list) = listeners.get_mut(method) else {
            return false;
        };
        let before = list.len();
        list.retain(|l| l.id != id);
        let removed = list.len() < before;
        if list.is_empty() {
            listeners.remove(method);
        }
        removed
    }
}

// ============================================================================
// Session - Event Loop
// ============================================================================

impl Session {
    /// Receive loop handling transport I/O.
    async fn run_event_loop<T: Transport>(
        mut transport: T,
        mut command_rx: mpsc::UnboundedReceiver<SessionCommand>,
        pending: Arc<Mutex<PendingMap>>,
        listeners: Arc<Mutex<ListenerMap>>,
        closed: Arc<AtomicBool>,
    ) {
        loop {
            tokio::select! {
                // Incoming messages from the browser
                message = transport.next() => {
                    match message {
                        Some(Ok(text)) => {
                            Self::handle_incoming_message(&text, &pending, &listeners);
                        }

                        Some(Err(e)) => {
                            warn!(error = %e, "Transport error");
                            break;
                        }

                        None => {
                            debug!("Transport stream ended");
                            break;
                        }
                    }
                }

                // Requests from callers
                command = command_rx.recv() => {
                    match command {
                        Some(SessionCommand::Send { request, reply_tx }) => {
                            Self::handle_send_command(
                                request,
                                reply_tx,
                                &mut transport,
                                &pending,
                            ).await;
                        }

                        Some(SessionCommand::RemovePending(request_id)) => {
                            pending.lock().remove(&request_id);
                            debug!(%request_id, "Removed timed-out pending call");
                        }

                        Some(SessionCommand::Shutdown) => {
                            debug!("Shutdown command received");
                            break;
                        }

                        None => {
                            debug!("Command channel closed");
                            break;
                        }
                    }
                }
            }
        }

        closed.store(true, Ordering::SeqCst);
        Self::fail_pending_calls(&pending);

        debug!("Receive loop terminated");
    }

    /// Routes one incoming text message.
    ///
    /// Messages with an `id` resolve the matching pending call;
    /// messages with a `method` and no `id` dispatch to listeners.
    /// Anything else is logged and dropped, never fatal.
    fn handle_incoming_message(
        text: &str,
        pending: &Arc<Mutex<PendingMap>>,
        listeners: &Arc<Mutex<ListenerMap>>,
    ) {
        if let Ok(reply) = from_str::<Reply>(text) {
            let tx = pending.lock().remove(&reply.id);

            match tx {
                Some(tx) => {
                    let _ = tx.send(Ok(reply));
                }
                None => warn!(id = %reply.id, "Reply for unknown request"),
            }

            return;
        }

        if let Ok(event) = from_str::<EventMessage>(text) {
            Self::dispatch_event(&event, listeners);
            return;
        }

        warn!(text = %text, "Failed to parse incoming message");
    }

    /// Fans an event out to every listener for its method.
    ///
    /// The callback list is snapshotted before invocation so listeners
    /// can mutate the registry while dispatch is in flight.
    fn dispatch_event(event: &EventMessage, listeners: &Arc<Mutex<ListenerMap>>) {
        let callbacks: Vec<EventCallback> = {
            let listeners = listeners.lock();
            match listeners.get(&event.method) {
                Some(list) => list.iter().map(|l| Arc::clone(&l.callback)).collect(),
                None => {
                    trace!(method = %event.method, "Event without listeners dropped");
                    return;
                }
            }
        };

        for callback in callbacks {
            callback(&event.params);
        }
    }

    /// Registers the pending call, then writes the request.
    async fn handle_send_command<T: Transport>(
        request: Request,
        reply_tx: oneshot::Sender<Result<Reply>>,
        transport: &mut T,
        pending: &Arc<Mutex<PendingMap>>,
    ) {
        let request_id = request.id;

        let text = match to_string(&request) {
            Ok(t) => t,
            Err(e) => {
                let _ = reply_tx.send(Err(Error::Json(e)));
                return;
            }
        };

        // Register before writing so a fast reply cannot race the entry.
        pending.lock().insert(request_id, reply_tx);

        if let Err(e) = transport.send(text).await
            && let Some(tx) = pending.lock().remove(&request_id)
        {
            let _ = tx.send(Err(Error::connection(e.to_string())));
        }

        trace!(%request_id, method = %request.method, "Request sent");
    }

    /// Fails every outstanding call with the terminal closed error.
    fn fail_pending_calls(pending: &Arc<Mutex<PendingMap>>) {
        let drained: Vec<_> = pending.lock().drain().collect();
        let count = drained.len();

        for (_, tx) in drained {
            let _ = tx.send(Err(Error::ConnectionClosed));
        }

        if count > 0 {
            debug!(count, "Failed pending calls on shutdown");
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    use crate::testing::harness;

    fn request_id(raw: &str) -> u64 {
        let value: Value = from_str(raw).expect("request json");
        value["id"].as_u64().expect("request id")
    }

    #[tokio::test]
    async fn test_concurrent_sends_resolve_by_id_out_of_order() {
        let (session, browser_tx, mut browser_rx) = harness();

        let remote = tokio::spawn(async move {
            let mut ids = Vec::new();
            for _ in 0..3 {
                ids.push(request_id(&browser_rx.recv().await.expect("request")));
            }
            // Reply in reverse arrival order.
            for id in ids.iter().rev() {
                let reply = json!({"id": id, "result": {"echo": id}}).to_string();
                browser_tx.send(reply).expect("inject reply");
            }
        });

        let (a, b, c) = tokio::join!(
            session.send_raw("Test.a", None),
            session.send_raw("Test.b", None),
            session.send_raw("Test.c", None),
        );
        remote.await.expect("remote task");

        let echoes: Vec<u64> = [a, b, c]
            .into_iter()
            .map(|r| r.expect("resolved")["echo"].as_u64().expect("echo"))
            .collect();

        // Each caller got the reply for its own id, arrival order aside.
        assert_eq!(echoes, vec![1, 2, 3]);
        assert_eq!(session.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_error_reply_surfaces_protocol_error() {
        let (session, browser_tx, mut browser_rx) = harness();

        let remote = tokio::spawn(async move {
            let id = request_id(&browser_rx.recv().await.expect("request"));
            let reply = json!({
                "id": id,
                "error": {"code": -32000, "message": "Could not find node with given id"}
            })
            .to_string();
            browser_tx.send(reply).expect("inject reply");
        });

        let err = session
            .send_raw("DOM.querySelector", Some(json!({"nodeId": 1, "selector": "p"})))
            .await
            .unwrap_err();
        remote.await.expect("remote task");

        assert!(matches!(err, Error::Protocol { code: -32000, .. }));
        assert!(err.is_node_not_found());
    }

    #[tokio::test]
    async fn test_event_fanout_in_subscription_order() {
        let (session, browser_tx, _browser_rx) = harness();

        let (seen_tx, mut seen_rx) = mpsc::unbounded_channel::<u32>();
        for tag in 1..=3 {
            let seen_tx = seen_tx.clone();
            session.subscribe("Page.loadEventFired", move |_params| {
                let _ = seen_tx.send(tag);
            });
        }

        for _ in 0..2 {
            browser_tx
                .send(json!({"method": "Page.loadEventFired", "params": {"timestamp": 0.0}}).to_string())
                .expect("inject event");
        }

        let mut seen = Vec::new();
        for _ in 0..6 {
            seen.push(seen_rx.recv().await.expect("delivery"));
        }
        assert_eq!(seen, vec![1, 2, 3, 1, 2, 3]);
    }

    #[tokio::test]
    async fn test_listener_can_unsubscribe_itself_mid_dispatch() {
        let (session, browser_tx, _browser_rx) = harness();

        let (seen_tx, mut seen_rx) = mpsc::unbounded_channel::<&'static str>();
        let self_id = Arc::new(Mutex::new(None::<ListenerId>));

        let session_handle = session.clone();
        let self_id_handle = Arc::clone(&self_id);
        let once_tx = seen_tx.clone();
        let id = session.subscribe("DOM.documentUpdated", move |_params| {
            let _ = once_tx.send("once");
            if let Some(id) = *self_id_handle.lock() {
                session_handle.unsubscribe("DOM.documentUpdated", id);
            }
        });
        *self_id.lock() = Some(id);

        session.subscribe("DOM.documentUpdated", move |_params| {
            let _ = seen_tx.send("always");
        });

        for _ in 0..2 {
            browser_tx
                .send(json!({"method": "DOM.documentUpdated"}).to_string())
                .expect("inject event");
        }

        let mut seen = Vec::new();
        for _ in 0..3 {
            seen.push(seen_rx.recv().await.expect("delivery"));
        }
        // First occurrence reaches both; the second only the survivor.
        assert_eq!(seen, vec!["once", "always", "always"]);
    }

    #[tokio::test]
    async fn test_unknown_events_and_unknown_ids_are_dropped() {
        let (session, browser_tx, mut browser_rx) = harness();

        browser_tx
            .send(json!({"method": "Network.requestWillBeSent", "params": {}}).to_string())
            .expect("inject event");
        browser_tx
            .send(json!({"id": 999, "result": {}}).to_string())
            .expect("inject orphan reply");

        // The session keeps working afterwards.
        let remote = tokio::spawn(async move {
            let id = request_id(&browser_rx.recv().await.expect("request"));
            browser_tx
                .send(json!({"id": id, "result": {"ok": true}}).to_string())
                .expect("inject reply");
        });

        let result = session.send_raw("Test.ping", None).await.expect("resolved");
        remote.await.expect("remote task");
        assert_eq!(result["ok"], true);
    }

    #[tokio::test]
    async fn test_close_fails_pending_and_subsequent_sends() {
        let (session, _browser_tx, mut browser_rx) = harness();

        let in_flight = {
            let session = session.clone();
            tokio::spawn(async move { session.send_raw("Test.slow", None).await })
        };

        // Wait until the request is on the wire, then close.
        let _ = browser_rx.recv().await.expect("request");
        session.close();

        let err = in_flight.await.expect("task").unwrap_err();
        assert!(matches!(err, Error::ConnectionClosed));

        let err = session.send_raw("Test.after", None).await.unwrap_err();
        assert!(matches!(err, Error::ConnectionClosed));
        assert!(session.is_closed());
    }

    #[tokio::test]
    async fn test_transport_eof_fails_pending() {
        let (session, browser_tx, mut browser_rx) = harness();

        let in_flight = {
            let session = session.clone();
            tokio::spawn(async move { session.send_raw("Test.slow", None).await })
        };

        let _ = browser_rx.recv().await.expect("request");
        drop(browser_tx); // browser side goes away

        let err = in_flight.await.expect("task").unwrap_err();
        assert!(matches!(err, Error::ConnectionClosed));
    }

    #[tokio::test]
    async fn test_typed_event_subscription() {
        use serde::Deserialize;

        #[derive(Deserialize)]
        struct Fired {
            timestamp: f64,
        }

        impl ProtocolEvent for Fired {
            const METHOD: &'static str = "Page.loadEventFired";
        }

        let (session, browser_tx, _browser_rx) = harness();

        let (seen_tx, mut seen_rx) = mpsc::unbounded_channel::<f64>();
        session.subscribe_event(move |event: Fired| {
            let _ = seen_tx.send(event.timestamp);
        });

        browser_tx
            .send(json!({"method": "Page.loadEventFired", "params": {"timestamp": 12.5}}).to_string())
            .expect("inject event");

        assert_eq!(seen_rx.recv().await.expect("delivery"), 12.5);
    }
}
