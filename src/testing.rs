//! In-process doubles for the remote side of a session.
//!
//! Compiled for tests only. [`harness`] exposes the raw channel ends
//! so a test can inject arbitrary frames; [`scripted_session`] runs a
//! responder task that answers each outgoing request by method name,
//! which is what the query-engine tests build their fake browser from.

// ============================================================================
// Imports
// ============================================================================

use async_trait::async_trait;
use serde_json::{Value, json};
use tokio::sync::mpsc;

use crate::error::{Error, Result};
use crate::session::Session;
use crate::transport::Transport;

// ============================================================================
// MockTransport
// ============================================================================

/// Channel-backed transport: the test side plays the browser.
pub(crate) struct MockTransport {
    incoming: mpsc::UnboundedReceiver<String>,
    outgoing: mpsc::UnboundedSender<String>,
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&mut self, text: String) -> Result<()> {
        self.outgoing
            .send(text)
            .map_err(|_| Error::connection("mock peer gone"))
    }

    async fn next(&mut self) -> Option<Result<String>> {
        self.incoming.recv().await.map(Ok)
    }
}

/// Builds a session plus the browser-side channel ends.
pub(crate) fn harness() -> (
    Session,
    mpsc::UnboundedSender<String>,
    mpsc::UnboundedReceiver<String>,
) {
    let (to_session_tx, to_session_rx) = mpsc::unbounded_channel();
    let (from_session_tx, from_session_rx) = mpsc::unbounded_channel();
    let session = Session::new(MockTransport {
        incoming: to_session_rx,
        outgoing: from_session_tx,
    });
    (session, to_session_tx, from_session_rx)
}

// ============================================================================
// Scripted Session
// ============================================================================

/// What the scripted peer does with one request.
pub(crate) enum Scripted {
    /// Reply with a result payload.
    Result(Value),
    /// Reply with an error payload.
    Error { code: i64, message: String },
    /// Never reply.
    Silent,
}

impl Scripted {
    /// Error reply in the browser's wording for a vanished node.
    pub(crate) fn node_gone() -> Self {
        Self::Error {
            code: -32000,
            message: "Could not find node with given id".into(),
        }
    }
}

/// Spawns a session whose peer answers every request through the
/// responder, called with the request's method and params.
pub(crate) fn scripted_session<F>(mut respond: F) -> Session
where
    F: FnMut(&str, &Value) -> Scripted + Send + 'static,
{
    let (session, to_session_tx, mut from_session_rx) = harness();

    tokio::spawn(async move {
        while let Some(raw) = from_session_rx.recv().await {
            let request: Value = serde_json::from_str(&raw).expect("request json");
            let id = request["id"].as_u64().expect("request id");
            let method = request["method"].as_str().expect("request method");
            let params = request.get("params").cloned().unwrap_or(Value::Null);

            let reply = match respond(method, &params) {
                Scripted::Result(result) => json!({"id": id, "result": result}),
                Scripted::Error { code, message } => {
                    json!({"id": id, "error": {"code": code, "message": message}})
                }
                Scripted::Silent => continue,
            };

            if to_session_tx.send(reply.to_string()).is_err() {
                break;
            }
        }
    });

    session
}
