//! Wire message types.
//!
//! The debugger speaks whole JSON messages over one duplex socket:
//!
//! | Message | Direction | Shape |
//! |---------|-----------|-------|
//! | [`Request`] | client → browser | `{id, method, params?}` |
//! | [`Reply`] (success) | browser → client | `{id, result}` |
//! | [`Reply`] (error) | browser → client | `{id, error: {code, message}}` |
//! | [`EventMessage`] | browser → client | `{method, params}` (no id) |

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::identifiers::RequestId;

// ============================================================================
// Request
// ============================================================================

/// A command request from the client to the browser.
///
/// `params` is omitted from the serialized form when the command
/// carries none; it is never emitted as `null`.
#[derive(Debug, Clone, Serialize)]
pub struct Request {
    /// Correlation ID, monotonic per session.
    pub id: RequestId,

    /// Method in `Domain.method` format.
    pub method: String,

    /// Command parameters.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl Request {
    /// Creates a new request.
    #[inline]
    #[must_use]
    pub fn new(id: RequestId, method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            id,
            method: method.into(),
            params,
        }
    }
}

// ============================================================================
// Reply
// ============================================================================

/// A reply from the browser to a previously issued request.
///
/// Carries either `result` or `error`, keyed by the request `id`.
#[derive(Debug, Clone, Deserialize)]
pub struct Reply {
    /// Matches the request `id`.
    pub id: RequestId,

    /// Result payload (success replies).
    #[serde(default)]
    pub result: Option<Value>,

    /// Error payload (error replies).
    #[serde(default)]
    pub error: Option<ErrorPayload>,
}

impl Reply {
    /// Returns `true` if this reply carries an error payload.
    #[inline]
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    /// Extracts the result value, converting an error payload into
    /// [`Error::Protocol`].
    pub fn into_result(self) -> Result<Value> {
        match self.error {
            Some(err) => Err(Error::protocol(err.code, err.message)),
            None => Ok(self.result.unwrap_or(Value::Null)),
        }
    }
}

// ============================================================================
// ErrorPayload
// ============================================================================

/// Remote error payload inside an error reply.
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorPayload {
    /// Remote error code.
    #[serde(default)]
    pub code: i64,

    /// Remote error message.
    #[serde(default)]
    pub message: String,
}

// ============================================================================
// EventMessage
// ============================================================================

/// An unsolicited event notification from the browser.
///
/// Distinguished from a [`Reply`] by carrying a `method` and no `id`.
#[derive(Debug, Clone, Deserialize)]
pub struct EventMessage {
    /// Event name in `Domain.event` format.
    pub method: String,

    /// Event payload.
    #[serde(default)]
    pub params: Value,
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_serialization() {
        let request = Request::new(
            RequestId::new(1),
            "DOM.querySelector",
            Some(json!({"nodeId": 4, "selector": "a[href]"})),
        );
        let json = serde_json::to_string(&request).expect("serialize");

        assert!(json.contains(r#""id":1"#));
        assert!(json.contains("DOM.querySelector"));
        assert!(json.contains(r#""nodeId":4"#));
    }

    #[test]
    fn test_request_omits_empty_params() {
        let request = Request::new(RequestId::new(2), "DOM.disable", None);
        let json = serde_json::to_string(&request).expect("serialize");

        assert!(!json.contains("params"));
        assert!(!json.contains("null"));
    }

    #[test]
    fn test_success_reply() {
        let reply: Reply =
            serde_json::from_str(r#"{"id": 3, "result": {"nodeId": 11}}"#).expect("parse");
        assert!(!reply.is_error());

        let value = reply.into_result().expect("success");
        assert_eq!(value["nodeId"], 11);
    }

    #[test]
    fn test_error_reply() {
        let reply: Reply = serde_json::from_str(
            r#"{"id": 4, "error": {"code": -32000, "message": "Could not find node with given id"}}"#,
        )
        .expect("parse");
        assert!(reply.is_error());

        let err = reply.into_result().unwrap_err();
        assert!(err.is_node_not_found());
    }

    #[test]
    fn test_event_message() {
        let event: EventMessage =
            serde_json::from_str(r#"{"method": "Page.loadEventFired", "params": {"timestamp": 1.5}}"#)
                .expect("parse");
        assert_eq!(event.method, "Page.loadEventFired");
        assert_eq!(event.params["timestamp"], 1.5);
    }

    #[test]
    fn test_event_without_params() {
        let event: EventMessage =
            serde_json::from_str(r#"{"method": "DOM.documentUpdated"}"#).expect("parse");
        assert_eq!(event.method, "DOM.documentUpdated");
        assert!(event.params.is_null());
    }
}
