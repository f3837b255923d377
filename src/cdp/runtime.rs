//! Runtime domain commands and events.
//!
//! Script evaluation ([`Evaluate`]) and the remote object model it
//! returns. An evaluation reply carries either a [`RemoteObject`] or
//! [`ExceptionDetails`]; the query engine maps the latter onto
//! [`Error::JsException`](crate::Error::JsException).

// ============================================================================
// Imports
// ============================================================================

use serde::Deserialize;
use serde_json::{Map, Value, json};

use crate::error::{Error, Result};
use crate::identifiers::RemoteObjectId;
use crate::protocol::{Command, ProtocolEvent};

// ============================================================================
// RemoteObject
// ============================================================================

/// Mirror of a JavaScript value held by the browser.
///
/// Primitive results arrive in `value`; live objects arrive as an
/// `object_id` reference instead.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteObject {
    /// JavaScript type (`object`, `string`, `number`, ...).
    #[serde(rename = "type")]
    pub object_type: String,

    /// Subtype for objects (`array`, `null`, `promise`, ...).
    #[serde(default)]
    pub subtype: Option<String>,

    /// Serialized value, when returned by value.
    #[serde(default)]
    pub value: Option<Value>,

    /// Human-readable description.
    #[serde(default)]
    pub description: Option<String>,

    /// Reference to the live object, when not returned by value.
    #[serde(default)]
    pub object_id: Option<RemoteObjectId>,
}

// ============================================================================
// ExceptionDetails
// ============================================================================

/// Detail of an exception thrown during remote execution.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExceptionDetails {
    /// Exception summary, e.g. `Uncaught`.
    pub text: String,

    /// Line of the throwing statement.
    #[serde(default)]
    pub line_number: i64,

    /// Column of the throwing statement.
    #[serde(default)]
    pub column_number: i64,

    /// The thrown value.
    #[serde(default)]
    pub exception: Option<RemoteObject>,
}

impl ExceptionDetails {
    /// Returns the most specific description the browser provided.
    #[must_use]
    pub fn describe(&self) -> Option<String> {
        self.exception
            .as_ref()
            .and_then(|e| e.description.clone())
    }
}

// ============================================================================
// Evaluate
// ============================================================================

/// Evaluates a JavaScript expression in the page.
///
/// `Runtime.evaluate`
#[derive(Debug, Clone)]
pub struct Evaluate {
    /// Expression source text.
    pub expression: String,
    /// Whether to await a returned promise before replying.
    pub await_promise: bool,
    /// Whether to serialize the result by value.
    pub return_by_value: bool,
    /// Whether to evaluate with a user gesture active.
    pub user_gesture: bool,
    /// Whether to bypass CSP eval restrictions.
    pub allow_unsafe_eval_blocked_by_csp: bool,
}

impl Evaluate {
    /// Creates an evaluation with a user gesture, returning by value.
    #[inline]
    #[must_use]
    pub fn new(expression: impl Into<String>, await_promise: bool, return_by_value: bool) -> Self {
        Self {
            expression: expression.into(),
            await_promise,
            return_by_value,
            user_gesture: true,
            allow_unsafe_eval_blocked_by_csp: false,
        }
    }

    /// Allows evaluation even under a CSP that blocks `eval`.
    #[inline]
    #[must_use]
    pub fn bypassing_csp(mut self) -> Self {
        self.allow_unsafe_eval_blocked_by_csp = true;
        self
    }
}

/// Reply of [`Evaluate`]: a result object, plus exception detail when
/// the expression threw.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationReply {
    /// Evaluation result.
    pub result: RemoteObject,

    /// Present when remote execution threw.
    #[serde(default)]
    pub exception_details: Option<ExceptionDetails>,
}

impl Command for Evaluate {
    type Output = EvaluationReply;

    fn method(&self) -> &'static str {
        "Runtime.evaluate"
    }

    fn build_params(&self) -> Result<Option<Value>> {
        let mut params = Map::new();
        params.insert("expression".into(), json!(self.expression));
        params.insert("awaitPromise".into(), json!(self.await_promise));
        params.insert("returnByValue".into(), json!(self.return_by_value));
        params.insert("userGesture".into(), json!(self.user_gesture));
        if self.allow_unsafe_eval_blocked_by_csp {
            params.insert("allowUnsafeEvalBlockedByCSP".into(), json!(true));
        }
        Ok(Some(Value::Object(params)))
    }

    fn decode_reply(reply: Value) -> Result<EvaluationReply> {
        // An absent result object means the expression never compiled.
        if reply.get("result").is_none() {
            return Err(Error::JsSyntax);
        }
        Ok(serde_json::from_value(reply)?)
    }
}

// ============================================================================
// Events
// ============================================================================

/// An uncaught exception surfaced in the page.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExceptionThrown {
    /// Browser-side timestamp.
    pub timestamp: f64,

    /// Exception detail.
    pub exception_details: ExceptionDetails,
}

impl ProtocolEvent for ExceptionThrown {
    const METHOD: &'static str = "Runtime.exceptionThrown";
}

// ============================================================================
// Tests
// ============================================================================
