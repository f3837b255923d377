//! Error types for the CDP driver.
//!
//! All fallible operations return [`Result<T>`] which uses [`Error`]:
//!
//! ```ignore
//! use cdp_driver::{Result, Tab};
//!
//! async fn example(tab: &Tab) -> Result<()> {
//!     let button = tab.wait_for(Locator::css("#submit"), Duration::from_secs(5)).await?;
//!     Ok(())
//! }
//! ```
//!
//! # Error Categories
//!
//! | Category | Variants |
//! |----------|----------|
//! | Connection | [`Error::Connection`], [`Error::ConnectionClosed`], [`Error::InvalidEndpoint`] |
//! | Protocol | [`Error::Protocol`], [`Error::RequestTimeout`] |
//! | Query | [`Error::NotFound`], [`Error::StaleNode`] |
//! | Script | [`Error::JsSyntax`], [`Error::JsException`] |
//! | External | [`Error::Io`], [`Error::Json`], [`Error::WebSocket`] |
//!
//! Soft lookups ([`select`](crate::Tab::select), [`find`](crate::Tab::find))
//! never raise on timeout; they return `None` or an empty vec. Only
//! [`wait_for`](crate::Tab::wait_for) escalates a missed deadline to
//! [`Error::NotFound`].

// ============================================================================
// Imports
// ============================================================================

use std::io::Error as IoError;
use std::result::Result as StdResult;

use thiserror::Error;
use tokio_tungstenite::tungstenite::Error as WsError;

use crate::identifiers::{BackendNodeId, RequestId};

// ============================================================================
// Result Alias
// ============================================================================

/// Result type alias using crate [`enum@Error`].
pub type Result<T> = StdResult<T, Error>;

// ============================================================================
// Error Enum
// ============================================================================

/// Main error type for the crate.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Connection Errors
    // ========================================================================
    /// WebSocket connection failed.
    #[error("Connection failed: {message}")]
    Connection {
        /// Description of the connection error.
        message: String,
    },

    /// Connection closed; every outstanding and subsequent command
    /// fails with this terminal error.
    #[error("Connection closed")]
    ConnectionClosed,

    /// The debugger endpoint URL could not be parsed or uses an
    /// unsupported scheme.
    #[error("Invalid debugger endpoint: {url}")]
    InvalidEndpoint {
        /// The rejected URL.
        url: String,
    },

    // ========================================================================
    // Protocol Errors
    // ========================================================================
    /// The remote side returned an error payload for a command.
    #[error("Protocol error {code}: {message}")]
    Protocol {
        /// Remote error code.
        code: i64,
        /// Remote error message.
        message: String,
    },

    /// A single command did not receive its reply in time.
    #[error("Request {request_id} timed out after {timeout_ms}ms")]
    RequestTimeout {
        /// The request ID that timed out.
        request_id: RequestId,
        /// Milliseconds waited before timeout.
        timeout_ms: u64,
    },

    // ========================================================================
    // Query Errors
    // ========================================================================
    /// A `wait_for` deadline passed without a match.
    ///
    /// Raised only by the assertion-style wait; soft lookups return
    /// `None`/empty instead.
    #[error("Not found within {timeout_ms}ms: {locator}")]
    NotFound {
        /// The selector or text that was awaited.
        locator: String,
        /// Milliseconds waited before giving up.
        timeout_ms: u64,
    },

    /// A node handle could not be re-resolved against the live tree.
    #[error("Stale node: backend id {backend_node_id}")]
    StaleNode {
        /// Backend ID of the node that disappeared.
        backend_node_id: BackendNodeId,
    },

    // ========================================================================
    // Script Errors
    // ========================================================================
    /// The remote side returned no response for an evaluation,
    /// which indicates the expression never compiled.
    #[error("JavaScript syntax error: expression produced no response")]
    JsSyntax,

    /// The remote side reported an exception during evaluation.
    #[error("JavaScript exception: {text}")]
    JsException {
        /// Exception summary from the browser.
        text: String,
        /// Exception value description, when the browser provided one.
        detail: Option<String>,
    },

    // ========================================================================
    // External Errors
    // ========================================================================
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] IoError),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] WsError),
}

// ============================================================================
// Error Constructors
// ============================================================================

impl Error {
    /// Creates a connection error.
    #[inline]
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Creates an invalid endpoint error.
    #[inline]
    pub fn invalid_endpoint(url: impl Into<String>) -> Self {
        Self::InvalidEndpoint { url: url.into() }
    }

    /// Creates a protocol error from a remote error payload.
    #[inline]
    pub fn protocol(code: i64, message: impl Into<String>) -> Self {
        Self::Protocol {
            code,
            message: message.into(),
        }
    }

    /// Creates a request timeout error.
    #[inline]
    pub fn request_timeout(request_id: RequestId, timeout_ms: u64) -> Self {
        Self::RequestTimeout {
            request_id,
            timeout_ms,
        }
    }

    /// Creates a not-found error for a missed `wait_for` deadline.
    #[inline]
    pub fn not_found(locator: impl Into<String>, timeout_ms: u64) -> Self {
        Self::NotFound {
            locator: locator.into(),
            timeout_ms,
        }
    }

    /// Creates a stale node error.
    #[inline]
    pub fn stale_node(backend_node_id: BackendNodeId) -> Self {
        Self::StaleNode { backend_node_id }
    }

    /// Creates a script exception error.
    #[inline]
    pub fn js_exception(text: impl Into<String>, detail: Option<String>) -> Self {
        Self::JsException {
            text: text.into(),
            detail,
        }
    }
}

// ============================================================================
// Error Predicates
// ============================================================================

impl Error {
    /// Returns `true` if this is a timeout error.
    #[inline]
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::RequestTimeout { .. } | Self::NotFound { .. })
    }

    /// Returns `true` if this is a connection error.
    #[inline]
    #[must_use]
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            Self::Connection { .. } | Self::ConnectionClosed | Self::WebSocket(_)
        )
    }

    /// Returns `true` if the remote side reported that a referenced
    /// node no longer exists.
    ///
    /// This is the trigger for the single stale-node refresh-and-retry
    /// in scoped queries.
    #[inline]
    #[must_use]
    pub fn is_node_not_found(&self) -> bool {
        match self {
            Self::Protocol { message, .. } => {
                message.to_lowercase().contains("could not find node")
            }
            Self::StaleNode { .. } => true,
            _ => false,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
