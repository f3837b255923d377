//! Message transport layer.
//!
//! The transport delivers and accepts whole JSON text messages over a
//! persistent duplex socket. It owns no protocol semantics: request
//! correlation and event routing live in [`session`](crate::session).
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐                              ┌─────────────────┐
//! │  Session (Rust) │         WebSocket            │  Browser        │
//! │                 │◄────────────────────────────►│  (DevTools      │
//! │  receive loop   │   ws://host:port/devtools/   │   endpoint)     │
//! └─────────────────┘                              └─────────────────┘
//! ```
//!
//! The [`Transport`] trait keeps the session testable: production code
//! uses [`WebSocketTransport`], tests substitute a channel-backed mock.
//!
//! | Module | Description |
//! |--------|-------------|
//! | `connection` | WebSocket transport implementation |

// ============================================================================
// Imports
// ============================================================================

use async_trait::async_trait;

use crate::error::Result;

// ============================================================================
// Submodules
// ============================================================================

/// WebSocket transport implementation.
pub mod connection;

// ============================================================================
// Re-exports
// ============================================================================

pub use connection::WebSocketTransport;

// ============================================================================
// Transport
// ============================================================================

/// A duplex stream of whole JSON text messages.
///
/// Implementations must deliver messages in order and signal a closed
/// peer by returning `None` from [`next`](Transport::next).
#[async_trait]
pub trait Transport: Send {
    /// Sends one complete JSON message.
    async fn send(&mut self, text: String) -> Result<()>;

    /// Receives the next complete JSON message.
    ///
    /// Returns `None` once the peer has closed the stream; transport
    /// failures surface as `Some(Err(_))`.
    async fn next(&mut self) -> Option<Result<String>>;
}
