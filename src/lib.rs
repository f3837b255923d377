//! CDP driver - low-level browser control over the DevTools protocol.
//!
//! This library drives a browser tab through its remote-debugging
//! WebSocket endpoint, speaking the Chrome DevTools Protocol's JSON
//! framing directly.
//!
//! # Architecture
//!
//! Three layers, each unaware of the ones above it:
//!
//! - **Session**: one socket, one receive loop. Commands correlate to
//!   replies by a monotonic id; messages without an id are events and
//!   fan out to subscribed listeners.
//! - **Vocabulary**: typed commands and events for the `DOM`, `Page`,
//!   and `Runtime` domains, built on a two-phase codec (params out,
//!   reply back in).
//! - **Query engine**: [`Tab`] and [`Element`] turn raw snapshots into
//!   polling selector/text lookups with stale-node recovery.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::time::Duration;
//!
//! use cdp_driver::{Locator, Result, Tab};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     // Attach to a tab's remote-debugging endpoint
//!     let tab = Tab::attach("ws://127.0.0.1:9222/devtools/page/ABC").await?;
//!
//!     tab.goto("https://example.com").await?;
//!     let heading = tab.wait_for(&Locator::css("h1"), Duration::from_secs(10)).await?;
//!     println!("Heading: {}", heading.text());
//!
//!     let two = tab.evaluate("1 + 1", false).await?;
//!     println!("Arithmetic still works: {two}");
//!
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`browser`] | Query engine: [`Tab`], [`Element`] |
//! | [`cdp`] | Typed protocol vocabulary (`DOM`, `Page`, `Runtime`) |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`identifiers`] | Type-safe ID wrappers |
//! | [`protocol`] | Wire message types and the command codec |
//! | [`session`] | Command correlation and event demultiplexing |
//! | [`transport`] | WebSocket transport layer (internal) |

// ============================================================================
// Modules
// ============================================================================

/// Query engine: [`Tab`] and [`Element`].
///
/// Polling selector and text lookups over document snapshots, script
/// evaluation, navigation.
pub mod browser;

/// Typed protocol vocabulary.
///
/// Commands and events for the `DOM`, `Page`, and `Runtime` domains.
pub mod cdp;

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Type-safe identifiers for protocol entities.
///
/// Newtype wrappers prevent mixing incompatible IDs at compile time.
pub mod identifiers;

/// Wire message types and the two-phase command codec.
pub mod protocol;

/// Protocol session over one socket.
///
/// Command/reply correlation, event fan-out, shutdown semantics.
pub mod session;

/// WebSocket transport layer.
///
/// Internal module handling the socket and its framing.
pub mod transport;

#[cfg(test)]
pub(crate) mod testing;

// ============================================================================
// Re-exports
// ============================================================================

// Query engine types
pub use browser::{Element, FindOptions, Locator, Tab};

// Error types
pub use error::{Error, Result};

// Identifier types
pub use identifiers::{
    BackendNodeId, ListenerId, NodeId, RemoteObjectId, RequestId, SearchId,
};

// Protocol types
pub use protocol::{Command, ProtocolEvent};

// Session types
pub use session::Session;

// Transport types
pub use transport::Transport;
