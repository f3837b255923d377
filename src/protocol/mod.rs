//! Protocol message types and codec contracts.
//!
//! This module defines the wire format shared by every exchange with
//! the browser and the two-phase codec contract that lets
//! heterogeneous commands share one dispatch path.
//!
//! | Module | Description |
//! |--------|-------------|
//! | `command` | [`Command`] and [`ProtocolEvent`] traits |
//! | `message` | [`Request`], [`Reply`], [`EventMessage`] wire types |

// ============================================================================
// Submodules
// ============================================================================

/// Two-phase command and event contracts.
pub mod command;

/// Wire message types.
pub mod message;

// ============================================================================
// Re-exports
// ============================================================================

pub use command::{Command, ProtocolEvent};
pub use message::{ErrorPayload, EventMessage, Reply, Request};
