//! Per-domain command and event vocabulary.
//!
//! Each entry follows the two-phase [`Command`](crate::protocol::Command)
//! contract: a pure builder from typed inputs to a params payload, and
//! a pure decoder from the raw reply payload to a typed result. Events
//! implement [`ProtocolEvent`](crate::protocol::ProtocolEvent): one
//! decode function per event name. The session depends only on those
//! contracts, never on the shapes defined here.
//!
//! | Domain | Commands |
//! |--------|----------|
//! | [`dom`] | document snapshots, selector matching, text search |
//! | [`runtime`] | script evaluation, remote objects |
//! | [`page`] | navigation, screenshots |

// ============================================================================
// Submodules
// ============================================================================

/// DOM domain: snapshots, selectors, text search.
pub mod dom;

/// Page domain: navigation and screenshots.
pub mod page;

/// Runtime domain: script evaluation.
pub mod runtime;
