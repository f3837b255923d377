//! High-level browser control.
//!
//! [`Tab`] is the query engine: selector and text lookups, waiting,
//! script evaluation, navigation. [`Element`] is a handle to one node
//! of a document snapshot. The submodules carry the machinery both are
//! built from: snapshot traversal ([`node`]) and the shared polling
//! loop ([`wait`]).

pub mod element;
pub mod node;
pub mod tab;
pub mod wait;

pub use element::Element;
pub use tab::{FindOptions, Locator, Tab};
pub use wait::{POLL_INTERVAL, poll_until};
