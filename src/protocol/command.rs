//! Two-phase command and event contracts.
//!
//! Every protocol command is a two-phase unit:
//!
//! 1. **Build**: produce a JSON params payload from validated, typed
//!    inputs ([`Command::build_params`]). Unset optional fields are
//!    omitted, never serialized as `null`.
//! 2. **Decode**: turn the raw reply payload into a typed output
//!    ([`Command::decode_reply`]), or fail with a typed error.
//!
//! The session dispatches every command through this one shape and
//! stays agnostic of individual command vocabularies. Events follow a
//! one-function contract: [`ProtocolEvent`] decodes a raw params
//! payload into a typed record.

// ============================================================================
// Imports
// ============================================================================

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::Result;

// ============================================================================
// Command
// ============================================================================

/// A protocol command with typed parameters and a typed reply.
///
/// Implemented by every entry of the [`cdp`](crate::cdp) vocabulary.
/// The session only sees this contract, never the command's shape.
///
/// # Example
///
/// ```ignore
/// let doc = session.send(dom::GetDocument::full()).await?;
/// let id = session.send(dom::QuerySelector::new(doc.node_id, "a[href]")).await?;
/// ```
pub trait Command: Send {
    /// The decoded reply type: a scalar, an object, or an ordered
    /// sequence of typed objects.
    type Output;

    /// Method name in `Domain.method` format.
    fn method(&self) -> &'static str;

    /// Phase 1: builds the params payload.
    ///
    /// Returns `None` for commands without parameters so the field is
    /// omitted from the request entirely.
    fn build_params(&self) -> Result<Option<Value>>;

    /// Phase 2: decodes the raw reply payload into the typed output.
    fn decode_reply(reply: Value) -> Result<Self::Output>;
}

// ============================================================================
// ProtocolEvent
// ============================================================================

/// A typed, unsolicited event record.
///
/// One pure function per event name: the raw `params` payload decodes
/// into the implementing type via `serde`.
///
/// # Example
///
/// ```ignore
/// session.subscribe_event(|event: page::LoadEventFired| {
///     println!("loaded at {}", event.timestamp);
/// });
/// ```
pub trait ProtocolEvent: DeserializeOwned {
    /// Event name in `Domain.event` format.
    const METHOD: &'static str;
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Echo {
        text: String,
    }

    impl Command for Echo {
        type Output = String;

        fn method(&self) -> &'static str {
            "Test.echo"
        }

        fn build_params(&self) -> Result<Option<Value>> {
            Ok(Some(json!({ "text": self.text })))
        }

        fn decode_reply(reply: Value) -> Result<String> {
            Ok(reply["text"].as_str().unwrap_or_default().to_string())
        }
    }

    #[test]
    fn test_two_phase_contract() {
        let cmd = Echo {
            text: "hello".into(),
        };
        assert_eq!(cmd.method(), "Test.echo");

        let params = cmd.build_params().expect("build").expect("some params");
        assert_eq!(params["text"], "hello");

        let output = Echo::decode_reply(json!({"text": "hello"})).expect("decode");
        assert_eq!(output, "hello");
    }
}
