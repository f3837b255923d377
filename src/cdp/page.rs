//! Page domain commands and events.
//!
//! Navigation ([`Navigate`], [`Reload`]) and viewport capture
//! ([`CaptureScreenshot`]). Screenshot replies decode to raw bytes;
//! where those bytes end up on disk is the caller's concern.

// ============================================================================
// Imports
// ============================================================================

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::Deserialize;
use serde_json::{Map, Value, json};

use crate::error::{Error, Result};
use crate::protocol::{Command, ProtocolEvent};

// ============================================================================
// Navigate
// ============================================================================

/// Navigates the page to a URL.
///
/// `Page.navigate`
#[derive(Debug, Clone)]
pub struct Navigate {
    /// Destination URL.
    pub url: String,
}

impl Navigate {
    /// Creates a navigation command.
    #[inline]
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

/// Reply of [`Navigate`].
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NavigateReply {
    /// Frame that navigated.
    pub frame_id: String,

    /// Set when navigation failed at the network layer.
    #[serde(default)]
    pub error_text: Option<String>,
}

impl Command for Navigate {
    type Output = NavigateReply;

    fn method(&self) -> &'static str {
        "Page.navigate"
    }

    fn build_params(&self) -> Result<Option<Value>> {
        Ok(Some(json!({ "url": self.url })))
    }

    fn decode_reply(reply: Value) -> Result<NavigateReply> {
        Ok(serde_json::from_value(reply)?)
    }
}

// ============================================================================
// Reload
// ============================================================================

/// Reloads the current page.
///
/// `Page.reload`
#[derive(Debug, Clone, Default)]
pub struct Reload {
    /// Whether to bypass the cache.
    pub ignore_cache: Option<bool>,
}

impl Command for Reload {
    type Output = ();

    fn method(&self) -> &'static str {
        "Page.reload"
    }

    fn build_params(&self) -> Result<Option<Value>> {
        let mut params = Map::new();
        if let Some(ignore_cache) = self.ignore_cache {
            params.insert("ignoreCache".into(), json!(ignore_cache));
        }
        Ok(Some(Value::Object(params)))
    }

    fn decode_reply(_reply: Value) -> Result<()> {
        Ok(())
    }
}

// ============================================================================
// Enable
// ============================================================================

/// Enables page event reporting for this session.
///
/// `Page.enable`
#[derive(Debug, Clone)]
pub struct Enable;

impl Command for Enable {
    type Output = ();

    fn method(&self) -> &'static str {
        "Page.enable"
    }

    fn build_params(&self) -> Result<Option<Value>> {
        Ok(None)
    }

    fn decode_reply(_reply: Value) -> Result<()> {
        Ok(())
    }
}

// ============================================================================
// CaptureScreenshot
// ============================================================================

/// Captures the page as an image.
///
/// `Page.captureScreenshot`. The reply decodes straight to the image
/// bytes; file naming and path resolution stay outside this crate.
#[derive(Debug, Clone)]
pub struct CaptureScreenshot {
    /// Image format, `png` or `jpeg`.
    pub format: Option<String>,
    /// Whether to capture beyond the viewport.
    pub capture_beyond_viewport: Option<bool>,
}

impl CaptureScreenshot {
    /// Full-page PNG capture.
    #[inline]
    #[must_use]
    pub fn png() -> Self {
        Self {
            format: Some("png".into()),
            capture_beyond_viewport: Some(true),
        }
    }
}

impl Command for CaptureScreenshot {
    type Output = Vec<u8>;

    fn method(&self) -> &'static str {
        "Page.captureScreenshot"
    }

    fn build_params(&self) -> Result<Option<Value>> {
        let mut params = Map::new();
        if let Some(ref format) = self.format {
            params.insert("format".into(), json!(format));
        }
        if let Some(capture) = self.capture_beyond_viewport {
            params.insert("captureBeyondViewport".into(), json!(capture));
        }
        Ok(Some(Value::Object(params)))
    }

    fn decode_reply(reply: Value) -> Result<Vec<u8>> {
        let data = reply
            .get("data")
            .and_then(|v| v.as_str())
            .ok_or_else(|| Error::protocol(0, "captureScreenshot reply missing data"))?;
        BASE64
            .decode(data)
            .map_err(|e| Error::protocol(0, format!("invalid screenshot payload: {e}")))
    }
}

// ============================================================================
// Events
// ============================================================================

/// The page finished loading.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadEventFired {
    /// Browser-side timestamp.
    pub timestamp: f64,
}

impl ProtocolEvent for LoadEventFired {
    const METHOD: &'static str = "Page.loadEventFired";
}

/// A frame committed a navigation.
#[derive(Debug, Clone, Deserialize)]
pub struct FrameNavigated {
    /// The navigated frame.
    pub frame: FrameInfo,
}

/// Identity of a navigated frame: only the fields consumers actually
/// need are exposed.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameInfo {
    /// Frame identifier.
    pub id: String,

    /// Committed URL.
    #[serde(default)]
    pub url: String,
}

impl ProtocolEvent for FrameNavigated {
    const METHOD: &'static str = "Page.frameNavigated";
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_navigate_roundtrip() {
        let params = Navigate::new("https://example.com")
            .build_params()
            .expect("build")
            .expect("params");
        assert_eq!(params["url"], "https://example.com");

        let reply =
            Navigate::decode_reply(json!({"frameId": "F1", "loaderId": "L1"})).expect("decode");
        assert_eq!(reply.frame_id, "F1");
        assert!(reply.error_text.is_none());
    }

    #[test]
    fn test_screenshot_decodes_bytes() {
        let encoded = BASE64.encode(b"not-a-real-png");
        let bytes = CaptureScreenshot::decode_reply(json!({"data": encoded})).expect("decode");
        assert_eq!(bytes, b"not-a-real-png");
    }

    #[test]
    fn test_screenshot_missing_data_is_protocol_error() {
        let err = CaptureScreenshot::decode_reply(json!({})).unwrap_err();
        assert!(matches!(err, Error::Protocol { .. }));
    }

    #[test]
    fn test_load_event_decodes() {
        let event: LoadEventFired =
            serde_json::from_value(json!({"timestamp": 3.25})).expect("decode");
        assert_eq!(event.timestamp, 3.25);
    }
}
