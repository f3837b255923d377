//! WebSocket transport implementation.
//!
//! Wraps a `tokio-tungstenite` stream into the [`Transport`] contract:
//! text frames pass through whole, control frames are absorbed, and a
//! close frame or stream end terminates the message stream.

// ============================================================================
// Imports
// ============================================================================

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, error, trace};
use url::Url;

use async_trait::async_trait;

use crate::error::{Error, Result};
use crate::transport::Transport;

// ============================================================================
// WebSocketTransport
// ============================================================================

/// WebSocket connection to a remote-debugging endpoint.
///
/// Created from a `ws://` or `wss://` debugger URL, typically the
/// per-target `webSocketDebuggerUrl` advertised by the browser.
#[derive(Debug)]
pub struct WebSocketTransport {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl WebSocketTransport {
    /// Connects to a debugger endpoint.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidEndpoint`] if the URL does not parse or is not
    ///   a WebSocket URL
    /// - [`Error::WebSocket`] if the handshake fails
    pub async fn connect(endpoint: &str) -> Result<Self> {
        let url = Url::parse(endpoint).map_err(|_| Error::invalid_endpoint(endpoint))?;
        if !matches!(url.scheme(), "ws" | "wss") {
            return Err(Error::invalid_endpoint(endpoint));
        }

        debug!(%url, "Connecting to debugger endpoint");
        let (stream, _) = connect_async(endpoint).await?;
        debug!(%url, "WebSocket connected");

        Ok(Self { stream })
    }

    /// Wraps an already-established WebSocket stream.
    #[must_use]
    pub fn from_stream(stream: WebSocketStream<MaybeTlsStream<TcpStream>>) -> Self {
        Self { stream }
    }
}

#[async_trait]
impl Transport for WebSocketTransport {
    async fn send(&mut self, text: String) -> Result<()> {
        trace!(len = text.len(), "Sending message");
        self.stream.send(Message::Text(text.into())).await?;
        Ok(())
    }

    async fn next(&mut self) -> Option<Result<String>> {
        loop {
            match self.stream.next().await {
                Some(Ok(Message::Text(text))) => {
                    trace!(len = text.len(), "Received message");
                    return Some(Ok(text.to_string()));
                }

                Some(Ok(Message::Close(_))) => {
                    debug!("WebSocket closed by remote");
                    return None;
                }

                // Absorb Binary, Ping, Pong, Frame
                Some(Ok(_)) => {}

                Some(Err(e)) => {
                    error!(error = %e, "WebSocket error");
                    return Some(Err(e.into()));
                }

                None => {
                    debug!("WebSocket stream ended");
                    return None;
                }
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_rejects_non_websocket_scheme() {
        let err = WebSocketTransport::connect("http://127.0.0.1:9222/json")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidEndpoint { .. }));
    }

    #[tokio::test]
    async fn test_rejects_unparseable_url() {
        let err = WebSocketTransport::connect("not a url").await.unwrap_err();
        assert!(matches!(err, Error::InvalidEndpoint { .. }));
    }
}
