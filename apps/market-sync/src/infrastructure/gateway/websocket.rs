//! WebSocket Transport
//!
//! `tokio-tungstenite` adapter for the [`Transport`] port. Text and binary
//! frames are surfaced as strings; ping/pong is answered by tungstenite;
//! a close frame ends the connection.
//!
//! # Stream URL
//!
//! - Local: `ws://127.0.0.1:8000/ws/market`
//! - TLS: `wss://...` (rustls with webpki roots)

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt, future};
use tokio_tungstenite::tungstenite::Message;

use crate::application::ports::{Transport, TransportConnection, TransportError};

/// WebSocket connection factory for the market gateway.
#[derive(Debug, Clone)]
pub struct WebSocketTransport {
    url: String,
}

impl WebSocketTransport {
    /// Create a transport for a `ws://` or `wss://` URL.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

#[async_trait]
impl Transport for WebSocketTransport {
    async fn open(&self) -> Result<TransportConnection, TransportError> {
        tracing::info!(url = %self.url, "Connecting to market gateway");

        let (ws_stream, _response) = tokio_tungstenite::connect_async(self.url.as_str())
            .await
            .map_err(|e| TransportError::ConnectFailed(e.to_string()))?;

        let (write, read) = ws_stream.split();

        let sink = write
            .sink_map_err(|e| TransportError::SendFailed(e.to_string()))
            .with(|text: String| future::ready(Ok::<_, TransportError>(Message::Text(text.into()))));

        let stream = read.filter_map(|msg| future::ready(inbound_frame(msg)));

        Ok(TransportConnection::new(sink, stream))
    }

    fn endpoint(&self) -> &str {
        &self.url
    }
}

/// Map a raw WebSocket message to an inbound text frame.
///
/// Control frames yield `None`; a close frame or a protocol error ends the
/// stream with an error.
fn inbound_frame(
    msg: Result<Message, tokio_tungstenite::tungstenite::Error>,
) -> Option<Result<String, TransportError>> {
    match msg {
        Ok(Message::Text(text)) => Some(Ok(text.as_str().to_owned())),
        Ok(Message::Binary(data)) => match String::from_utf8(data.to_vec()) {
            Ok(text) => Some(Ok(text)),
            Err(e) => {
                tracing::warn!(error = %e, "Dropping non UTF-8 binary frame");
                None
            }
        },
        Ok(Message::Close(frame)) => {
            tracing::info!(?frame, "Gateway sent close frame");
            Some(Err(TransportError::Closed))
        }
        Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_)) => None,
        Err(e) => Some(Err(TransportError::ReceiveFailed(e.to_string()))),
    }
}
