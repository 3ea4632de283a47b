//! Byte-moving collaborators beneath a [`crate::Session`].
//!
//! A transport moves whole frames and never inspects tags. End-of-stream is
//! reported as `Ok(None)` from `recv`.

use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::{self, Message as WsMessage};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, info};

use crate::error::TransportError;

/// Ordered, message-delimited byte carrier.
#[async_trait::async_trait]
pub trait Transport: Send {
    /// Write one frame as one transport message.
    async fn send(&mut self, frame: Vec<u8>) -> Result<(), TransportError>;

    /// Wait for the next inbound frame. `None` means the peer ended the stream.
    async fn recv(&mut self) -> Result<Option<Vec<u8>>, TransportError>;

    /// Shut the connection down. Closing an already-closed transport succeeds.
    async fn close(&mut self) -> Result<(), TransportError>;
}

// =============================================================================
// WEBSOCKET
// =============================================================================

/// WebSocket transport: one frame per binary message.
pub struct WsTransport<S = MaybeTlsStream<TcpStream>> {
    stream: WebSocketStream<S>,
}

impl WsTransport {
    /// Perform the client handshake against `url`.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Connect`] if the URL is rejected or the
    /// handshake fails.
    pub async fn connect(url: &str) -> Result<Self, TransportError> {
        let (stream, _) = connect_async(url)
            .await
            .map_err(|e| TransportError::Connect(Box::new(e)))?;
        info!(%url, "transport: websocket connected");
        Ok(Self { stream })
    }
}

impl<S> WsTransport<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Wrap a socket that has already completed the WebSocket upgrade.
    #[must_use]
    pub fn from_stream(stream: WebSocketStream<S>) -> Self {
        Self { stream }
    }
}

#[async_trait::async_trait]
impl<S> Transport for WsTransport<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    async fn send(&mut self, frame: Vec<u8>) -> Result<(), TransportError> {
        self.stream
            .send(WsMessage::Binary(frame.into()))
            .await
            .map_err(ws_error)
    }

    async fn recv(&mut self) -> Result<Option<Vec<u8>>, TransportError> {
        loop {
            let Some(msg) = self.stream.next().await else {
                return Ok(None);
            };
            match msg {
                Ok(WsMessage::Binary(bytes)) => return Ok(Some(bytes.to_vec())),
                Ok(WsMessage::Close(_)) => return Ok(None),
                Ok(other) => debug!(kind = ws_kind(&other), "transport: skipping non-binary message"),
                Err(tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed) => {
                    return Ok(None);
                }
                Err(e) => return Err(TransportError::WebSocket(Box::new(e))),
            }
        }
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        match self.stream.close(None).await {
            Ok(()) | Err(tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed) => Ok(()),
            Err(e) => Err(TransportError::WebSocket(Box::new(e))),
        }
    }
}

fn ws_error(error: tungstenite::Error) -> TransportError {
    match error {
        tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed => TransportError::Disconnected,
        other => TransportError::WebSocket(Box::new(other)),
    }
}

fn ws_kind(message: &WsMessage) -> &'static str {
    match message {
        WsMessage::Text(_) => "text",
        WsMessage::Binary(_) => "binary",
        WsMessage::Ping(_) => "ping",
        WsMessage::Pong(_) => "pong",
        WsMessage::Close(_) => "close",
        WsMessage::Frame(_) => "frame",
    }
}

// =============================================================================
// IN-MEMORY
// =============================================================================

/// In-memory transport; one end of a connected pair.
pub struct ChannelTransport {
    tx: Option<mpsc::UnboundedSender<Vec<u8>>>,
    rx: mpsc::UnboundedReceiver<Vec<u8>>,
}

impl ChannelTransport {
    /// Create two connected ends. Frames sent on one arrive in order on the other.
    #[must_use]
    pub fn pair() -> (Self, Self) {
        let (a_tx, b_rx) = mpsc::unbounded_channel();
        let (b_tx, a_rx) = mpsc::unbounded_channel();
        (
            Self { tx: Some(a_tx), rx: a_rx },
            Self { tx: Some(b_tx), rx: b_rx },
        )
    }
}

#[async_trait::async_trait]
impl Transport for ChannelTransport {
    async fn send(&mut self, frame: Vec<u8>) -> Result<(), TransportError> {
        let Some(tx) = &self.tx else {
            return Err(TransportError::Closed);
        };
        tx.send(frame).map_err(|_| TransportError::Disconnected)
    }

    async fn recv(&mut self) -> Result<Option<Vec<u8>>, TransportError> {
        Ok(self.rx.recv().await)
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.tx = None;
        self.rx.close();
        Ok(())
    }
}

#[cfg(test)]
#[path = "transport_test.rs"]
mod tests;
