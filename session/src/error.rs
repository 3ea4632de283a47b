use tokio_tungstenite::tungstenite;

/// Failure of the underlying connection. Never retried locally.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The session or transport was already closed when an operation ran.
    #[error("connection is closed")]
    Closed,
    /// The peer went away while a frame was being written.
    #[error("peer disconnected")]
    Disconnected,
    /// The WebSocket handshake failed.
    #[error("websocket connect failed: {0}")]
    Connect(Box<tungstenite::Error>),
    /// The WebSocket connection failed after the handshake.
    #[error("websocket error: {0}")]
    WebSocket(Box<tungstenite::Error>),
    /// No frame arrived before the deadline.
    #[error("timed out waiting for frame")]
    Timeout,
}

/// Error surfaced by [`crate::Session`] operations.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    /// The peer sent a frame that does not decode.
    #[error("frame decode failed: {0}")]
    Decode(#[from] frames::DecodeError),
}
