//! Message-level view of one connection.
//!
//! LIFECYCLE
//! =========
//! 1. Construct over an established transport → `Open`
//! 2. `send` encodes one message into one transport write
//! 3. `recv` decodes one transport message into one message
//! 4. Sending or receiving `Close`, or the transport ending → `Closed`
//!
//! Once `Closed`, `send` and `recv` fail with [`TransportError::Closed`].
//! Decoding keeps no state between frames; the only memory a session has is
//! its [`ConnectionState`].

use std::time::Duration;

use frames::{DecodePolicy, Message, decode_frame_with, encode_frame};
use tracing::{debug, info, warn};

use crate::config::SessionConfig;
use crate::error::{SessionError, TransportError};
use crate::transport::{Transport, WsTransport};

/// Connection lifecycle. There is no way back from `Closed`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionState {
    Open,
    Closed,
}

pub struct Session<T> {
    transport: T,
    state: ConnectionState,
    transport_closed: bool,
    policy: DecodePolicy,
    close_on_malformed: bool,
    default_deadline: Duration,
}

impl Session<WsTransport> {
    /// Connect to `config.url` and open a session with the config's settings.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Connect`] if the handshake fails.
    pub async fn connect(config: &SessionConfig) -> Result<Self, TransportError> {
        let transport = WsTransport::connect(&config.url).await?;
        Ok(Self::with_config(transport, config))
    }
}

impl<T: Transport> Session<T> {
    /// Open a session over `transport` with default settings.
    #[must_use]
    pub fn new(transport: T) -> Self {
        Self::with_config(transport, &SessionConfig::default())
    }

    #[must_use]
    pub fn with_config(transport: T, config: &SessionConfig) -> Self {
        Self {
            transport,
            state: ConnectionState::Open,
            transport_closed: false,
            policy: config.decode_policy,
            close_on_malformed: config.close_on_malformed,
            default_deadline: config.recv_timeout,
        }
    }

    #[must_use]
    pub fn with_policy(mut self, policy: DecodePolicy) -> Self {
        self.policy = policy;
        self
    }

    #[must_use]
    pub fn with_close_on_malformed(mut self, enabled: bool) -> Self {
        self.close_on_malformed = enabled;
        self
    }

    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    #[must_use]
    pub fn is_open(&self) -> bool {
        self.state == ConnectionState::Open
    }

    /// Encode and send one message.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Closed`] once the session is closed, or the
    /// transport's error if the write fails (which also closes the session).
    pub async fn send(&mut self, message: &Message) -> Result<(), TransportError> {
        if !self.is_open() {
            return Err(TransportError::Closed);
        }

        let frame = encode_frame(message);
        debug!(tag = ?message.tag(), len = frame.len(), "session: send frame");
        if let Err(e) = self.transport.send(frame).await {
            warn!(error = %e, "session: send failed");
            self.mark_closed("send failed");
            return Err(e);
        }

        if message.is_close() {
            self.mark_closed("sent close");
        }
        Ok(())
    }

    /// Send messages in order, stopping at the first failure.
    ///
    /// # Errors
    ///
    /// Returns the first error from [`Session::send`].
    pub async fn send_all<'a, I>(&mut self, messages: I) -> Result<(), TransportError>
    where
        I: IntoIterator<Item = &'a Message>,
    {
        for message in messages {
            self.send(message).await?;
        }
        Ok(())
    }

    /// Receive and decode the next message.
    ///
    /// Returns `Ok(None)` when the transport ends the stream.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Closed`] once the session is closed,
    /// transport errors as-is, and [`SessionError::Decode`] for malformed
    /// frames. With `close_on_malformed` set, a malformed frame also closes
    /// the session.
    pub async fn recv(&mut self) -> Result<Option<Message>, SessionError> {
        if !self.is_open() {
            return Err(TransportError::Closed.into());
        }

        let bytes = match self.transport.recv().await {
            Ok(Some(bytes)) => bytes,
            Ok(None) => {
                self.mark_closed("transport ended");
                return Ok(None);
            }
            Err(e) => {
                warn!(error = %e, "session: recv failed");
                self.mark_closed("recv failed");
                return Err(e.into());
            }
        };

        match decode_frame_with(&bytes, self.policy) {
            Ok(message) => {
                debug!(tag = ?message.tag(), len = bytes.len(), "session: recv frame");
                if message.is_close() {
                    self.mark_closed("received close");
                }
                Ok(Some(message))
            }
            Err(e) => {
                warn!(error = %e, len = bytes.len(), "session: malformed frame");
                if self.close_on_malformed {
                    self.mark_closed("malformed frame");
                    if let Err(close_err) = self.close_transport().await {
                        warn!(error = %close_err, "session: close after malformed frame failed");
                    }
                }
                Err(e.into())
            }
        }
    }

    /// [`Session::recv`] bounded by `deadline`. Expiry leaves the state unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Timeout`] on expiry, otherwise as [`Session::recv`].
    pub async fn recv_timeout(&mut self, deadline: Duration) -> Result<Option<Message>, SessionError> {
        match tokio::time::timeout(deadline, self.recv()).await {
            Ok(result) => result,
            Err(_) => Err(TransportError::Timeout.into()),
        }
    }

    /// [`Session::recv_timeout`] with the configured receive deadline.
    ///
    /// # Errors
    ///
    /// As [`Session::recv_timeout`].
    pub async fn recv_next(&mut self) -> Result<Option<Message>, SessionError> {
        self.recv_timeout(self.default_deadline).await
    }

    /// Send `Close` if still open, then shut the transport down.
    ///
    /// Idempotent: closing a closed session only finishes the transport
    /// shutdown if it has not happened yet.
    ///
    /// # Errors
    ///
    /// Returns the first failure from sending `Close` or closing the transport.
    pub async fn close(&mut self) -> Result<(), TransportError> {
        let sent = if self.is_open() {
            self.send(&Message::Close).await
        } else {
            Ok(())
        };
        self.state = ConnectionState::Closed;

        let closed = self.close_transport().await;
        sent.and(closed)
    }

    /// Consume the session and hand back the transport.
    #[must_use]
    pub fn into_inner(self) -> T {
        self.transport
    }

    async fn close_transport(&mut self) -> Result<(), TransportError> {
        if self.transport_closed {
            return Ok(());
        }
        self.transport_closed = true;
        self.transport.close().await
    }

    fn mark_closed(&mut self, reason: &'static str) {
        if self.state == ConnectionState::Open {
            info!(reason, "session: closed");
        }
        self.state = ConnectionState::Closed;
    }
}

#[cfg(test)]
#[path = "session_test.rs"]
mod tests;
