//! Client session over the tagged-frame wire protocol.
//!
//! DESIGN
//! ======
//! `frames` owns the byte layout; this crate owns everything around it:
//! - [`Transport`] is the seam to the socket. [`WsTransport`] speaks
//!   WebSocket binary messages, [`ChannelTransport`] is an in-memory pair.
//! - [`Session`] encodes on send, decodes on receive, and tracks the
//!   two-state [`ConnectionState`] lifecycle.
//!
//! One transport message carries exactly one frame; the WebSocket layer
//! delimits them, so nothing here buffers partial frames.

mod config;
mod error;
mod session;
mod transport;

pub use config::{DEFAULT_RECV_TIMEOUT_MS, DEFAULT_URL, SessionConfig};
pub use error::{SessionError, TransportError};
pub use frames::{DecodeError, DecodePolicy, Message, Tag};
pub use session::{ConnectionState, Session};
pub use transport::{ChannelTransport, Transport, WsTransport};
