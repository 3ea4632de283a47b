//! Tagged frame model and binary codec for the session wire protocol.
//!
//! This crate owns the wire representation shared by `session` and `cli`.
//! A frame is one WebSocket binary message: a single tag byte followed by
//! the payload, which only `Text` carries. The transport delimits frames, so
//! there is no length prefix.

use std::borrow::Cow;

use serde::{Deserialize, Serialize};

/// Error returned by [`decode_frame`] and [`decode_frame_with`].
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    /// The frame contained no bytes, so there is no tag to read.
    #[error("empty frame")]
    EmptyFrame,
    /// A payload-less tag arrived with trailing bytes.
    #[error("unexpected payload on {tag:?} frame ({len} bytes total)")]
    UnexpectedPayload { tag: Tag, len: usize },
    /// A [`DecodePolicy::Legacy`] frame ended before its stream-id byte.
    #[error("missing stream id on {0:?} frame")]
    MissingStreamId(Tag),
    /// The leading byte does not map to a known [`Tag`].
    #[error("unknown frame tag: {0:#04x}")]
    UnknownTag(u8),
}

/// Leading byte of every frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Tag {
    Ping = 0,
    Text = 1,
    Close = 2,
}

impl Tag {
    /// Wire byte for this tag.
    #[must_use]
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Whether frames with this tag are allowed to carry a payload.
    #[must_use]
    pub fn carries_payload(self) -> bool {
        matches!(self, Self::Text)
    }
}

impl TryFrom<u8> for Tag {
    type Error = DecodeError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Ping),
            1 => Ok(Self::Text),
            2 => Ok(Self::Close),
            other => Err(DecodeError::UnknownTag(other)),
        }
    }
}

/// How strictly payload-less frames are checked on decode.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DecodePolicy {
    /// `Ping` and `Close` must be exactly one byte.
    #[default]
    Strict,
    /// `Ping` and `Close` ignore trailing bytes.
    Lenient,
    /// Multiplexer layout `[tag, stream_id, data..]`. Every tag carries the
    /// stream-id byte, which is required and then dropped. `Ping` and `Close`
    /// must end right after it.
    Legacy,
}

/// A single application message on the session wire protocol.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "payload", rename_all = "lowercase")]
pub enum Message {
    /// Liveness probe. No payload.
    Ping,
    /// Opaque text payload. Any byte sequence is valid, including empty.
    Text(Vec<u8>),
    /// End of session. No payload.
    Close,
}

impl Message {
    /// Build a `Text` message from anything byte-like.
    #[must_use]
    pub fn text(payload: impl Into<Vec<u8>>) -> Self {
        Self::Text(payload.into())
    }

    #[must_use]
    pub fn tag(&self) -> Tag {
        match self {
            Self::Ping => Tag::Ping,
            Self::Text(_) => Tag::Text,
            Self::Close => Tag::Close,
        }
    }

    #[must_use]
    pub fn is_close(&self) -> bool {
        matches!(self, Self::Close)
    }

    /// Text payload as a string, replacing invalid UTF-8. `None` for
    /// control messages.
    #[must_use]
    pub fn text_lossy(&self) -> Option<Cow<'_, str>> {
        match self {
            Self::Text(payload) => Some(String::from_utf8_lossy(payload)),
            Self::Ping | Self::Close => None,
        }
    }

    /// Number of bytes this message occupies on the wire.
    #[must_use]
    pub fn encoded_len(&self) -> usize {
        match self {
            Self::Text(payload) => 1 + payload.len(),
            Self::Ping | Self::Close => 1,
        }
    }
}

/// Encode a message into frame bytes.
#[must_use]
pub fn encode_frame(message: &Message) -> Vec<u8> {
    let mut out = Vec::with_capacity(message.encoded_len());
    out.push(message.tag().as_u8());
    if let Message::Text(payload) = message {
        out.extend_from_slice(payload);
    }
    out
}

/// Decode frame bytes into a message under [`DecodePolicy::Strict`].
///
/// # Errors
///
/// Returns [`DecodeError::EmptyFrame`] for zero-length input,
/// [`DecodeError::UnknownTag`] for an unrecognised leading byte, and
/// [`DecodeError::UnexpectedPayload`] when `Ping` or `Close` carry trailing
/// bytes.
pub fn decode_frame(bytes: &[u8]) -> Result<Message, DecodeError> {
    decode_frame_with(bytes, DecodePolicy::Strict)
}

/// Decode frame bytes into a message under the given policy.
///
/// # Errors
///
/// Same as [`decode_frame`], except that [`DecodePolicy::Lenient`] never
/// returns [`DecodeError::UnexpectedPayload`] and [`DecodePolicy::Legacy`]
/// returns [`DecodeError::MissingStreamId`] for a frame shorter than two bytes.
pub fn decode_frame_with(bytes: &[u8], policy: DecodePolicy) -> Result<Message, DecodeError> {
    let Some((&first, rest)) = bytes.split_first() else {
        return Err(DecodeError::EmptyFrame);
    };
    let tag = Tag::try_from(first)?;

    let payload = match policy {
        DecodePolicy::Legacy => match rest.split_first() {
            Some((_stream_id, data)) => data,
            None => return Err(DecodeError::MissingStreamId(tag)),
        },
        DecodePolicy::Strict | DecodePolicy::Lenient => rest,
    };

    if !tag.carries_payload() && !payload.is_empty() && policy != DecodePolicy::Lenient {
        return Err(DecodeError::UnexpectedPayload {
            tag,
            len: bytes.len(),
        });
    }

    Ok(match tag {
        Tag::Ping => Message::Ping,
        Tag::Text => Message::Text(payload.to_vec()),
        Tag::Close => Message::Close,
    })
}

#[cfg(test)]
#[path = "lib_test.rs"]
mod tests;
