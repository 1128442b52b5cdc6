//! Error types for wire format operations.

use std::fmt;

/// Result type for wire format operations.
pub type WireResult<T> = Result<T, WireError>;

/// Decode errors for wire framing and the handshake.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum WireError {
    /// Packet is too small to contain the required header.
    PacketTooSmall { actual: usize, required: usize },

    /// Message id too large to be expressed as a frame kind.
    MessageIdOverflow { id: u32 },

    /// Bytes left over after a fixed-size frame body.
    TrailingBytes { remaining: usize },

    /// Handshake was not the expected JSON document.
    MalformedHandshake { reason: String },

    /// Limits exceeded.
    LimitsExceeded {
        kind: LimitKind,
        limit: usize,
        actual: usize,
    },

    /// Byte stream error.
    Stream(bytestream::StreamError),
}

/// Specific wire limits that can be exceeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitKind {
    PacketBytes,
    MessageBytes,
    HandshakeBytes,
}

impl fmt::Display for WireError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PacketTooSmall { actual, required } => {
                write!(
                    f,
                    "packet too small: {actual} bytes, need at least {required}"
                )
            }
            Self::MessageIdOverflow { id } => write!(f, "message id {id} overflows frame kind"),
            Self::TrailingBytes { remaining } => {
                write!(f, "{remaining} trailing bytes after frame")
            }
            Self::MalformedHandshake { reason } => write!(f, "malformed handshake: {reason}"),
            Self::LimitsExceeded {
                kind,
                limit,
                actual,
            } => {
                write!(f, "{kind} limit exceeded: {actual} > {limit}")
            }
            Self::Stream(err) => write!(f, "stream error: {err}"),
        }
    }
}

impl fmt::Display for LimitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::PacketBytes => "packet bytes",
            Self::MessageBytes => "message bytes",
            Self::HandshakeBytes => "handshake bytes",
        };
        write!(f, "{name}")
    }
}

impl std::error::Error for WireError {}

impl From<bytestream::StreamError> for WireError {
    fn from(err: bytestream::StreamError) -> Self {
        Self::Stream(err)
    }
}
