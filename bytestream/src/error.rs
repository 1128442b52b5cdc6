//! Error types for byte stream operations.

use std::fmt;

/// Result type for byte stream operations.
pub type StreamResult<T> = Result<T, StreamError>;

/// Errors that can occur while reading or writing a byte stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamError {
    /// Attempted to read past the end of the buffer.
    UnexpectedEof {
        /// Number of bytes requested.
        requested: usize,
        /// Number of bytes available.
        available: usize,
    },

    /// A length-prefixed string did not contain valid UTF-8.
    InvalidUtf8 {
        /// Byte offset of the string payload.
        offset: usize,
    },

    /// A varint ran past its maximum encoded length.
    InvalidVarint,

    /// A boolean byte was neither 0 nor 1.
    InvalidBool {
        /// The byte that was read.
        value: u8,
    },

    /// An ASCII string contained a byte above 0x7F.
    NonAscii {
        /// Byte offset of the string payload.
        offset: usize,
    },

    /// A length does not fit in the 32-bit length prefix.
    LengthOverflow {
        /// The length that overflowed.
        length: usize,
    },
}

impl fmt::Display for StreamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnexpectedEof {
                requested,
                available,
            } => {
                write!(
                    f,
                    "attempted to read {requested} bytes but only {available} bytes available"
                )
            }
            Self::InvalidUtf8 { offset } => {
                write!(f, "invalid utf-8 in string at offset {offset}")
            }
            Self::NonAscii { offset } => {
                write!(f, "non-ascii byte in string at offset {offset}")
            }
            Self::InvalidVarint => write!(f, "invalid varint"),
            Self::InvalidBool { value } => {
                write!(f, "invalid boolean byte 0x{value:02X}")
            }
            Self::LengthOverflow { length } => {
                write!(f, "length {length} does not fit in a u32 prefix")
            }
        }
    }
}

impl std::error::Error for StreamError {}
