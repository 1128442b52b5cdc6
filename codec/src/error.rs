//! Error types for codec operations.

use std::fmt;

use schema::{SchemaType, Value};

use crate::types::Tick;

/// Result type for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;

/// Errors that can occur while diffing, patching, encoding or decoding values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// Byte stream error.
    Stream(bytestream::StreamError),

    /// A value does not have the shape its schema requires.
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },

    /// A value has the right shape but cannot be represented.
    InvalidValue { reason: ValueReason },

    /// A fixed array value has the wrong number of elements.
    ArrayLengthMismatch { expected: usize, found: usize },

    /// A struct value has the wrong number of fields.
    FieldCountMismatch { expected: usize, found: usize },

    /// A union tag does not name a variant.
    UnknownVariant { tag: u32, variants: usize },

    /// A dictionary patch removes or changes a key the base does not have.
    UnknownKey { key: String },

    /// A dictionary patch adds a key the base already has.
    DuplicateKey { key: String },

    /// A change mask is empty or has bits past the member count.
    InvalidMask { members: usize },

    /// Limits exceeded.
    LimitsExceeded {
        kind: LimitKind,
        limit: usize,
        actual: usize,
    },

    /// Bytes were left over after decoding a complete value.
    TrailingBytes { remaining: usize },
}

/// Specific limit that was exceeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitKind {
    CollectionLength,
    StringBytes,
    Depth,
}

/// Details for invalid value errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueReason {
    /// An ASCII schema was given a string with non-ASCII characters.
    NonAscii,
}

/// Errors that can occur when inserting into a [`StateHistory`](crate::StateHistory).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryError {
    /// The tick is already present.
    DuplicateTick { tick: Tick },
}

impl fmt::Display for CodecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stream(e) => write!(f, "stream error: {e}"),
            Self::TypeMismatch { expected, found } => {
                write!(f, "type mismatch: expected {expected}, found {found}")
            }
            Self::InvalidValue { reason } => write!(f, "invalid value: {reason}"),
            Self::ArrayLengthMismatch { expected, found } => {
                write!(f, "array length mismatch: expected {expected}, found {found}")
            }
            Self::FieldCountMismatch { expected, found } => {
                write!(f, "struct field count mismatch: expected {expected}, found {found}")
            }
            Self::UnknownVariant { tag, variants } => {
                write!(f, "unknown union tag {tag} ({variants} variants)")
            }
            Self::UnknownKey { key } => write!(f, "dictionary key `{key}` not in base"),
            Self::DuplicateKey { key } => write!(f, "dictionary key `{key}` already in base"),
            Self::InvalidMask { members } => {
                write!(f, "invalid change mask for {members} members")
            }
            Self::LimitsExceeded {
                kind,
                limit,
                actual,
            } => {
                write!(f, "{kind} limit exceeded: {actual} > {limit}")
            }
            Self::TrailingBytes { remaining } => {
                write!(f, "{remaining} trailing bytes after value")
            }
        }
    }
}

impl fmt::Display for LimitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::CollectionLength => "collection length",
            Self::StringBytes => "string bytes",
            Self::Depth => "nesting depth",
        };
        write!(f, "{name}")
    }
}

impl fmt::Display for ValueReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NonAscii => write!(f, "non-ascii character in ascii string"),
        }
    }
}

impl fmt::Display for HistoryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicateTick { tick } => write!(f, "tick {} already in history", tick.raw()),
        }
    }
}

impl CodecError {
    pub(crate) fn mismatch(ty: &SchemaType, value: &Value) -> Self {
        Self::TypeMismatch {
            expected: ty.kind_name(),
            found: value.kind_name(),
        }
    }
}

impl std::error::Error for CodecError {}

impl std::error::Error for HistoryError {}

impl From<bytestream::StreamError> for CodecError {
    fn from(err: bytestream::StreamError) -> Self {
        Self::Stream(err)
    }
}
