//! Error types for replication.

use std::fmt;

use codec::{CodecError, HistoryError, Tick};
use wire::WireError;

/// Result type for replication operations.
pub type ReplicationResult<T> = Result<T, ReplicationError>;

/// Errors raised by publishers and receivers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplicationError {
    /// The chosen base tick is no longer in history.
    BaseTickEvicted { tick: Tick },

    /// No observer is registered under the key.
    UnknownObserver,

    /// An observer is already registered under the key.
    DuplicateObserver,

    /// The tick counter reached `u32::MAX`.
    TickOverflow,

    /// History insertion failed.
    History(HistoryError),

    /// Diff, patch or value validation failed.
    Codec(CodecError),

    /// State packet framing failed.
    Wire(WireError),
}

impl fmt::Display for ReplicationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BaseTickEvicted { tick } => {
                write!(f, "base tick {tick} was evicted from history")
            }
            Self::UnknownObserver => write!(f, "unknown observer"),
            Self::DuplicateObserver => write!(f, "observer already registered"),
            Self::TickOverflow => write!(f, "tick counter overflow"),
            Self::History(err) => write!(f, "history error: {err}"),
            Self::Codec(err) => write!(f, "codec error: {err}"),
            Self::Wire(err) => write!(f, "wire error: {err}"),
        }
    }
}

impl std::error::Error for ReplicationError {}

impl From<HistoryError> for ReplicationError {
    fn from(err: HistoryError) -> Self {
        Self::History(err)
    }
}

impl From<CodecError> for ReplicationError {
    fn from(err: CodecError) -> Self {
        Self::Codec(err)
    }
}

impl From<WireError> for ReplicationError {
    fn from(err: WireError) -> Self {
        Self::Wire(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_base_tick_evicted() {
        let err = ReplicationError::BaseTickEvicted { tick: Tick::new(12) };
        assert!(err.to_string().contains("12"));
    }

    #[test]
    fn lower_errors_convert() {
        let err: ReplicationError = CodecError::InvalidMask { members: 1 }.into();
        assert!(matches!(err, ReplicationError::Codec(_)));
        let err: ReplicationError = WireError::TrailingBytes { remaining: 1 }.into();
        assert!(matches!(err, ReplicationError::Wire(_)));
    }
}
