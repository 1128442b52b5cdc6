//! Configurable limits for bounded decoding.

use crate::error::{LimitKind, WireError, WireResult};

/// Wire-level limits for frame decoding.
///
/// These limits are enforced on every incoming payload before it is parsed.
/// Limits on the contents of state diffs and messages belong to the codec.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Limits {
    /// Maximum size of any frame in bytes.
    pub max_packet_bytes: usize,

    /// Maximum body size of an application message frame.
    pub max_message_bytes: usize,

    /// Maximum size of the JSON handshake.
    pub max_handshake_bytes: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            // 64 KB is generous for most realtime scenarios
            max_packet_bytes: 64 * 1024,
            max_message_bytes: 32 * 1024,
            max_handshake_bytes: 1024,
        }
    }
}

impl Limits {
    /// Creates limits suitable for testing with smaller values.
    #[must_use]
    pub const fn for_testing() -> Self {
        Self {
            max_packet_bytes: 4096,
            max_message_bytes: 1024,
            max_handshake_bytes: 256,
        }
    }

    /// Creates limits with no restrictions (use with caution).
    #[must_use]
    pub const fn unlimited() -> Self {
        Self {
            max_packet_bytes: usize::MAX,
            max_message_bytes: usize::MAX,
            max_handshake_bytes: usize::MAX,
        }
    }

    /// Checks the size of a complete frame a peer will decode.
    pub fn check_packet(&self, len: usize) -> WireResult<()> {
        check_limit(LimitKind::PacketBytes, self.max_packet_bytes, len)
    }

    /// Checks the size of an application message body a peer will decode.
    pub fn check_message(&self, len: usize) -> WireResult<()> {
        check_limit(LimitKind::MessageBytes, self.max_message_bytes, len)
    }
}

pub(crate) fn check_limit(kind: LimitKind, limit: usize, actual: usize) -> WireResult<()> {
    if actual > limit {
        return Err(WireError::LimitsExceeded {
            kind,
            limit,
            actual,
        });
    }
    Ok(())
}
