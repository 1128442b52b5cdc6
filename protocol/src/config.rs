//! Protocol configuration.

use codec::CodecLimits;
use replication::ReplicationConfig;
use wire::Limits;

/// Settings shared by replica servers and clients.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ProtocolConfig {
    /// History window for both published and mirrored state.
    pub replication: ReplicationConfig,
    /// Limits applied to every incoming payload.
    pub wire_limits: Limits,
    /// Limits applied when decoding state diffs and messages.
    pub codec_limits: CodecLimits,
}

impl ProtocolConfig {
    /// Small limits that make oversized test inputs fail fast.
    #[must_use]
    pub const fn for_testing() -> Self {
        Self {
            replication: ReplicationConfig::with_window(0),
            wire_limits: Limits::for_testing(),
            codec_limits: CodecLimits::for_testing(),
        }
    }

    /// No decoding limits at all.
    #[must_use]
    pub const fn unlimited() -> Self {
        Self {
            replication: ReplicationConfig::with_window(0),
            wire_limits: Limits::unlimited(),
            codec_limits: CodecLimits::unlimited(),
        }
    }

    #[must_use]
    pub fn with_window(mut self, window_size: u32) -> Self {
        self.replication = ReplicationConfig::with_window(window_size);
        self
    }
}
