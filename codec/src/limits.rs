//! Limits for codec-level decoding.

use crate::error::{CodecError, CodecResult, LimitKind};

/// Codec-specific limits enforced while decoding untrusted bytes.
///
/// These bound the allocations a malformed or hostile packet can trigger.
/// Encoding is not limited.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CodecLimits {
    /// Maximum number of entries in any single dictionary count.
    pub max_collection_len: usize,
    /// Maximum number of bytes in a single string.
    pub max_string_bytes: usize,
    /// Maximum nesting of composite values.
    pub max_depth: usize,
}

impl Default for CodecLimits {
    fn default() -> Self {
        Self {
            max_collection_len: 16 * 1024,
            max_string_bytes: 64 * 1024,
            max_depth: 32,
        }
    }
}

impl CodecLimits {
    /// Creates limits suitable for testing with smaller values.
    #[must_use]
    pub const fn for_testing() -> Self {
        Self {
            max_collection_len: 64,
            max_string_bytes: 256,
            max_depth: 8,
        }
    }

    /// Creates limits with no restrictions (use with caution).
    #[must_use]
    pub const fn unlimited() -> Self {
        Self {
            max_collection_len: usize::MAX,
            max_string_bytes: usize::MAX,
            max_depth: usize::MAX,
        }
    }
}

pub(crate) fn check_limit(kind: LimitKind, limit: usize, actual: usize) -> CodecResult<()> {
    if actual > limit {
        return Err(CodecError::LimitsExceeded {
            kind,
            limit,
            actual,
        });
    }
    Ok(())
}
