//! Connection handshake.
//!
//! The first reliable payload each side sends is a UTF-8 JSON document
//! carrying the schema hashes it computed for both sides:
//!
//! ```json
//! {"clientHash": "0123456789abcdef", "serverHash": "fedcba9876543210"}
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{LimitKind, WireError, WireResult};
use crate::limits::{check_limit, Limits};

/// Schema hashes exchanged when a connection opens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Handshake {
    pub client_hash: String,
    pub server_hash: String,
}

impl Handshake {
    /// Creates a handshake from the two side hashes.
    pub fn new(client_hash: impl Into<String>, server_hash: impl Into<String>) -> Self {
        Self {
            client_hash: client_hash.into(),
            server_hash: server_hash.into(),
        }
    }

    /// Returns `true` if both hashes match `other`.
    #[must_use]
    pub fn matches(&self, other: &Self) -> bool {
        self == other
    }
}

/// Serializes a handshake to JSON bytes.
pub fn encode_handshake(handshake: &Handshake) -> WireResult<Vec<u8>> {
    serde_json::to_vec(handshake).map_err(|err| WireError::MalformedHandshake {
        reason: err.to_string(),
    })
}

/// Parses a handshake from JSON bytes.
pub fn decode_handshake(bytes: &[u8], limits: &Limits) -> WireResult<Handshake> {
    check_limit(
        LimitKind::HandshakeBytes,
        limits.max_handshake_bytes,
        bytes.len(),
    )?;
    serde_json::from_slice(bytes).map_err(|err| WireError::MalformedHandshake {
        reason: err.to_string(),
    })
}
