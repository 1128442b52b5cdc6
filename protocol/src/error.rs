//! Error types for the protocol layer.

use std::fmt;

use codec::CodecError;
use replication::ReplicationError;
use wire::{Handshake, WireError};

/// Result type for protocol operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// Errors raised by replica servers, clients and sockets.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ProtocolError {
    /// `configure` was called a second time.
    AlreadyConfigured,

    /// `start` or `open` was called a second time.
    AlreadyStarted,

    /// The operation needs a schema and none was configured.
    NotConfigured,

    /// `configure` was called after `start` or `open`.
    ConfigureAfterStart,

    /// The socket or server has been closed and cannot be reused.
    SocketClosed,

    /// `open` was called on a socket that is opening or open.
    SocketAlreadyOpen,

    /// The connection has not completed its handshake.
    NotConnected,

    /// No message with this name is configured.
    UnknownMessage { name: String },

    /// No message with this id is configured.
    UnknownMessageId { id: u32 },

    /// No connected client has this id.
    UnknownClient { client: u64 },

    /// The peer computed different schema hashes.
    HandshakeMismatch { local: Handshake, remote: Handshake },

    /// Encoding or decoding a value failed.
    Codec(CodecError),

    /// Framing or handshake parsing failed.
    Wire(WireError),

    /// Publishing or applying state failed.
    Replication(ReplicationError),
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AlreadyConfigured => write!(f, "protocol already configured"),
            Self::AlreadyStarted => write!(f, "already started"),
            Self::NotConfigured => write!(f, "protocol not configured"),
            Self::ConfigureAfterStart => write!(f, "cannot configure after start"),
            Self::SocketClosed => write!(f, "socket is closed"),
            Self::SocketAlreadyOpen => write!(f, "socket is already open"),
            Self::NotConnected => write!(f, "connection has not completed its handshake"),
            Self::UnknownMessage { name } => write!(f, "unknown message {name:?}"),
            Self::UnknownMessageId { id } => write!(f, "unknown message id {id}"),
            Self::UnknownClient { client } => write!(f, "unknown client {client}"),
            Self::HandshakeMismatch { local, remote } => write!(
                f,
                "handshake mismatch: local client={} server={}, remote client={} server={}",
                local.client_hash, local.server_hash, remote.client_hash, remote.server_hash
            ),
            Self::Codec(err) => write!(f, "codec error: {err}"),
            Self::Wire(err) => write!(f, "wire error: {err}"),
            Self::Replication(err) => write!(f, "replication error: {err}"),
        }
    }
}

impl std::error::Error for ProtocolError {}

impl From<CodecError> for ProtocolError {
    fn from(err: CodecError) -> Self {
        Self::Codec(err)
    }
}

impl From<WireError> for ProtocolError {
    fn from(err: WireError) -> Self {
        Self::Wire(err)
    }
}

impl From<ReplicationError> for ProtocolError {
    fn from(err: ReplicationError) -> Self {
        Self::Replication(err)
    }
}
