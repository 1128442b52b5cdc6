//! Transport contract consumed by replica servers and clients.
//!
//! Transports are poll driven: they queue events internally and hand them
//! out one at a time from `poll`. Nothing completes synchronously, so an
//! `open` or `start` is only observable through a later `Ready` event.

use bytestream::BufferPool;

use crate::error::ProtocolResult;

/// One message as sent over a socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    Text(String),
    Binary(Vec<u8>),
}

impl Payload {
    /// Returns the raw bytes of the payload.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::Text(text) => text.as_bytes(),
            Self::Binary(bytes) => bytes,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.as_bytes().is_empty()
    }

    /// Returns a binary payload's buffer to `pool`.
    pub fn release(self, pool: &BufferPool) {
        if let Self::Binary(bytes) = self {
            pool.free(bytes);
        }
    }
}

/// Lifecycle of a socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SocketState {
    Idle,
    Opening,
    Open,
    Closed,
}

/// Event produced by a [`Socket`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SocketEvent {
    /// The socket finished opening.
    Ready,
    /// A payload arrived.
    Message { payload: Payload, unreliable: bool },
    /// The socket closed, from either end.
    Closed,
}

/// Event produced by a [`SocketServer`].
#[derive(Debug)]
pub enum ServerSocketEvent<S> {
    /// The server is accepting connections.
    Ready,
    /// A client connected; the socket is already open.
    Connection(S),
    /// The server stopped.
    Closed,
}

/// A bidirectional message socket.
///
/// Reliable sends arrive in order. Unreliable sends may be dropped or
/// reordered.
pub trait Socket {
    /// Starts connecting. Completion is reported as [`SocketEvent::Ready`].
    fn open(&mut self) -> ProtocolResult<()>;

    /// Queues a payload for the peer.
    fn send(&mut self, payload: Payload, unreliable: bool) -> ProtocolResult<()>;

    /// Returns the next pending event.
    fn poll(&mut self) -> Option<SocketEvent>;

    /// Closes both ends. Closing twice is a no-op.
    fn close(&mut self);

    fn state(&self) -> SocketState;
}

/// A listener that hands out one [`Socket`] per connecting client.
pub trait SocketServer {
    type Socket: Socket;

    /// Starts listening. Completion is reported as [`ServerSocketEvent::Ready`].
    fn start(&mut self) -> ProtocolResult<()>;

    /// Returns the next pending event.
    fn poll(&mut self) -> Option<ServerSocketEvent<Self::Socket>>;

    /// Stops listening and closes every accepted socket.
    fn close(&mut self);

    /// Returns the number of accepted sockets that are still open.
    fn clients(&self) -> usize;
}
