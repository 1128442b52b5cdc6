//! Client side of a replicated protocol.

use std::collections::VecDeque;
use std::fmt;

use bytestream::{BufferPool, ByteWriter};
use codec::Tick;
use log::{info, warn};
use replication::{PublishedState, Publisher};
use schema::Value;

use crate::config::ProtocolConfig;
use crate::dispatcher::{Dispatcher, Side};
use crate::error::{ProtocolError, ProtocolResult};
use crate::peer::{send_handshake, send_with, Incoming, Peer};
use crate::schema_set::ProtocolSchema;
use crate::socket::{Payload, Socket, SocketEvent};

/// Something that happened on a [`ReplicaClient`].
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    /// The handshake completed; state and messages can flow.
    Ready,
    /// The mirrored server state advanced to `tick`.
    State { tick: Tick },
    /// The server sent an application message.
    Message { name: String, value: Value },
    /// The connection closed. `reason` is set when this client closed it
    /// because the server broke the protocol.
    Closed { reason: Option<ProtocolError> },
}

struct Bound {
    dispatcher: Dispatcher,
    publisher: Publisher<()>,
    peer: Peer,
}

/// Mirrors the server state and publishes this client's own state.
pub struct ReplicaClient<S: Socket> {
    socket: S,
    pool: BufferPool,
    config: ProtocolConfig,
    bound: Option<Bound>,
    opened: bool,
    closed: bool,
    events: VecDeque<ClientEvent>,
}

impl<S: Socket> ReplicaClient<S> {
    #[must_use]
    pub fn new(socket: S, pool: BufferPool, config: ProtocolConfig) -> Self {
        Self {
            socket,
            pool,
            config,
            bound: None,
            opened: false,
            closed: false,
            events: VecDeque::new(),
        }
    }

    /// Binds the schema set. Allowed once, before [`open`](Self::open).
    pub fn configure(&mut self, schema: ProtocolSchema) -> ProtocolResult<()> {
        if self.opened {
            return Err(ProtocolError::ConfigureAfterStart);
        }
        if self.bound.is_some() {
            return Err(ProtocolError::AlreadyConfigured);
        }
        let dispatcher = Dispatcher::new(schema, Side::Client, &self.config);
        let publisher = Publisher::with_limits(
            dispatcher.local_state(),
            self.config.replication,
            self.config.codec_limits.clone(),
            self.config.wire_limits.clone(),
        );
        let peer = Peer::new(&dispatcher, &self.config);
        self.bound = Some(Bound {
            dispatcher,
            publisher,
            peer,
        });
        Ok(())
    }

    /// Opens the socket. [`ClientEvent::Ready`] follows once both sides
    /// accepted each other's handshake.
    pub fn open(&mut self) -> ProtocolResult<()> {
        if self.bound.is_none() {
            return Err(ProtocolError::NotConfigured);
        }
        if self.opened {
            return Err(ProtocolError::AlreadyStarted);
        }
        self.socket.open()?;
        self.opened = true;
        Ok(())
    }

    /// Returns the next event, first draining the socket.
    pub fn poll(&mut self) -> Option<ClientEvent> {
        if self.events.is_empty() {
            self.pump();
        }
        self.events.pop_front()
    }

    /// Publishes `value` as the next client state tick.
    pub fn commit(&mut self, value: &Value, reliable: bool) -> ProtocolResult<PublishedState> {
        self.ensure_connected()?;
        let bound = self.bound.as_mut().ok_or(ProtocolError::NotConfigured)?;
        let mut out = ByteWriter::new(&self.pool);
        let published =
            bound
                .publisher
                .publish(bound.dispatcher.local_state(), value, reliable, &mut out)?;
        self.socket.send(Payload::Binary(out.finish()), !reliable)?;
        Ok(published)
    }

    /// Sends a client message to the server.
    pub fn send(&mut self, name: &str, value: &Value) -> ProtocolResult<()> {
        self.ensure_connected()?;
        let bound = self.bound.as_ref().ok_or(ProtocolError::NotConfigured)?;
        let dispatcher = &bound.dispatcher;
        send_with(&mut self.socket, &self.pool, false, |out| {
            dispatcher.encode_message(name, value, out)
        })
    }

    /// Returns the latest server state received.
    pub fn server_state(&self) -> ProtocolResult<&Value> {
        let bound = self.bound.as_ref().ok_or(ProtocolError::NotConfigured)?;
        Ok(bound.peer.receiver().current_value())
    }

    /// Returns the tick of the latest server state received.
    pub fn server_tick(&self) -> ProtocolResult<Tick> {
        let bound = self.bound.as_ref().ok_or(ProtocolError::NotConfigured)?;
        Ok(bound.peer.receiver().current_tick())
    }

    /// Returns the latest state this client committed.
    pub fn state(&self) -> ProtocolResult<&Value> {
        let bound = self.bound.as_ref().ok_or(ProtocolError::NotConfigured)?;
        Ok(bound.publisher.current_value())
    }

    /// Returns `true` once the handshake completed and until the connection
    /// closes.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        !self.closed
            && self
                .bound
                .as_ref()
                .is_some_and(|bound| bound.peer.is_handshaken())
    }

    #[must_use]
    pub const fn pool(&self) -> &BufferPool {
        &self.pool
    }

    /// Closes the connection. Closing twice is a no-op.
    pub fn close(&mut self) {
        self.shutdown(None);
    }

    fn ensure_connected(&self) -> ProtocolResult<()> {
        if self.closed {
            return Err(ProtocolError::SocketClosed);
        }
        let bound = self.bound.as_ref().ok_or(ProtocolError::NotConfigured)?;
        if !bound.peer.is_handshaken() {
            return Err(ProtocolError::NotConnected);
        }
        Ok(())
    }

    fn pump(&mut self) {
        while !self.closed {
            let Some(event) = self.socket.poll() else {
                return;
            };
            let handled = match event {
                SocketEvent::Ready => self.on_open(),
                SocketEvent::Message {
                    payload,
                    unreliable,
                } => self.on_payload(payload, unreliable),
                SocketEvent::Closed => {
                    info!("connection to server closed");
                    self.shutdown(None);
                    Ok(())
                }
            };
            if let Err(err) = handled {
                warn!("closing connection to server: {err}");
                self.shutdown(Some(err));
            }
        }
    }

    fn on_open(&mut self) -> ProtocolResult<()> {
        let bound = self.bound.as_ref().ok_or(ProtocolError::NotConfigured)?;
        send_handshake(&mut self.socket, &bound.dispatcher)
    }

    fn on_payload(&mut self, payload: Payload, unreliable: bool) -> ProtocolResult<()> {
        let Some(bound) = self.bound.as_mut() else {
            payload.release(&self.pool);
            return Err(ProtocolError::NotConfigured);
        };
        let incoming = bound.peer.receive(
            &mut self.socket,
            &bound.dispatcher,
            &self.pool,
            payload,
            unreliable,
        )?;
        match incoming {
            Incoming::Handshake => {
                bound.publisher.add_observer(())?;
                info!("connected to server");
                self.events.push_back(ClientEvent::Ready);
            }
            Incoming::State(tick) => self.events.push_back(ClientEvent::State { tick }),
            Incoming::Ack(tick) => bound.publisher.acknowledge(&(), tick)?,
            Incoming::Forget(horizon) => bound.publisher.forget(&(), horizon)?,
            Incoming::Message { name, value } => {
                self.events.push_back(ClientEvent::Message { name, value });
            }
            Incoming::Ignored => {}
        }
        Ok(())
    }

    fn shutdown(&mut self, reason: Option<ProtocolError>) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.socket.close();
        self.events.push_back(ClientEvent::Closed { reason });
    }
}

impl<S: Socket> fmt::Debug for ReplicaClient<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReplicaClient")
            .field("configured", &self.bound.is_some())
            .field("opened", &self.opened)
            .field("closed", &self.closed)
            .finish_non_exhaustive()
    }
}
