//! Server side of a replicated protocol.

use std::collections::{BTreeMap, VecDeque};
use std::fmt;

use bytestream::{BufferPool, ByteWriter};
use codec::Tick;
use log::{debug, info, warn};
use replication::{PublishedState, Publisher};
use schema::Value;

use crate::config::ProtocolConfig;
use crate::dispatcher::{Dispatcher, Side};
use crate::error::{ProtocolError, ProtocolResult};
use crate::peer::{send_copy, send_handshake, send_with, Incoming, Peer};
use crate::schema_set::ProtocolSchema;
use crate::socket::{ServerSocketEvent, Socket, SocketEvent, SocketServer};

/// Identifies one accepted connection for the lifetime of a server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ClientId(u64);

impl ClientId {
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Something that happened on a [`ReplicaServer`].
#[derive(Debug, Clone, PartialEq)]
pub enum ServerEvent {
    /// The server is accepting connections.
    Ready,
    /// A client completed its handshake.
    Connected(ClientId),
    /// A client sent an application message.
    Message {
        client: ClientId,
        name: String,
        value: Value,
    },
    /// The mirrored state of a client advanced.
    ClientState { client: ClientId, tick: Tick },
    /// A connection was closed because the client broke the protocol.
    Rejected {
        client: ClientId,
        reason: ProtocolError,
    },
    /// A connected client went away.
    Disconnected(ClientId),
    /// The server stopped.
    Closed,
}

struct Bound {
    dispatcher: Dispatcher,
    publisher: Publisher<ClientId>,
}

struct Connection<T> {
    socket: T,
    peer: Peer,
}

/// Publishes one authoritative state to every connected client and mirrors
/// each client's own state.
///
/// The server is driven by [`poll`](Self::poll); nothing happens between
/// calls except what the underlying transport does on its own.
pub struct ReplicaServer<S: SocketServer> {
    socket: S,
    pool: BufferPool,
    config: ProtocolConfig,
    bound: Option<Bound>,
    started: bool,
    connections: BTreeMap<ClientId, Connection<S::Socket>>,
    next_client: u64,
    events: VecDeque<ServerEvent>,
}

impl<S: SocketServer> ReplicaServer<S> {
    #[must_use]
    pub fn new(socket: S, pool: BufferPool, config: ProtocolConfig) -> Self {
        Self {
            socket,
            pool,
            config,
            bound: None,
            started: false,
            connections: BTreeMap::new(),
            next_client: 0,
            events: VecDeque::new(),
        }
    }

    /// Binds the schema set. Allowed once, before [`start`](Self::start).
    pub fn configure(&mut self, schema: ProtocolSchema) -> ProtocolResult<()> {
        if self.started {
            return Err(ProtocolError::ConfigureAfterStart);
        }
        if self.bound.is_some() {
            return Err(ProtocolError::AlreadyConfigured);
        }
        let dispatcher = Dispatcher::new(schema, Side::Server, &self.config);
        let publisher = Publisher::with_limits(
            dispatcher.local_state(),
            self.config.replication,
            self.config.codec_limits.clone(),
            self.config.wire_limits.clone(),
        );
        self.bound = Some(Bound {
            dispatcher,
            publisher,
        });
        Ok(())
    }

    /// Starts listening. [`ServerEvent::Ready`] follows on a later poll.
    pub fn start(&mut self) -> ProtocolResult<()> {
        if self.bound.is_none() {
            return Err(ProtocolError::NotConfigured);
        }
        if self.started {
            return Err(ProtocolError::AlreadyStarted);
        }
        self.socket.start()?;
        self.started = true;
        Ok(())
    }

    /// Returns the next event, first draining the transport.
    pub fn poll(&mut self) -> Option<ServerEvent> {
        if self.events.is_empty() {
            self.pump();
        }
        self.events.pop_front()
    }

    /// Publishes `value` as the next server state tick to every connected
    /// client.
    ///
    /// State is sent unreliably unless `reliable` is set, in which case every
    /// client is assumed to hold the new tick. A client the state cannot be
    /// sent to is disconnected, so it is never tracked as holding it.
    ///
    /// Values whose frame the clients would refuse to decode are rejected
    /// before the tick advances.
    pub fn commit(&mut self, value: &Value, reliable: bool) -> ProtocolResult<PublishedState> {
        let bound = self.bound.as_mut().ok_or(ProtocolError::NotConfigured)?;
        let mut out = ByteWriter::new(&self.pool);
        let published =
            bound
                .publisher
                .publish(bound.dispatcher.local_state(), value, reliable, &mut out)?;
        self.send_to_all(out.as_slice(), !reliable);
        Ok(published)
    }

    /// Sends a server message to one connected client.
    pub fn send(&mut self, client: ClientId, name: &str, value: &Value) -> ProtocolResult<()> {
        let bound = self.bound.as_ref().ok_or(ProtocolError::NotConfigured)?;
        let conn = self
            .connections
            .get_mut(&client)
            .filter(|conn| conn.peer.is_handshaken())
            .ok_or(ProtocolError::UnknownClient {
                client: client.raw(),
            })?;
        send_with(&mut conn.socket, &self.pool, false, |out| {
            bound.dispatcher.encode_message(name, value, out)
        })
    }

    /// Sends a server message to every connected client.
    pub fn broadcast(&mut self, name: &str, value: &Value) -> ProtocolResult<()> {
        let bound = self.bound.as_ref().ok_or(ProtocolError::NotConfigured)?;
        let mut out = ByteWriter::new(&self.pool);
        bound.dispatcher.encode_message(name, value, &mut out)?;
        self.send_to_all(out.as_slice(), false);
        Ok(())
    }

    /// Returns the latest committed server state.
    pub fn state(&self) -> ProtocolResult<&Value> {
        let bound = self.bound.as_ref().ok_or(ProtocolError::NotConfigured)?;
        Ok(bound.publisher.current_value())
    }

    /// Returns the tick of the latest committed server state.
    pub fn tick(&self) -> ProtocolResult<Tick> {
        let bound = self.bound.as_ref().ok_or(ProtocolError::NotConfigured)?;
        Ok(bound.publisher.current_tick())
    }

    /// Returns the publisher tracking what each client holds.
    pub fn publisher(&self) -> ProtocolResult<&Publisher<ClientId>> {
        let bound = self.bound.as_ref().ok_or(ProtocolError::NotConfigured)?;
        Ok(&bound.publisher)
    }

    /// Returns the latest state mirrored from `client`.
    pub fn client_state(&self, client: ClientId) -> ProtocolResult<&Value> {
        self.connections
            .get(&client)
            .filter(|conn| conn.peer.is_handshaken())
            .map(|conn| conn.peer.receiver().current_value())
            .ok_or(ProtocolError::UnknownClient {
                client: client.raw(),
            })
    }

    /// Returns the ids of clients that completed their handshake.
    pub fn clients(&self) -> impl Iterator<Item = ClientId> + '_ {
        self.connections
            .iter()
            .filter(|(_, conn)| conn.peer.is_handshaken())
            .map(|(&id, _)| id)
    }

    #[must_use]
    pub const fn pool(&self) -> &BufferPool {
        &self.pool
    }

    /// Returns the underlying listener.
    #[must_use]
    pub const fn listener(&self) -> &S {
        &self.socket
    }

    /// Stops the server and closes every connection. Closing twice is a
    /// no-op.
    pub fn close(&mut self) {
        self.socket.close();
        let ids: Vec<ClientId> = self.connections.keys().copied().collect();
        for id in ids {
            self.disconnect(id);
        }
    }

    /// Sends a copy of `bytes` to every handshaken client, disconnecting
    /// those whose socket refuses it.
    fn send_to_all(&mut self, bytes: &[u8], unreliable: bool) {
        let mut failed = Vec::new();
        for (&id, conn) in &mut self.connections {
            if !conn.peer.is_handshaken() {
                continue;
            }
            if let Err(err) = send_copy(&mut conn.socket, &self.pool, bytes, unreliable) {
                debug!("dropping client {id}: send failed: {err}");
                failed.push(id);
            }
        }
        for id in failed {
            self.disconnect(id);
        }
    }

    fn pump(&mut self) {
        while let Some(event) = self.socket.poll() {
            match event {
                ServerSocketEvent::Ready => {
                    info!("server listening");
                    self.events.push_back(ServerEvent::Ready);
                }
                ServerSocketEvent::Connection(socket) => self.accept(socket),
                ServerSocketEvent::Closed => {
                    let ids: Vec<ClientId> = self.connections.keys().copied().collect();
                    for id in ids {
                        self.disconnect(id);
                    }
                    info!("server closed");
                    self.events.push_back(ServerEvent::Closed);
                }
            }
        }

        let ids: Vec<ClientId> = self.connections.keys().copied().collect();
        for id in ids {
            self.pump_client(id);
        }
    }

    fn accept(&mut self, mut socket: S::Socket) {
        let id = ClientId(self.next_client);
        self.next_client += 1;
        let Some(bound) = self.bound.as_ref() else {
            socket.close();
            return;
        };
        if let Err(err) = send_handshake(&mut socket, &bound.dispatcher) {
            warn!("dropping client {id}: {err}");
            socket.close();
            return;
        }
        info!("accepted client {id}");
        let peer = Peer::new(&bound.dispatcher, &self.config);
        self.connections.insert(id, Connection { socket, peer });
    }

    fn pump_client(&mut self, id: ClientId) {
        loop {
            let Some(conn) = self.connections.get_mut(&id) else {
                return;
            };
            let Some(event) = conn.socket.poll() else {
                return;
            };
            match event {
                SocketEvent::Ready => {}
                SocketEvent::Message {
                    payload,
                    unreliable,
                } => {
                    let Some(bound) = self.bound.as_ref() else {
                        payload.release(&self.pool);
                        continue;
                    };
                    let received = conn.peer.receive(
                        &mut conn.socket,
                        &bound.dispatcher,
                        &self.pool,
                        payload,
                        unreliable,
                    );
                    match received {
                        Ok(incoming) => self.on_incoming(id, incoming),
                        Err(err) => self.reject(id, err),
                    }
                }
                SocketEvent::Closed => {
                    self.disconnect(id);
                    return;
                }
            }
        }
    }

    fn on_incoming(&mut self, id: ClientId, incoming: Incoming) {
        let Some(bound) = self.bound.as_mut() else {
            return;
        };
        let tracked = match incoming {
            Incoming::Handshake => {
                info!("client {id} completed handshake");
                let added = bound.publisher.add_observer(id);
                if added.is_ok() {
                    self.events.push_back(ServerEvent::Connected(id));
                }
                added
            }
            Incoming::State(tick) => {
                self.events
                    .push_back(ServerEvent::ClientState { client: id, tick });
                Ok(())
            }
            Incoming::Ack(tick) => bound.publisher.acknowledge(&id, tick),
            Incoming::Forget(horizon) => bound.publisher.forget(&id, horizon),
            Incoming::Message { name, value } => {
                self.events.push_back(ServerEvent::Message {
                    client: id,
                    name,
                    value,
                });
                Ok(())
            }
            Incoming::Ignored => Ok(()),
        };
        if let Err(err) = tracked {
            self.reject(id, err.into());
        }
    }

    fn reject(&mut self, id: ClientId, reason: ProtocolError) {
        warn!("closing client {id}: {reason}");
        let connected = self.remove(id);
        self.events.push_back(ServerEvent::Rejected { client: id, reason });
        if connected {
            self.events.push_back(ServerEvent::Disconnected(id));
        }
    }

    fn disconnect(&mut self, id: ClientId) {
        if self.remove(id) {
            info!("client {id} disconnected");
            self.events.push_back(ServerEvent::Disconnected(id));
        }
    }

    /// Closes and forgets a connection. Returns `true` if it had completed
    /// its handshake.
    fn remove(&mut self, id: ClientId) -> bool {
        let Some(mut conn) = self.connections.remove(&id) else {
            return false;
        };
        conn.socket.close();
        let connected = conn.peer.is_handshaken();
        if connected {
            if let Some(bound) = self.bound.as_mut() {
                if let Err(err) = bound.publisher.remove_observer(&id) {
                    debug!("client {id} had no observation set: {err}");
                }
            }
        }
        connected
    }
}

impl<S: SocketServer> fmt::Debug for ReplicaServer<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReplicaServer")
            .field("configured", &self.bound.is_some())
            .field("started", &self.started)
            .field("connections", &self.connections.len())
            .finish_non_exhaustive()
    }
}
