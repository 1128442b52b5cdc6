//! In-process transport for tests.
//!
//! [`MemoryNetwork`] wires [`MemoryServer`]s and [`MemorySocket`]s together
//! through a shared [`Scheduler`]. Every delivery is a scheduled task, so
//! nothing arrives until the scheduler runs. Reliable payloads are handed over
//! in FIFO batches. Unreliable payloads behave like a lossy datagram link:
//! when a delivery runs, only the newest due payload survives and older ones
//! are returned to the pool.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::fmt;
use std::rc::{Rc, Weak};
use std::time::Duration;

use bytestream::BufferPool;
use log::{debug, trace};

use crate::error::{ProtocolError, ProtocolResult};
use crate::scheduler::Scheduler;
use crate::socket::{Payload, ServerSocketEvent, Socket, SocketEvent, SocketServer, SocketState};

type Shared = Rc<RefCell<Endpoint>>;

/// Factory for connected in-memory sockets.
#[derive(Debug, Clone, Default)]
pub struct MemoryNetwork {
    link: Link,
}

#[derive(Debug, Clone, Default)]
struct Link {
    scheduler: Scheduler,
    pool: BufferPool,
    latency: Duration,
}

impl MemoryNetwork {
    /// Creates a network delivering on `scheduler` and recycling into `pool`.
    #[must_use]
    pub fn new(scheduler: Scheduler, pool: BufferPool) -> Self {
        Self {
            link: Link {
                scheduler,
                pool,
                latency: Duration::ZERO,
            },
        }
    }

    /// Delays every connection and delivery by `latency`.
    #[must_use]
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.link.latency = latency;
        self
    }

    #[must_use]
    pub const fn scheduler(&self) -> &Scheduler {
        &self.link.scheduler
    }

    #[must_use]
    pub const fn pool(&self) -> &BufferPool {
        &self.link.pool
    }

    /// Creates a server that is not yet listening.
    #[must_use]
    pub fn server(&self) -> MemoryServer {
        MemoryServer {
            link: self.link.clone(),
            inner: Rc::new(RefCell::new(ServerInner {
                state: SocketState::Idle,
                events: VecDeque::new(),
                clients: Vec::new(),
            })),
        }
    }

    /// Creates a client socket that connects to `server` when opened.
    #[must_use]
    pub fn socket(&self, server: &MemoryServer) -> MemorySocket {
        MemorySocket {
            link: self.link.clone(),
            endpoint: Rc::new(RefCell::new(Endpoint::new(SocketState::Idle, Weak::new()))),
            server: Rc::downgrade(&server.inner),
        }
    }
}

struct Endpoint {
    state: SocketState,
    events: VecDeque<SocketEvent>,
    reliable: VecDeque<(Duration, Payload)>,
    unreliable: Vec<(Duration, Payload)>,
    peer: Weak<RefCell<Endpoint>>,
}

impl Endpoint {
    const fn new(state: SocketState, peer: Weak<RefCell<Self>>) -> Self {
        Self {
            state,
            events: VecDeque::new(),
            reliable: VecDeque::new(),
            unreliable: Vec::new(),
            peer,
        }
    }

    /// Marks the endpoint closed and releases everything in flight to it.
    ///
    /// Undelivered events are discarded as well when `discard_events` is set.
    fn shut(&mut self, pool: &BufferPool, discard_events: bool) -> bool {
        if self.state == SocketState::Closed {
            return false;
        }
        self.state = SocketState::Closed;
        for (_, payload) in self.reliable.drain(..) {
            payload.release(pool);
        }
        for (_, payload) in self.unreliable.drain(..) {
            payload.release(pool);
        }
        if discard_events {
            for event in self.events.drain(..) {
                if let SocketEvent::Message { payload, .. } = event {
                    payload.release(pool);
                }
            }
        }
        self.events.push_back(SocketEvent::Closed);
        true
    }

    fn deliver_reliable(&mut self, now: Duration) {
        while self.reliable.front().is_some_and(|(due, _)| *due <= now) {
            if let Some((_, payload)) = self.reliable.pop_front() {
                self.events.push_back(SocketEvent::Message {
                    payload,
                    unreliable: false,
                });
            }
        }
    }

    fn deliver_unreliable(&mut self, now: Duration, pool: &BufferPool) {
        let (due, pending): (Vec<_>, Vec<_>) = std::mem::take(&mut self.unreliable)
            .into_iter()
            .partition(|(at, _)| *at <= now);
        self.unreliable = pending;
        let mut due = due.into_iter().rev();
        if let Some((_, payload)) = due.next() {
            self.events.push_back(SocketEvent::Message {
                payload,
                unreliable: true,
            });
        }
        for (_, stale) in due {
            debug!("memory socket dropped superseded unreliable payload");
            stale.release(pool);
        }
    }
}

/// Closes `endpoint` and its peer. Returns `false` if it was already closed.
fn close_pair(endpoint: &Shared, pool: &BufferPool) -> bool {
    if !endpoint.borrow_mut().shut(pool, true) {
        return false;
    }
    let peer = endpoint.borrow().peer.upgrade();
    if let Some(peer) = peer {
        peer.borrow_mut().shut(pool, false);
    }
    true
}

/// One end of an in-memory connection.
pub struct MemorySocket {
    link: Link,
    endpoint: Shared,
    server: Weak<RefCell<ServerInner>>,
}

impl MemorySocket {
    fn connect(link: &Link, client: &Weak<RefCell<Endpoint>>, server: &Weak<RefCell<ServerInner>>) {
        let Some(client) = client.upgrade() else {
            return;
        };
        if client.borrow().state != SocketState::Opening {
            return;
        }
        let server = server
            .upgrade()
            .filter(|server| server.borrow().state == SocketState::Open);
        let Some(server) = server else {
            debug!("memory socket refused: server not listening");
            close_pair(&client, &link.pool);
            return;
        };

        let remote = Rc::new(RefCell::new(Endpoint::new(
            SocketState::Open,
            Rc::downgrade(&client),
        )));
        {
            let mut client = client.borrow_mut();
            client.state = SocketState::Open;
            client.peer = Rc::downgrade(&remote);
            client.events.push_back(SocketEvent::Ready);
        }
        let mut server = server.borrow_mut();
        server.clients.retain(|client| {
            client
                .upgrade()
                .is_some_and(|client| client.borrow().state != SocketState::Closed)
        });
        server.clients.push(Rc::downgrade(&remote));
        server
            .events
            .push_back(ServerSocketEvent::Connection(Self {
                link: link.clone(),
                endpoint: remote,
                server: Weak::new(),
            }));
    }
}

impl Socket for MemorySocket {
    fn open(&mut self) -> ProtocolResult<()> {
        {
            let mut endpoint = self.endpoint.borrow_mut();
            match endpoint.state {
                SocketState::Closed => return Err(ProtocolError::SocketClosed),
                SocketState::Opening | SocketState::Open => {
                    return Err(ProtocolError::SocketAlreadyOpen)
                }
                SocketState::Idle => endpoint.state = SocketState::Opening,
            }
        }
        let link = self.link.clone();
        let client = Rc::downgrade(&self.endpoint);
        let server = self.server.clone();
        self.link.scheduler.defer_after(self.link.latency, move || {
            Self::connect(&link, &client, &server);
        });
        Ok(())
    }

    fn send(&mut self, payload: Payload, unreliable: bool) -> ProtocolResult<()> {
        let state = self.endpoint.borrow().state;
        match state {
            SocketState::Open => {}
            SocketState::Closed => {
                payload.release(&self.link.pool);
                return Err(ProtocolError::SocketClosed);
            }
            SocketState::Idle | SocketState::Opening => {
                payload.release(&self.link.pool);
                return Err(ProtocolError::NotConnected);
            }
        }
        let peer = self.endpoint.borrow().peer.upgrade();
        let Some(peer) = peer else {
            payload.release(&self.link.pool);
            return Err(ProtocolError::SocketClosed);
        };

        let due = self.link.scheduler.now().saturating_add(self.link.latency);
        trace!(
            "memory socket queued {} bytes ({})",
            payload.len(),
            if unreliable { "unreliable" } else { "reliable" }
        );
        if unreliable {
            peer.borrow_mut().unreliable.push((due, payload));
        } else {
            peer.borrow_mut().reliable.push_back((due, payload));
        }

        let target = Rc::downgrade(&peer);
        let link = self.link.clone();
        self.link.scheduler.defer_after(self.link.latency, move || {
            let Some(endpoint) = target.upgrade() else {
                return;
            };
            let mut endpoint = endpoint.borrow_mut();
            if endpoint.state != SocketState::Open {
                return;
            }
            let now = link.scheduler.now();
            if unreliable {
                endpoint.deliver_unreliable(now, &link.pool);
            } else {
                endpoint.deliver_reliable(now);
            }
        });
        Ok(())
    }

    fn poll(&mut self) -> Option<SocketEvent> {
        self.endpoint.borrow_mut().events.pop_front()
    }

    fn close(&mut self) {
        close_pair(&self.endpoint, &self.link.pool);
    }

    fn state(&self) -> SocketState {
        self.endpoint.borrow().state
    }
}

impl Drop for MemorySocket {
    fn drop(&mut self) {
        self.close();
    }
}

impl fmt::Debug for MemorySocket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemorySocket")
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

struct ServerInner {
    state: SocketState,
    events: VecDeque<ServerSocketEvent<MemorySocket>>,
    clients: Vec<Weak<RefCell<Endpoint>>>,
}

/// In-memory listener.
pub struct MemoryServer {
    link: Link,
    inner: Rc<RefCell<ServerInner>>,
}

impl SocketServer for MemoryServer {
    type Socket = MemorySocket;

    fn start(&mut self) -> ProtocolResult<()> {
        {
            let mut inner = self.inner.borrow_mut();
            match inner.state {
                SocketState::Closed => return Err(ProtocolError::SocketClosed),
                SocketState::Opening | SocketState::Open => {
                    return Err(ProtocolError::AlreadyStarted)
                }
                SocketState::Idle => inner.state = SocketState::Opening,
            }
        }
        let inner = Rc::downgrade(&self.inner);
        self.link.scheduler.defer(move || {
            let Some(inner) = inner.upgrade() else {
                return;
            };
            let mut inner = inner.borrow_mut();
            if inner.state == SocketState::Opening {
                inner.state = SocketState::Open;
                inner.events.push_back(ServerSocketEvent::Ready);
            }
        });
        Ok(())
    }

    fn poll(&mut self) -> Option<ServerSocketEvent<MemorySocket>> {
        self.inner.borrow_mut().events.pop_front()
    }

    fn close(&mut self) {
        let (pending, clients) = {
            let mut inner = self.inner.borrow_mut();
            if inner.state == SocketState::Closed {
                return;
            }
            inner.state = SocketState::Closed;
            (
                std::mem::take(&mut inner.events),
                std::mem::take(&mut inner.clients),
            )
        };
        // Unclaimed connections close as they drop.
        drop(pending);
        for client in clients.iter().filter_map(Weak::upgrade) {
            close_pair(&client, &self.link.pool);
        }
        self.inner
            .borrow_mut()
            .events
            .push_back(ServerSocketEvent::Closed);
    }

    fn clients(&self) -> usize {
        self.inner
            .borrow()
            .clients
            .iter()
            .filter_map(Weak::upgrade)
            .filter(|client| client.borrow().state == SocketState::Open)
            .count()
    }
}

impl Drop for MemoryServer {
    fn drop(&mut self) {
        self.close();
    }
}

impl fmt::Debug for MemoryServer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryServer")
            .field("state", &self.inner.borrow().state)
            .field("clients", &self.clients())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn listening(net: &MemoryNetwork) -> MemoryServer {
        let mut server = net.server();
        server.start().unwrap();
        net.scheduler().run_until_idle();
        assert!(matches!(server.poll(), Some(ServerSocketEvent::Ready)));
        server
    }

    fn connected(net: &MemoryNetwork, server: &mut MemoryServer) -> (MemorySocket, MemorySocket) {
        let mut client = net.socket(server);
        client.open().unwrap();
        net.scheduler().run_until_idle();
        assert_eq!(client.poll(), Some(SocketEvent::Ready));
        let Some(ServerSocketEvent::Connection(remote)) = server.poll() else {
            panic!("expected connection");
        };
        (client, remote)
    }

    fn messages(socket: &mut MemorySocket) -> Vec<(Vec<u8>, bool)> {
        let mut out = Vec::new();
        while let Some(event) = socket.poll() {
            if let SocketEvent::Message {
                payload,
                unreliable,
            } = event
            {
                out.push((payload.as_bytes().to_vec(), unreliable));
            }
        }
        out
    }

    #[test]
    fn start_and_open_complete_asynchronously() {
        let net = MemoryNetwork::default();
        let mut server = net.server();
        server.start().unwrap();
        assert!(server.poll().is_none());
        net.scheduler().run_until_idle();
        assert!(matches!(server.poll(), Some(ServerSocketEvent::Ready)));

        let mut client = net.socket(&server);
        client.open().unwrap();
        assert_eq!(client.state(), SocketState::Opening);
        assert!(client.poll().is_none());
        net.scheduler().run_until_idle();
        assert_eq!(client.poll(), Some(SocketEvent::Ready));
        assert_eq!(server.clients(), 1);
    }

    #[test]
    fn closed_connections_are_forgotten() {
        let net = MemoryNetwork::default();
        let mut server = listening(&net);
        for _ in 0..5 {
            let (mut client, remote) = connected(&net, &mut server);
            client.close();
            drop(remote);
        }
        let (_client, _remote) = connected(&net, &mut server);
        assert_eq!(server.inner.borrow().clients.len(), 1);
        assert_eq!(server.clients(), 1);
    }

    #[test]
    fn reliable_messages_arrive_in_order() {
        let net = MemoryNetwork::default();
        let mut server = listening(&net);
        let (mut client, mut remote) = connected(&net, &mut server);

        for n in 0..4u8 {
            client.send(Payload::Binary(vec![n]), false).unwrap();
        }
        assert!(remote.poll().is_none());
        net.scheduler().run_until_idle();
        let got = messages(&mut remote);
        assert_eq!(
            got,
            vec![(vec![0], false), (vec![1], false), (vec![2], false), (vec![3], false)]
        );
    }

    #[test]
    fn unreliable_keeps_newest_and_recycles_the_rest() {
        let net = MemoryNetwork::default();
        let mut server = listening(&net);
        let (mut client, mut remote) = connected(&net, &mut server);

        for n in 0..3u8 {
            let mut buf = net.pool().alloc(8);
            buf.push(n);
            client.send(Payload::Binary(buf), true).unwrap();
        }
        net.scheduler().run_until_idle();
        assert_eq!(messages(&mut remote), vec![(vec![2], true)]);
        assert_eq!(net.pool().stats().frees, 2);
    }

    #[test]
    fn latency_delays_delivery() {
        let net = MemoryNetwork::default().with_latency(Duration::from_millis(30));
        let mut server = listening(&net);
        let mut client = net.socket(&server);
        client.open().unwrap();
        net.scheduler().run_until_idle();
        assert!(client.poll().is_none());
        net.scheduler().advance(Duration::from_millis(30));
        assert_eq!(client.poll(), Some(SocketEvent::Ready));
        let Some(ServerSocketEvent::Connection(mut remote)) = server.poll() else {
            panic!("expected connection");
        };

        remote.send(Payload::Text("hi".into()), false).unwrap();
        net.scheduler().advance(Duration::from_millis(29));
        assert!(client.poll().is_none());
        net.scheduler().advance(Duration::from_millis(1));
        assert_eq!(messages(&mut client), vec![(b"hi".to_vec(), false)]);
    }

    #[test]
    fn close_cancels_delivery_and_notifies_both_ends() {
        let net = MemoryNetwork::default();
        let mut server = listening(&net);
        let (mut client, mut remote) = connected(&net, &mut server);

        let mut buf = net.pool().alloc(8);
        buf.push(1);
        client.send(Payload::Binary(buf), false).unwrap();
        client.close();
        assert_eq!(net.pool().stats().frees, 1);

        net.scheduler().run_until_idle();
        assert_eq!(remote.poll(), Some(SocketEvent::Closed));
        assert!(remote.poll().is_none());
        assert_eq!(client.poll(), Some(SocketEvent::Closed));
        assert_eq!(server.clients(), 0);

        client.close();
        assert!(client.poll().is_none());
        assert_eq!(client.open(), Err(ProtocolError::SocketClosed));
        assert_eq!(
            client.send(Payload::Text("x".into()), false),
            Err(ProtocolError::SocketClosed)
        );
    }

    #[test]
    fn opening_twice_is_rejected() {
        let net = MemoryNetwork::default();
        let server = listening(&net);
        let mut client = net.socket(&server);
        client.open().unwrap();
        assert_eq!(client.open(), Err(ProtocolError::SocketAlreadyOpen));
    }

    #[test]
    fn connecting_to_idle_server_is_refused() {
        let net = MemoryNetwork::default();
        let server = net.server();
        let mut client = net.socket(&server);
        client.open().unwrap();
        net.scheduler().run_until_idle();
        assert_eq!(client.poll(), Some(SocketEvent::Closed));
        assert_eq!(client.state(), SocketState::Closed);
    }

    #[test]
    fn server_close_closes_clients() {
        let net = MemoryNetwork::default();
        let mut server = listening(&net);
        let (mut client, _remote) = connected(&net, &mut server);
        server.close();
        server.close();
        assert!(matches!(server.poll(), Some(ServerSocketEvent::Closed)));
        assert!(server.poll().is_none());
        assert_eq!(client.poll(), Some(SocketEvent::Closed));
        assert_eq!(server.start(), Err(ProtocolError::SocketClosed));
    }
}
