//! Schema-bound replication over an abstract socket.
//!
//! A [`ReplicaServer`] and any number of [`ReplicaClient`]s share a
//! [`ProtocolSchema`]: one state type and a set of named messages per side.
//! On connect both ends exchange a JSON handshake with the structural hash of
//! each side and drop the connection on mismatch. After that, every payload
//! is one [`wire::Frame`]: state diffs, acknowledgements, forget notices, or
//! application messages.
//!
//! Transports implement [`Socket`] and [`SocketServer`]. The [`memory`]
//! module provides an in-process transport driven by a [`Scheduler`].
//!
//! # Design Principles
//!
//! - **Poll driven** - Servers and clients only act inside `poll`, `commit`
//!   and `send`; there are no callbacks.
//! - **Never synchronous** - Opening, starting and delivery always complete
//!   on a later scheduler turn.
//! - **Connection-scoped failures** - A peer that breaks the protocol is
//!   closed without affecting other connections.

mod client;
mod config;
mod dispatcher;
mod error;
pub mod memory;
mod peer;
mod scheduler;
mod schema_set;
mod server;
mod socket;

pub use client::{ClientEvent, ReplicaClient};
pub use config::ProtocolConfig;
pub use dispatcher::{Dispatcher, Side};
pub use error::{ProtocolError, ProtocolResult};
pub use scheduler::Scheduler;
pub use schema_set::{MessageTable, ProtocolSchema, SideSchema};
pub use server::{ClientId, ReplicaServer, ServerEvent};
pub use socket::{Payload, ServerSocketEvent, Socket, SocketEvent, SocketServer, SocketState};
