//! Per-connection bookkeeping shared by servers and clients.

use bytestream::{BufferPool, ByteWriter};
use codec::Tick;
use log::debug;
use replication::{ParseOutcome, Receiver};
use schema::Value;
use wire::{encode_ack, encode_forget, Frame};

use crate::config::ProtocolConfig;
use crate::dispatcher::Dispatcher;
use crate::error::ProtocolResult;
use crate::socket::{Payload, Socket};

/// What a received payload meant for the owner of the connection.
#[derive(Debug)]
pub(crate) enum Incoming {
    /// The peer's handshake matched.
    Handshake,
    /// The mirrored peer state advanced to this tick.
    State(Tick),
    Ack(Tick),
    Forget(Tick),
    Message { name: String, value: Value },
    /// Stale state or an early unreliable payload.
    Ignored,
}

/// Handshake status and mirrored state of the remote side.
#[derive(Debug)]
pub(crate) struct Peer {
    receiver: Receiver,
    handshaken: bool,
}

impl Peer {
    pub(crate) fn new(dispatcher: &Dispatcher, config: &ProtocolConfig) -> Self {
        Self {
            receiver: Receiver::new(
                dispatcher.remote_state(),
                config.replication,
                config.codec_limits.clone(),
            ),
            handshaken: false,
        }
    }

    pub(crate) const fn is_handshaken(&self) -> bool {
        self.handshaken
    }

    pub(crate) const fn receiver(&self) -> &Receiver {
        &self.receiver
    }

    /// Handles one payload and returns its buffer to `pool`.
    ///
    /// State packets are acknowledged on `socket` before returning.
    pub(crate) fn receive<S: Socket>(
        &mut self,
        socket: &mut S,
        dispatcher: &Dispatcher,
        pool: &BufferPool,
        payload: Payload,
        unreliable: bool,
    ) -> ProtocolResult<Incoming> {
        let incoming = self.dispatch(socket, dispatcher, pool, payload.as_bytes(), unreliable);
        payload.release(pool);
        incoming
    }

    fn dispatch<S: Socket>(
        &mut self,
        socket: &mut S,
        dispatcher: &Dispatcher,
        pool: &BufferPool,
        bytes: &[u8],
        unreliable: bool,
    ) -> ProtocolResult<Incoming> {
        if !self.handshaken {
            if unreliable {
                debug!("ignoring unreliable payload received before handshake");
                return Ok(Incoming::Ignored);
            }
            dispatcher.check_handshake(bytes)?;
            self.handshaken = true;
            return Ok(Incoming::Handshake);
        }

        match dispatcher.decode_frame(bytes)? {
            Frame::State(packet) => {
                let outcome = self.receiver.apply(dispatcher.remote_state(), &packet)?;
                let ParseOutcome::Applied {
                    tick,
                    ack,
                    forget,
                    advanced,
                } = outcome
                else {
                    return Ok(Incoming::Ignored);
                };
                send_with(socket, pool, false, |out| {
                    encode_ack(ack, out);
                    Ok(())
                })?;
                if let Some(horizon) = forget {
                    send_with(socket, pool, false, |out| {
                        encode_forget(horizon, out);
                        Ok(())
                    })?;
                }
                Ok(if advanced {
                    Incoming::State(tick)
                } else {
                    Incoming::Ignored
                })
            }
            Frame::Ack(tick) => Ok(Incoming::Ack(tick)),
            Frame::Forget(horizon) => Ok(Incoming::Forget(horizon)),
            Frame::Message { id, body } => {
                let (name, value) = dispatcher.decode_message(id, body)?;
                Ok(Incoming::Message {
                    name: name.to_owned(),
                    value,
                })
            }
        }
    }
}

/// Sends the local handshake as a reliable text payload.
pub(crate) fn send_handshake<S: Socket>(
    socket: &mut S,
    dispatcher: &Dispatcher,
) -> ProtocolResult<()> {
    socket.send(dispatcher.handshake_payload()?, false)
}

/// Fills a pooled buffer with `write` and sends it.
pub(crate) fn send_with<S, F>(
    socket: &mut S,
    pool: &BufferPool,
    unreliable: bool,
    write: F,
) -> ProtocolResult<()>
where
    S: Socket,
    F: FnOnce(&mut ByteWriter) -> ProtocolResult<()>,
{
    let mut out = ByteWriter::new(pool);
    write(&mut out)?;
    socket.send(Payload::Binary(out.finish()), unreliable)
}

/// Sends a pooled copy of `bytes`.
pub(crate) fn send_copy<S: Socket>(
    socket: &mut S,
    pool: &BufferPool,
    bytes: &[u8],
    unreliable: bool,
) -> ProtocolResult<()> {
    let mut buf = pool.alloc(bytes.len());
    buf.extend_from_slice(bytes);
    socket.send(Payload::Binary(buf), unreliable)
}
