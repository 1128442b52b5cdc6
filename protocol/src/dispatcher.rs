//! Binding of a schema set to one side of a connection.

use bytestream::ByteWriter;
use codec::{check_limits, decode_bytes, encode, CodecLimits};
use schema::{SchemaType, Value};
use wire::{
    begin_message_frame, decode_frame, decode_handshake, encode_handshake, Frame, Handshake, Limits,
    WireError,
};

use crate::config::ProtocolConfig;
use crate::error::{ProtocolError, ProtocolResult};
use crate::schema_set::{MessageTable, ProtocolSchema, SideSchema};
use crate::socket::Payload;

/// Which end of the connection a dispatcher serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    Client,
    Server,
}

/// Converts between values and payloads for one side of a protocol.
///
/// The local side's schema governs what is published and sent; the remote
/// side's governs what is received.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    side: Side,
    schema: ProtocolSchema,
    handshake: Handshake,
    outgoing: MessageTable,
    incoming: MessageTable,
    wire_limits: Limits,
    codec_limits: CodecLimits,
}

impl Dispatcher {
    #[must_use]
    pub fn new(schema: ProtocolSchema, side: Side, config: &ProtocolConfig) -> Self {
        let (local, remote) = match side {
            Side::Client => (&schema.client, &schema.server),
            Side::Server => (&schema.server, &schema.client),
        };
        let outgoing = MessageTable::new(local);
        let incoming = MessageTable::new(remote);
        Self {
            side,
            handshake: schema.handshake(),
            schema,
            outgoing,
            incoming,
            wire_limits: config.wire_limits.clone(),
            codec_limits: config.codec_limits.clone(),
        }
    }

    #[must_use]
    pub const fn side(&self) -> Side {
        self.side
    }

    #[must_use]
    pub const fn schema(&self) -> &ProtocolSchema {
        &self.schema
    }

    /// Returns the hashes this side expects from its peer.
    #[must_use]
    pub const fn handshake(&self) -> &Handshake {
        &self.handshake
    }

    /// Returns the schema this side publishes.
    #[must_use]
    pub const fn local(&self) -> &SideSchema {
        match self.side {
            Side::Client => &self.schema.client,
            Side::Server => &self.schema.server,
        }
    }

    /// Returns the schema the peer publishes.
    #[must_use]
    pub const fn remote(&self) -> &SideSchema {
        match self.side {
            Side::Client => &self.schema.server,
            Side::Server => &self.schema.client,
        }
    }

    #[must_use]
    pub const fn codec_limits(&self) -> &CodecLimits {
        &self.codec_limits
    }

    /// Builds the handshake payload sent first on every connection.
    pub fn handshake_payload(&self) -> ProtocolResult<Payload> {
        let bytes = encode_handshake(&self.handshake)?;
        let text = String::from_utf8(bytes).map_err(|err| WireError::MalformedHandshake {
            reason: err.to_string(),
        })?;
        Ok(Payload::Text(text))
    }

    /// Validates the peer's handshake against this side's hashes.
    pub fn check_handshake(&self, bytes: &[u8]) -> ProtocolResult<()> {
        let remote = decode_handshake(bytes, &self.wire_limits)?;
        if !remote.matches(&self.handshake) {
            return Err(ProtocolError::HandshakeMismatch {
                local: self.handshake.clone(),
                remote,
            });
        }
        Ok(())
    }

    /// Writes a complete message frame for the local message `name`.
    ///
    /// The value and the finished frame are checked against the limits the
    /// peer decodes with. Nothing is left in `out` on failure.
    pub fn encode_message(
        &self,
        name: &str,
        value: &Value,
        out: &mut ByteWriter,
    ) -> ProtocolResult<()> {
        let (id, ty) = self
            .outgoing
            .lookup(name)
            .ok_or_else(|| ProtocolError::UnknownMessage { name: name.into() })?;
        check_limits(ty, value, &self.codec_limits)?;
        let start = out.len();
        let written = self.write_message(id, ty, value, start, out);
        if written.is_err() {
            out.truncate(start);
        }
        written
    }

    fn write_message(
        &self,
        id: u32,
        ty: &SchemaType,
        value: &Value,
        start: usize,
        out: &mut ByteWriter,
    ) -> ProtocolResult<()> {
        begin_message_frame(id, out)?;
        let body = out.len();
        encode(ty, value, out)?;
        self.wire_limits.check_message(out.len() - body)?;
        self.wire_limits.check_packet(out.len() - start)?;
        Ok(())
    }

    /// Decodes one post-handshake payload.
    pub fn decode_frame<'a>(&self, bytes: &'a [u8]) -> ProtocolResult<Frame<'a>> {
        Ok(decode_frame(bytes, &self.wire_limits)?)
    }

    /// Decodes the body of remote message `id`.
    pub fn decode_message(&self, id: u32, body: &[u8]) -> ProtocolResult<(&str, Value)> {
        let (name, ty) = self
            .incoming
            .get(id)
            .ok_or(ProtocolError::UnknownMessageId { id })?;
        let value = decode_bytes(ty, body, &self.codec_limits)?;
        Ok((name, value))
    }

    /// Returns the state type this side publishes.
    #[must_use]
    pub const fn local_state(&self) -> &SchemaType {
        self.local().state()
    }

    /// Returns the state type the peer publishes.
    #[must_use]
    pub const fn remote_state(&self) -> &SchemaType {
        self.remote().state()
    }
}
