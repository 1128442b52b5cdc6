//! State packet header.

use bytestream::{ByteReader, ByteWriter};
use codec::Tick;

use crate::error::{WireError, WireResult};

/// State header size in bytes.
pub const STATE_HEADER_SIZE: usize = 4 + 4;

/// Ticks carried in front of every state diff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateHeader {
    /// Tick the diff produces.
    pub tick: Tick,
    /// Tick of the value the diff applies to.
    pub base_tick: Tick,
}

impl StateHeader {
    /// Creates a header.
    #[must_use]
    pub const fn new(tick: Tick, base_tick: Tick) -> Self {
        Self { tick, base_tick }
    }
}

/// A decoded state packet: header plus the raw diff bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatePacket<'a> {
    pub header: StateHeader,
    pub diff: &'a [u8],
}

/// Writes a state header.
pub fn encode_state_header(header: &StateHeader, out: &mut ByteWriter) {
    out.write_u32(header.tick.raw());
    out.write_u32(header.base_tick.raw());
}

/// Splits a state packet into header and diff.
pub fn decode_state_packet(buf: &[u8]) -> WireResult<StatePacket<'_>> {
    if buf.len() < STATE_HEADER_SIZE {
        return Err(WireError::PacketTooSmall {
            actual: buf.len(),
            required: STATE_HEADER_SIZE,
        });
    }
    let mut reader = ByteReader::new(buf);
    let tick = Tick::new(reader.read_u32()?);
    let base_tick = Tick::new(reader.read_u32()?);
    Ok(StatePacket {
        header: StateHeader { tick, base_tick },
        diff: reader.rest(),
    })
}
