//! Frame kinds and decoding.
//!
//! Every payload after the handshake is one frame: a `varu32` kind followed
//! by a kind-specific body.
//!
//! | kind     | body                                   |
//! |----------|----------------------------------------|
//! | 0        | state packet (`[tick][base_tick][diff]`) |
//! | 1        | ack: `u32` tick                        |
//! | 2        | forget: `u32` horizon                  |
//! | 3 + id   | application message `id`, full value   |

use bytestream::{ByteReader, ByteWriter};
use codec::Tick;

use crate::error::{WireError, WireResult};
use crate::header::{decode_state_packet, encode_state_header, StateHeader, StatePacket};
use crate::limits::Limits;

/// Frame kind of a state packet.
pub const KIND_STATE: u32 = 0;

/// Frame kind of an acknowledgement.
pub const KIND_ACK: u32 = 1;

/// Frame kind of a forget notice.
pub const KIND_FORGET: u32 = 2;

/// Frame kind of application message 0; message `id` uses `KIND_MESSAGE_BASE + id`.
pub const KIND_MESSAGE_BASE: u32 = 3;

/// A decoded frame borrowing from the received payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Frame<'a> {
    /// Replicated state diff.
    State(StatePacket<'a>),
    /// The peer holds the state at this tick.
    Ack(Tick),
    /// The peer dropped every state older than this tick, except tick 0.
    Forget(Tick),
    /// Application message, fully encoded.
    Message { id: u32, body: &'a [u8] },
}

impl Frame<'_> {
    /// Returns the raw frame kind.
    #[must_use]
    pub const fn kind(&self) -> u32 {
        match self {
            Self::State(_) => KIND_STATE,
            Self::Ack(_) => KIND_ACK,
            Self::Forget(_) => KIND_FORGET,
            Self::Message { id, .. } => KIND_MESSAGE_BASE.wrapping_add(*id),
        }
    }
}

/// Decodes one frame.
pub fn decode_frame<'a>(buf: &'a [u8], limits: &Limits) -> WireResult<Frame<'a>> {
    limits.check_packet(buf.len())?;
    let mut reader = ByteReader::new(buf);
    let kind = reader.read_varu32()?;
    let frame = match kind {
        KIND_STATE => Frame::State(decode_state_packet(reader.rest())?),
        KIND_ACK => Frame::Ack(read_tick_body(&mut reader)?),
        KIND_FORGET => Frame::Forget(read_tick_body(&mut reader)?),
        _ => {
            let body = reader.rest();
            limits.check_message(body.len())?;
            Frame::Message {
                id: kind - KIND_MESSAGE_BASE,
                body,
            }
        }
    };
    Ok(frame)
}

/// Writes the frame kind and header of a state packet.
///
/// The caller appends the diff bytes.
pub fn begin_state_frame(header: &StateHeader, out: &mut ByteWriter) {
    out.write_varu32(KIND_STATE);
    encode_state_header(header, out);
}

/// Writes the frame kind of an application message.
///
/// The caller appends the fully encoded message value.
pub fn begin_message_frame(id: u32, out: &mut ByteWriter) -> WireResult<()> {
    let kind = KIND_MESSAGE_BASE
        .checked_add(id)
        .ok_or(WireError::MessageIdOverflow { id })?;
    out.write_varu32(kind);
    Ok(())
}

/// Writes a complete acknowledgement frame.
pub fn encode_ack(tick: Tick, out: &mut ByteWriter) {
    out.write_varu32(KIND_ACK);
    out.write_u32(tick.raw());
}

/// Writes a complete forget frame.
pub fn encode_forget(horizon: Tick, out: &mut ByteWriter) {
    out.write_varu32(KIND_FORGET);
    out.write_u32(horizon.raw());
}

fn read_tick_body(reader: &mut ByteReader<'_>) -> WireResult<Tick> {
    let tick = Tick::new(reader.read_u32()?);
    if !reader.is_empty() {
        return Err(WireError::TrailingBytes {
            remaining: reader.remaining(),
        });
    }
    Ok(tick)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LimitKind;
    use bytestream::BufferPool;

    fn written(f: impl FnOnce(&mut ByteWriter)) -> Vec<u8> {
        let pool = BufferPool::new();
        let mut out = ByteWriter::new(&pool);
        f(&mut out);
        out.finish()
    }

    #[test]
    fn ack_roundtrip() {
        let bytes = written(|out| encode_ack(Tick::new(7), out));
        assert_eq!(bytes, vec![1, 7, 0, 0, 0]);
        let frame = decode_frame(&bytes, &Limits::default()).unwrap();
        assert_eq!(frame, Frame::Ack(Tick::new(7)));
        assert_eq!(frame.kind(), KIND_ACK);
    }

    #[test]
    fn forget_roundtrip() {
        let bytes = written(|out| encode_forget(Tick::new(3), out));
        assert_eq!(
            decode_frame(&bytes, &Limits::default()).unwrap(),
            Frame::Forget(Tick::new(3))
        );
    }

    #[test]
    fn state_frame_carries_diff() {
        let bytes = written(|out| {
            begin_state_frame(&StateHeader::new(Tick::new(2), Tick::new(1)), out);
            out.write_bytes(&[0xAA]);
        });
        let Frame::State(packet) = decode_frame(&bytes, &Limits::default()).unwrap() else {
            panic!("expected state frame");
        };
        assert_eq!(packet.header.tick, Tick::new(2));
        assert_eq!(packet.header.base_tick, Tick::new(1));
        assert_eq!(packet.diff, &[0xAA]);
    }

    #[test]
    fn message_kind_is_offset_by_base() {
        let bytes = written(|out| {
            begin_message_frame(4, out).unwrap();
            out.write_u8(9);
        });
        assert_eq!(bytes[0], 7);
        assert_eq!(
            decode_frame(&bytes, &Limits::default()).unwrap(),
            Frame::Message { id: 4, body: &[9] }
        );
    }

    #[test]
    fn message_id_overflow() {
        let pool = BufferPool::new();
        let mut out = ByteWriter::new(&pool);
        assert_eq!(
            begin_message_frame(u32::MAX, &mut out),
            Err(WireError::MessageIdOverflow { id: u32::MAX })
        );
    }

    #[test]
    fn ack_rejects_trailing_bytes() {
        let err = decode_frame(&[1, 7, 0, 0, 0, 0], &Limits::default()).unwrap_err();
        assert_eq!(err, WireError::TrailingBytes { remaining: 1 });
    }

    #[test]
    fn ack_rejects_short_body() {
        let err = decode_frame(&[1, 7], &Limits::default()).unwrap_err();
        assert!(matches!(err, WireError::Stream(_)));
    }

    #[test]
    fn empty_payload_is_rejected() {
        assert!(decode_frame(&[], &Limits::default()).is_err());
    }

    #[test]
    fn limits_are_enforced() {
        let limits = Limits {
            max_packet_bytes: 4,
            ..Limits::for_testing()
        };
        let err = decode_frame(&[1, 7, 0, 0, 0], &limits).unwrap_err();
        assert!(matches!(
            err,
            WireError::LimitsExceeded {
                kind: LimitKind::PacketBytes,
                ..
            }
        ));

        let limits = Limits {
            max_message_bytes: 1,
            ..Limits::for_testing()
        };
        let err = decode_frame(&[3, 1, 2], &limits).unwrap_err();
        assert!(matches!(
            err,
            WireError::LimitsExceeded {
                kind: LimitKind::MessageBytes,
                ..
            }
        ));
    }
}
