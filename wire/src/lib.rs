//! Packet framing and handshake for statecast.
//!
//! This crate handles the binary wire format: frame kinds, the state packet
//! header, and the JSON handshake that binds a schema set to a connection.
//! It does not know about schemas or values, only the layout of payloads.
//!
//! # Design Principles
//!
//! - **Closed dispatch** - Every payload decodes to one [`Frame`] variant.
//! - **Bounded decoding** - Payload sizes are validated against [`Limits`] first.
//! - **Borrowed bodies** - Decoded frames borrow from the received payload.

mod error;
mod frame;
mod handshake;
mod header;
mod limits;

pub use error::{LimitKind, WireError, WireResult};
pub use frame::{
    begin_message_frame, begin_state_frame, decode_frame, encode_ack, encode_forget, Frame,
    KIND_ACK, KIND_FORGET, KIND_MESSAGE_BASE, KIND_STATE,
};
pub use handshake::{decode_handshake, encode_handshake, Handshake};
pub use header::{
    decode_state_packet, encode_state_header, StateHeader, StatePacket, STATE_HEADER_SIZE,
};
pub use limits::Limits;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn public_api_exports() {
        let _ = Limits::default();
        let _ = STATE_HEADER_SIZE;
        let _ = Handshake::new("a", "b");
        let _: WireResult<()> = Ok(());
    }

    #[test]
    fn state_header_size_constant_correct() {
        use std::mem::size_of;
        assert_eq!(
            STATE_HEADER_SIZE,
            size_of::<u32>() // tick
                + size_of::<u32>() // base_tick
        );
    }

    #[test]
    fn frame_kinds_are_distinct() {
        let kinds = [KIND_STATE, KIND_ACK, KIND_FORGET, KIND_MESSAGE_BASE];
        for (i, a) in kinds.iter().enumerate() {
            for b in &kinds[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }
}
