use bytestream::{BufferPool, ByteWriter};
use codec::Tick;
use proptest::prelude::*;
use wire::{
    begin_message_frame, begin_state_frame, decode_frame, encode_ack, encode_forget, Frame,
    Limits, StateHeader,
};

proptest! {
    #[test]
    fn prop_state_frame_roundtrip(
        tick in any::<u32>(),
        base in any::<u32>(),
        diff in prop::collection::vec(any::<u8>(), 0..64),
    ) {
        let pool = BufferPool::new();
        let mut out = ByteWriter::new(&pool);
        begin_state_frame(&StateHeader::new(Tick::new(tick), Tick::new(base)), &mut out);
        out.write_bytes(&diff);

        let frame = decode_frame(out.as_slice(), &Limits::default()).unwrap();
        let Frame::State(packet) = frame else {
            panic!("expected state frame");
        };
        prop_assert_eq!(packet.header.tick.raw(), tick);
        prop_assert_eq!(packet.header.base_tick.raw(), base);
        prop_assert_eq!(packet.diff, diff.as_slice());
    }

    #[test]
    fn prop_control_frames_roundtrip(tick in any::<u32>(), forget in any::<bool>()) {
        let pool = BufferPool::new();
        let mut out = ByteWriter::new(&pool);
        if forget {
            encode_forget(Tick::new(tick), &mut out);
        } else {
            encode_ack(Tick::new(tick), &mut out);
        }
        let frame = decode_frame(out.as_slice(), &Limits::default()).unwrap();
        let expected = if forget {
            Frame::Forget(Tick::new(tick))
        } else {
            Frame::Ack(Tick::new(tick))
        };
        prop_assert_eq!(frame, expected);
    }

    #[test]
    fn prop_message_id_roundtrip(id in 0u32..100_000, body in prop::collection::vec(any::<u8>(), 0..32)) {
        let pool = BufferPool::new();
        let mut out = ByteWriter::new(&pool);
        begin_message_frame(id, &mut out).unwrap();
        out.write_bytes(&body);
        let frame = decode_frame(out.as_slice(), &Limits::default()).unwrap();
        prop_assert_eq!(frame, Frame::Message { id, body: body.as_slice() });
    }

    #[test]
    fn prop_decode_never_panics(bytes in prop::collection::vec(any::<u8>(), 0..64)) {
        let _ = decode_frame(&bytes, &Limits::for_testing());
    }
}
