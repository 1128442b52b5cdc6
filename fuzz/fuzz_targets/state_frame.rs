#![no_main]

use codec::CodecLimits;
use libfuzzer_sys::fuzz_target;
use replication::{Receiver, ReplicationConfig};
use schema::{SchemaType, StructType};
use wire::{decode_frame, Frame, Limits};

fn counter() -> SchemaType {
    SchemaType::structure(
        StructType::new()
            .field("x", SchemaType::int32())
            .field("names", SchemaType::dictionary(SchemaType::ascii()).unwrap()),
    )
    .unwrap()
}

fuzz_target!(|data: &[u8]| {
    let ty = counter();
    let limits = Limits::for_testing();
    let mut receiver = Receiver::new(
        &ty,
        ReplicationConfig::with_window(1),
        CodecLimits::for_testing(),
    );

    let mut idx = 0usize;
    while idx < data.len() && idx < 4096 {
        let len = usize::from(data[idx] % 120).saturating_add(1);
        idx += 1;
        let end = (idx + len).min(data.len());
        if let Ok(Frame::State(packet)) = decode_frame(&data[idx..end], &limits) {
            let _ = receiver.apply(&ty, &packet);
        }
        idx = end;
    }
});
