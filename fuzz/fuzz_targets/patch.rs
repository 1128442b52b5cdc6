#![no_main]

use codec::{alloc, patch_bytes, CodecLimits};
use libfuzzer_sys::fuzz_target;
use schema::{SchemaType, StructType, UnionType};

fn unit() -> SchemaType {
    let shape = SchemaType::union(
        UnionType::new()
            .variant("circle", SchemaType::float32())
            .variant("label", SchemaType::ascii()),
    )
    .unwrap();
    SchemaType::structure(
        StructType::new()
            .field("alive", SchemaType::boolean())
            .field("hp", SchemaType::int16())
            .field("pos", SchemaType::array(SchemaType::float64(), 3).unwrap())
            .field("name", SchemaType::utf8())
            .field("tags", SchemaType::dictionary(SchemaType::uint8()).unwrap())
            .field("shape", shape),
    )
    .unwrap()
}

fuzz_target!(|data: &[u8]| {
    let ty = unit();
    let limits = CodecLimits::for_testing();
    let mut base = alloc(&ty);

    // Feed successive chunks as diffs, keeping every successful result as
    // the next base.
    let mut idx = 0usize;
    while idx < data.len() && idx < 4096 {
        let len = usize::from(data[idx] % 96);
        idx += 1;
        let end = (idx + len).min(data.len());
        if let Ok(next) = patch_bytes(&ty, &base, &data[idx..end], &limits) {
            base = next;
        }
        idx = end;
    }
});
