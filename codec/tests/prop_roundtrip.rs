use std::collections::BTreeMap;

use bytestream::{BufferPool, ByteWriter};
use codec::{clone_value, decode_bytes, diff, encode, equal, patch_bytes, CodecLimits};
use proptest::prelude::*;
use schema::{SchemaType, StructType, UnionType, Value};

fn position() -> SchemaType {
    SchemaType::structure(
        StructType::new()
            .field("x", SchemaType::int16())
            .field("y", SchemaType::int16()),
    )
    .unwrap()
}

fn entity() -> SchemaType {
    SchemaType::structure(
        StructType::new()
            .field("alive", SchemaType::boolean())
            .field("level", SchemaType::int8())
            .field("hp", SchemaType::uint16())
            .field("speed", SchemaType::float32())
            .field("mass", SchemaType::float64())
            .field("tag", SchemaType::ascii())
            .field("title", SchemaType::utf8())
            .field("slots", SchemaType::array(SchemaType::uint32(), 3).unwrap())
            .field("stats", SchemaType::dictionary(SchemaType::uint8()).unwrap())
            .field(
                "motion",
                SchemaType::union(
                    UnionType::new()
                        .variant("idle", SchemaType::boolean())
                        .variant("moving", position()),
                )
                .unwrap(),
            ),
    )
    .unwrap()
}

fn float() -> impl Strategy<Value = f64> {
    prop_oneof![Just(0.0), Just(1.5), -1.0e6f64..1.0e6]
}

fn motion() -> impl Strategy<Value = Value> {
    prop_oneof![
        any::<bool>().prop_map(|b| Value::union(0, Value::Bool(b))),
        (any::<i64>(), any::<i64>()).prop_map(|(x, y)| {
            Value::union(1, Value::Struct(vec![Value::Int(x), Value::Int(y)]))
        }),
    ]
}

fn entity_value() -> impl Strategy<Value = Value> {
    (
        (any::<bool>(), any::<i64>(), any::<i64>(), float(), float()),
        ("[a-z]{0,6}", "\\PC{0,6}"),
        prop::collection::vec(any::<i64>(), 3),
        prop::collection::btree_map("[a-d]", any::<i64>(), 0..4),
        motion(),
    )
        .prop_map(|((alive, level, hp, speed, mass), (tag, title), slots, stats, motion)| {
            let stats: BTreeMap<String, Value> =
                stats.into_iter().map(|(k, v)| (k, Value::Int(v))).collect();
            Value::Struct(vec![
                Value::Bool(alive),
                Value::Int(level),
                Value::Int(hp),
                Value::Float(speed),
                Value::Float(mass),
                Value::String(tag),
                Value::String(title),
                Value::Array(slots.into_iter().map(Value::Int).collect()),
                Value::Dictionary(stats),
                motion,
            ])
        })
}

fn diff_bytes(ty: &SchemaType, base: &Value, target: &Value) -> (bool, Vec<u8>) {
    let pool = BufferPool::new();
    let mut out = ByteWriter::new(&pool);
    let changed = diff(ty, base, target, &mut out).unwrap();
    (changed, out.finish())
}

proptest! {
    #[test]
    fn prop_patch_inverts_diff(base in entity_value(), target in entity_value()) {
        let ty = entity();
        let (changed, bytes) = diff_bytes(&ty, &base, &target);
        let patched = patch_bytes(&ty, &base, &bytes, &CodecLimits::default()).unwrap();
        prop_assert!(equal(&ty, &patched, &target));
        prop_assert_eq!(changed, !equal(&ty, &base, &target));
    }

    #[test]
    fn prop_self_diff_is_empty(value in entity_value()) {
        let ty = entity();
        let (changed, bytes) = diff_bytes(&ty, &value, &value);
        prop_assert!(!changed);
        prop_assert!(bytes.is_empty());
    }

    #[test]
    fn prop_truncation_is_invisible(base in entity_value(), target in entity_value()) {
        let ty = entity();
        let normalised = clone_value(&ty, &target).unwrap();
        prop_assert!(equal(&ty, &normalised, &target));
        prop_assert_eq!(
            diff_bytes(&ty, &base, &target).1,
            diff_bytes(&ty, &base, &normalised).1
        );
    }

    #[test]
    fn prop_full_encoding_roundtrip(value in entity_value()) {
        let ty = entity();
        let pool = BufferPool::new();
        let mut out = ByteWriter::new(&pool);
        encode(&ty, &value, &mut out).unwrap();
        let decoded = decode_bytes(&ty, out.as_slice(), &CodecLimits::default()).unwrap();
        prop_assert_eq!(&decoded, &clone_value(&ty, &value).unwrap());
    }

    #[test]
    fn prop_patch_never_panics(
        base in entity_value(),
        bytes in prop::collection::vec(any::<u8>(), 0..64),
    ) {
        let _ = patch_bytes(&entity(), &base, &bytes, &CodecLimits::for_testing());
    }
}
