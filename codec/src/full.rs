//! Full (non-delta) value encoding.
//!
//! Used for dictionary additions, union tag changes and application
//! messages. Integers are written at their declared width, floats at their
//! declared precision, strings as a `u32` byte count plus bytes, and
//! dictionaries as a `varu32` entry count followed by `(key, value)` pairs in
//! key order.

use std::collections::BTreeMap;

use bytestream::{ByteReader, ByteWriter, StreamError};
use schema::{FloatWidth, IntType, IntWidth, SchemaType, Value};

use crate::error::{CodecError, CodecResult, LimitKind, ValueReason};
use crate::limits::{check_limit, CodecLimits};

/// Encodes a complete value.
pub fn encode(ty: &SchemaType, value: &Value, out: &mut ByteWriter) -> CodecResult<()> {
    match (ty, value) {
        (SchemaType::Boolean, Value::Bool(v)) => out.write_bool(*v),
        (SchemaType::Int(int), Value::Int(v)) => write_int(*int, *v, out),
        (SchemaType::Float(width), Value::Float(v)) => write_float(*width, *v, out),
        (SchemaType::Ascii, Value::String(v)) => {
            if !v.is_ascii() {
                return Err(CodecError::InvalidValue {
                    reason: ValueReason::NonAscii,
                });
            }
            out.write_ascii(v)?;
        }
        (SchemaType::Utf8, Value::String(v)) => out.write_string(v)?,
        (SchemaType::Struct(def), Value::Struct(fields)) => {
            if fields.len() != def.fields().len() {
                return Err(CodecError::FieldCountMismatch {
                    expected: def.fields().len(),
                    found: fields.len(),
                });
            }
            for (field, value) in def.fields().iter().zip(fields) {
                encode(&field.ty, value, out)?;
            }
        }
        (SchemaType::Array(def), Value::Array(items)) => {
            if items.len() != def.len() {
                return Err(CodecError::ArrayLengthMismatch {
                    expected: def.len(),
                    found: items.len(),
                });
            }
            for item in items {
                encode(def.element(), item, out)?;
            }
        }
        (SchemaType::Dictionary(element), Value::Dictionary(entries)) => {
            write_count(entries.len(), out)?;
            for (key, value) in entries {
                out.write_string(key)?;
                encode(element, value, out)?;
            }
        }
        (SchemaType::Union(def), Value::Union { tag, value }) => {
            let variant = def.get(*tag).ok_or(CodecError::UnknownVariant {
                tag: *tag,
                variants: def.variants().len(),
            })?;
            out.write_varu32(*tag);
            encode(&variant.ty, value, out)?;
        }
        _ => return Err(CodecError::mismatch(ty, value)),
    }
    Ok(())
}

/// Decodes a complete value.
pub fn decode(
    ty: &SchemaType,
    reader: &mut ByteReader<'_>,
    limits: &CodecLimits,
) -> CodecResult<Value> {
    decode_at(ty, reader, limits, 0)
}

/// Decodes a complete value from `bytes`, rejecting trailing input.
pub fn decode_bytes(ty: &SchemaType, bytes: &[u8], limits: &CodecLimits) -> CodecResult<Value> {
    let mut reader = ByteReader::new(bytes);
    let value = decode(ty, &mut reader, limits)?;
    if !reader.is_empty() {
        return Err(CodecError::TrailingBytes {
            remaining: reader.remaining(),
        });
    }
    Ok(value)
}

pub(crate) fn decode_at(
    ty: &SchemaType,
    reader: &mut ByteReader<'_>,
    limits: &CodecLimits,
    depth: usize,
) -> CodecResult<Value> {
    let value = match ty {
        SchemaType::Boolean => Value::Bool(reader.read_bool()?),
        SchemaType::Int(int) => Value::Int(read_int(*int, reader)?),
        SchemaType::Float(width) => Value::Float(read_float(*width, reader)?),
        SchemaType::Ascii => Value::String(read_text(reader, limits, true)?),
        SchemaType::Utf8 => Value::String(read_text(reader, limits, false)?),
        SchemaType::Struct(def) => {
            let depth = enter(depth, limits)?;
            let mut fields = Vec::with_capacity(def.fields().len());
            for field in def.fields() {
                fields.push(decode_at(&field.ty, reader, limits, depth)?);
            }
            Value::Struct(fields)
        }
        SchemaType::Array(def) => {
            let depth = enter(depth, limits)?;
            let mut items = Vec::with_capacity(def.len());
            for _ in 0..def.len() {
                items.push(decode_at(def.element(), reader, limits, depth)?);
            }
            Value::Array(items)
        }
        SchemaType::Dictionary(element) => {
            let depth = enter(depth, limits)?;
            let count = read_count(reader, limits)?;
            let mut entries = BTreeMap::new();
            for _ in 0..count {
                let key = read_key(reader, limits)?;
                let value = decode_at(element, reader, limits, depth)?;
                if entries.contains_key(&key) {
                    return Err(CodecError::DuplicateKey { key });
                }
                entries.insert(key, value);
            }
            Value::Dictionary(entries)
        }
        SchemaType::Union(def) => {
            let depth = enter(depth, limits)?;
            let tag = reader.read_varu32()?;
            let variant = def.get(tag).ok_or(CodecError::UnknownVariant {
                tag,
                variants: def.variants().len(),
            })?;
            Value::union(tag, decode_at(&variant.ty, reader, limits, depth)?)
        }
    };
    Ok(value)
}

/// Checks `value` against the limits a peer applies when decoding it.
///
/// Covers the same string sizes, dictionary counts and nesting that
/// [`decode`] and [`patch`](crate::patch) enforce. A diff between two values
/// that both pass never trips those limits on the receiving side.
pub fn check_limits(ty: &SchemaType, value: &Value, limits: &CodecLimits) -> CodecResult<()> {
    check_at(ty, value, limits, 0)
}

fn check_at(
    ty: &SchemaType,
    value: &Value,
    limits: &CodecLimits,
    depth: usize,
) -> CodecResult<()> {
    match (ty, value) {
        (SchemaType::Boolean, Value::Bool(_))
        | (SchemaType::Int(_), Value::Int(_))
        | (SchemaType::Float(_), Value::Float(_)) => {}
        (SchemaType::Ascii | SchemaType::Utf8, Value::String(text)) => {
            check_limit(LimitKind::StringBytes, limits.max_string_bytes, text.len())?;
        }
        (SchemaType::Struct(def), Value::Struct(fields)) => {
            let depth = enter(depth, limits)?;
            for (field, value) in def.fields().iter().zip(fields) {
                check_at(&field.ty, value, limits, depth)?;
            }
        }
        (SchemaType::Array(def), Value::Array(items)) => {
            let depth = enter(depth, limits)?;
            for item in items {
                check_at(def.element(), item, limits, depth)?;
            }
        }
        (SchemaType::Dictionary(element), Value::Dictionary(entries)) => {
            let depth = enter(depth, limits)?;
            check_limit(
                LimitKind::CollectionLength,
                limits.max_collection_len,
                entries.len(),
            )?;
            for (key, value) in entries {
                check_limit(LimitKind::StringBytes, limits.max_string_bytes, key.len())?;
                check_at(element, value, limits, depth)?;
            }
        }
        (SchemaType::Union(def), Value::Union { tag, value }) => {
            let depth = enter(depth, limits)?;
            let variant = def.get(*tag).ok_or(CodecError::UnknownVariant {
                tag: *tag,
                variants: def.variants().len(),
            })?;
            check_at(&variant.ty, value, limits, depth)?;
        }
        _ => return Err(CodecError::mismatch(ty, value)),
    }
    Ok(())
}

/// Steps one composite level deeper, enforcing the depth limit.
pub(crate) fn enter(depth: usize, limits: &CodecLimits) -> CodecResult<usize> {
    let depth = depth + 1;
    check_limit(LimitKind::Depth, limits.max_depth, depth)?;
    Ok(depth)
}

pub(crate) fn write_count(count: usize, out: &mut ByteWriter) -> CodecResult<()> {
    let count =
        u32::try_from(count).map_err(|_| StreamError::LengthOverflow { length: count })?;
    out.write_varu32(count);
    Ok(())
}

pub(crate) fn read_count(reader: &mut ByteReader<'_>, limits: &CodecLimits) -> CodecResult<usize> {
    let count = reader.read_varu32()? as usize;
    check_limit(LimitKind::CollectionLength, limits.max_collection_len, count)?;
    Ok(count)
}

pub(crate) fn read_key(reader: &mut ByteReader<'_>, limits: &CodecLimits) -> CodecResult<String> {
    read_text(reader, limits, false)
}

fn read_text(
    reader: &mut ByteReader<'_>,
    limits: &CodecLimits,
    ascii: bool,
) -> CodecResult<String> {
    let len = reader.read_u32()? as usize;
    check_limit(LimitKind::StringBytes, limits.max_string_bytes, len)?;
    let offset = reader.position();
    let text = reader.read_utf8(len)?;
    if ascii && !text.is_ascii() {
        return Err(StreamError::NonAscii { offset }.into());
    }
    Ok(text.to_owned())
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn write_int(int: IntType, value: i64, out: &mut ByteWriter) {
    let value = int.truncate(value);
    match (int.width, int.signed) {
        (IntWidth::W8, true) => out.write_i8(value as i8),
        (IntWidth::W8, false) => out.write_u8(value as u8),
        (IntWidth::W16, true) => out.write_i16(value as i16),
        (IntWidth::W16, false) => out.write_u16(value as u16),
        (IntWidth::W32, true) => out.write_i32(value as i32),
        (IntWidth::W32, false) => out.write_u32(value as u32),
    }
}

fn read_int(int: IntType, reader: &mut ByteReader<'_>) -> CodecResult<i64> {
    let value = match (int.width, int.signed) {
        (IntWidth::W8, true) => i64::from(reader.read_i8()?),
        (IntWidth::W8, false) => i64::from(reader.read_u8()?),
        (IntWidth::W16, true) => i64::from(reader.read_i16()?),
        (IntWidth::W16, false) => i64::from(reader.read_u16()?),
        (IntWidth::W32, true) => i64::from(reader.read_i32()?),
        (IntWidth::W32, false) => i64::from(reader.read_u32()?),
    };
    Ok(value)
}

#[allow(clippy::cast_possible_truncation)]
fn write_float(width: FloatWidth, value: f64, out: &mut ByteWriter) {
    match width {
        FloatWidth::F32 => out.write_f32(value as f32),
        FloatWidth::F64 => out.write_f64(value),
    }
}

fn read_float(width: FloatWidth, reader: &mut ByteReader<'_>) -> CodecResult<f64> {
    let value = match width {
        FloatWidth::F32 => f64::from(reader.read_f32()?),
        FloatWidth::F64 => reader.read_f64()?,
    };
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytestream::BufferPool;
    use schema::{StructType, UnionType};

    fn encode_to_vec(ty: &SchemaType, value: &Value) -> Vec<u8> {
        let pool = BufferPool::new();
        let mut out = ByteWriter::new(&pool);
        encode(ty, value, &mut out).unwrap();
        out.finish()
    }

    fn player() -> SchemaType {
        SchemaType::structure(
            StructType::new()
                .field("name", SchemaType::ascii())
                .field("hp", SchemaType::uint8())
                .field("pos", SchemaType::array(SchemaType::float32(), 2).unwrap()),
        )
        .unwrap()
    }

    #[test]
    fn int_is_written_at_declared_width() {
        assert_eq!(encode_to_vec(&SchemaType::uint8(), &Value::Int(300)), vec![44]);
        assert_eq!(
            encode_to_vec(&SchemaType::int16(), &Value::Int(-2)),
            vec![0xFE, 0xFF]
        );
        assert_eq!(
            encode_to_vec(&SchemaType::uint32(), &Value::Int(1)),
            vec![1, 0, 0, 0]
        );
    }

    #[test]
    fn signed_decode_sign_extends() {
        let bytes = encode_to_vec(&SchemaType::int8(), &Value::Int(-5));
        let value = decode_bytes(&SchemaType::int8(), &bytes, &CodecLimits::default()).unwrap();
        assert_eq!(value, Value::Int(-5));
    }

    #[test]
    fn struct_roundtrip() {
        let ty = player();
        let value = Value::Struct(vec![
            Value::from("bob"),
            Value::Int(90),
            Value::Array(vec![Value::Float(1.5), Value::Float(-2.0)]),
        ]);
        let bytes = encode_to_vec(&ty, &value);
        assert_eq!(
            decode_bytes(&ty, &bytes, &CodecLimits::default()).unwrap(),
            value
        );
    }

    #[test]
    fn dictionary_is_written_in_key_order() {
        let ty = SchemaType::dictionary(SchemaType::uint8()).unwrap();
        let value = Value::dictionary([("b", Value::Int(2)), ("a", Value::Int(1))]);
        let bytes = encode_to_vec(&ty, &value);
        assert_eq!(
            bytes,
            vec![2, 1, 0, 0, 0, b'a', 1, 1, 0, 0, 0, b'b', 2]
        );
    }

    #[test]
    fn union_roundtrip() {
        let ty = SchemaType::union(
            UnionType::new()
                .variant("none", SchemaType::boolean())
                .variant("some", SchemaType::utf8()),
        )
        .unwrap();
        let value = Value::union(1, Value::from("héllo"));
        let bytes = encode_to_vec(&ty, &value);
        assert_eq!(bytes[0], 1);
        assert_eq!(
            decode_bytes(&ty, &bytes, &CodecLimits::default()).unwrap(),
            value
        );
    }

    #[test]
    fn encode_rejects_shape_mismatch() {
        let pool = BufferPool::new();
        let mut out = ByteWriter::new(&pool);
        let err = encode(&SchemaType::boolean(), &Value::Int(1), &mut out).unwrap_err();
        assert_eq!(
            err,
            CodecError::TypeMismatch {
                expected: "boolean",
                found: "int",
            }
        );
        let err = encode(&player(), &Value::Struct(vec![]), &mut out).unwrap_err();
        assert!(matches!(err, CodecError::FieldCountMismatch { .. }));
    }

    #[test]
    fn encode_rejects_non_ascii() {
        let pool = BufferPool::new();
        let mut out = ByteWriter::new(&pool);
        let err = encode(&SchemaType::ascii(), &Value::from("é"), &mut out).unwrap_err();
        assert_eq!(
            err,
            CodecError::InvalidValue {
                reason: ValueReason::NonAscii,
            }
        );
    }

    #[test]
    fn decode_rejects_non_ascii() {
        let bytes = [1, 0, 0, 0, 0xC3];
        let err = decode_bytes(&SchemaType::ascii(), &bytes, &CodecLimits::default());
        assert!(err.is_err());
        let bytes = [2, 0, 0, 0, 0xC3, 0xA9];
        let err = decode_bytes(&SchemaType::ascii(), &bytes, &CodecLimits::default()).unwrap_err();
        assert_eq!(err, CodecError::Stream(StreamError::NonAscii { offset: 4 }));
    }

    #[test]
    fn decode_rejects_unknown_tag() {
        let ty = SchemaType::union(UnionType::new().variant("a", SchemaType::boolean())).unwrap();
        let err = decode_bytes(&ty, &[3, 0], &CodecLimits::default()).unwrap_err();
        assert_eq!(err, CodecError::UnknownVariant { tag: 3, variants: 1 });
    }

    #[test]
    fn decode_enforces_limits() {
        let ty = SchemaType::dictionary(SchemaType::boolean()).unwrap();
        let limits = CodecLimits {
            max_collection_len: 1,
            ..CodecLimits::default()
        };
        let err = decode_bytes(&ty, &[2], &limits).unwrap_err();
        assert!(matches!(
            err,
            CodecError::LimitsExceeded {
                kind: LimitKind::CollectionLength,
                ..
            }
        ));

        let limits = CodecLimits {
            max_string_bytes: 2,
            ..CodecLimits::default()
        };
        let err = decode_bytes(&SchemaType::utf8(), &[3, 0, 0, 0, b'a', b'b', b'c'], &limits)
            .unwrap_err();
        assert!(matches!(
            err,
            CodecError::LimitsExceeded {
                kind: LimitKind::StringBytes,
                ..
            }
        ));
    }

    #[test]
    fn decode_enforces_depth() {
        let mut ty = SchemaType::boolean();
        for _ in 0..3 {
            ty = SchemaType::array(ty, 1).unwrap();
        }
        let limits = CodecLimits {
            max_depth: 2,
            ..CodecLimits::default()
        };
        let err = decode_bytes(&ty, &[1], &limits).unwrap_err();
        assert!(matches!(
            err,
            CodecError::LimitsExceeded {
                kind: LimitKind::Depth,
                ..
            }
        ));
        assert!(decode_bytes(&ty, &[1], &CodecLimits::default()).is_ok());
    }

    #[test]
    fn check_limits_matches_decoder() {
        let ty = SchemaType::dictionary(SchemaType::utf8()).unwrap();
        let limits = CodecLimits::for_testing();

        let small = Value::dictionary([("a", Value::from("x"))]);
        check_limits(&ty, &small, &limits).unwrap();
        let bytes = encode_to_vec(&ty, &small);
        assert_eq!(decode_bytes(&ty, &bytes, &limits).unwrap(), small);

        let many = Value::Dictionary(
            (0..65)
                .map(|i| (format!("k{i}"), Value::from("")))
                .collect(),
        );
        let err = check_limits(&ty, &many, &limits).unwrap_err();
        assert!(matches!(
            err,
            CodecError::LimitsExceeded {
                kind: LimitKind::CollectionLength,
                limit: 64,
                actual: 65,
            }
        ));
        let bytes = encode_to_vec(&ty, &many);
        assert_eq!(decode_bytes(&ty, &bytes, &limits).unwrap_err(), err);

        let long_key = Value::dictionary([("k".repeat(257).as_str(), Value::from(""))]);
        assert!(matches!(
            check_limits(&ty, &long_key, &limits),
            Err(CodecError::LimitsExceeded {
                kind: LimitKind::StringBytes,
                ..
            })
        ));
        let long_value = Value::dictionary([("k", Value::from("v".repeat(257)))]);
        assert!(matches!(
            check_limits(&ty, &long_value, &limits),
            Err(CodecError::LimitsExceeded {
                kind: LimitKind::StringBytes,
                ..
            })
        ));
    }

    #[test]
    fn check_limits_counts_depth_like_decode() {
        let mut ty = SchemaType::boolean();
        let mut value = Value::Bool(true);
        for _ in 0..3 {
            ty = SchemaType::array(ty, 1).unwrap();
            value = Value::Array(vec![value]);
        }
        let shallow = CodecLimits {
            max_depth: 2,
            ..CodecLimits::default()
        };
        assert!(matches!(
            check_limits(&ty, &value, &shallow),
            Err(CodecError::LimitsExceeded {
                kind: LimitKind::Depth,
                ..
            })
        ));
        let exact = CodecLimits {
            max_depth: 3,
            ..CodecLimits::default()
        };
        check_limits(&ty, &value, &exact).unwrap();
        assert!(decode_bytes(&ty, &encode_to_vec(&ty, &value), &exact).is_ok());
    }

    #[test]
    fn decode_rejects_duplicate_keys() {
        let ty = SchemaType::dictionary(SchemaType::boolean()).unwrap();
        let bytes = [2, 1, 0, 0, 0, b'k', 1, 1, 0, 0, 0, b'k', 0];
        let err = decode_bytes(&ty, &bytes, &CodecLimits::default()).unwrap_err();
        assert_eq!(err, CodecError::DuplicateKey { key: "k".into() });
    }

    #[test]
    fn decode_rejects_trailing_bytes() {
        let err = decode_bytes(&SchemaType::boolean(), &[1, 0], &CodecLimits::default())
            .unwrap_err();
        assert_eq!(err, CodecError::TrailingBytes { remaining: 1 });
    }
}
