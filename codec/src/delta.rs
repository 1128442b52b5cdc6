//! Delta encoding between two values of the same schema.
//!
//! A diff is only written for values that differ; nested members are visited
//! only when they changed. Layout per type:
//!
//! - primitives: the new value, fully encoded
//! - struct / fixed array: a change mask of `ceil(n / 8)` bytes (bit `i` of
//!   byte `i / 8` marks member `i`), then the diff of every changed member
//! - dictionary: removed keys, then added `(key, value)` pairs fully encoded,
//!   then changed `(key, diff)` pairs, each group prefixed by a `varu32` count
//! - union: the new `varu32` tag, then the full value if the tag changed or a
//!   diff of the payload otherwise

use std::collections::BTreeMap;

use bytestream::{ByteReader, ByteWriter};
use schema::{SchemaType, Value};

use crate::error::{CodecError, CodecResult};
use crate::full::{decode_at, encode, enter, read_count, read_key, write_count};
use crate::limits::CodecLimits;
use crate::value::{clone_value, equal};

/// Writes the bytes that turn `base` into `target`.
///
/// Returns `false` and writes nothing when the two values are equal.
pub fn diff(
    ty: &SchemaType,
    base: &Value,
    target: &Value,
    out: &mut ByteWriter,
) -> CodecResult<bool> {
    if equal(ty, base, target) {
        return Ok(false);
    }
    diff_changed(ty, base, target, out)?;
    Ok(true)
}

/// Applies a diff read from `reader` to `base`, returning the new value.
///
/// An empty reader means "no change" and yields a normalised copy of `base`.
pub fn patch(
    ty: &SchemaType,
    base: &Value,
    reader: &mut ByteReader<'_>,
    limits: &CodecLimits,
) -> CodecResult<Value> {
    if reader.is_empty() {
        return clone_value(ty, base);
    }
    patch_at(ty, base, reader, limits, 0)
}

/// Applies a diff held in `bytes`, rejecting trailing input.
pub fn patch_bytes(
    ty: &SchemaType,
    base: &Value,
    bytes: &[u8],
    limits: &CodecLimits,
) -> CodecResult<Value> {
    let mut reader = ByteReader::new(bytes);
    let value = patch(ty, base, &mut reader, limits)?;
    if !reader.is_empty() {
        return Err(CodecError::TrailingBytes {
            remaining: reader.remaining(),
        });
    }
    Ok(value)
}

fn diff_changed(
    ty: &SchemaType,
    base: &Value,
    target: &Value,
    out: &mut ByteWriter,
) -> CodecResult<()> {
    match (ty, base, target) {
        (SchemaType::Struct(def), Value::Struct(base), Value::Struct(target)) => {
            let n = def.fields().len();
            check_count(n, base.len())?;
            check_count(n, target.len())?;
            let changed: Vec<bool> = def
                .fields()
                .iter()
                .zip(base.iter().zip(target))
                .map(|(field, (b, t))| !equal(&field.ty, b, t))
                .collect();
            write_mask(&changed, out);
            for (i, field) in def.fields().iter().enumerate() {
                if changed[i] {
                    diff_changed(&field.ty, &base[i], &target[i], out)?;
                }
            }
        }
        (SchemaType::Array(def), Value::Array(base), Value::Array(target)) => {
            check_array_len(def.len(), base.len())?;
            check_array_len(def.len(), target.len())?;
            let element = def.element();
            let changed: Vec<bool> = base
                .iter()
                .zip(target)
                .map(|(b, t)| !equal(element, b, t))
                .collect();
            write_mask(&changed, out);
            for ((b, t), changed) in base.iter().zip(target).zip(&changed) {
                if *changed {
                    diff_changed(element, b, t, out)?;
                }
            }
        }
        (SchemaType::Dictionary(element), Value::Dictionary(base), Value::Dictionary(target)) => {
            diff_dictionary(element, base, target, out)?;
        }
        (
            SchemaType::Union(def),
            Value::Union {
                tag: base_tag,
                value: base_value,
            },
            Value::Union { tag, value },
        ) => {
            let variant = def.get(*tag).ok_or(CodecError::UnknownVariant {
                tag: *tag,
                variants: def.variants().len(),
            })?;
            out.write_varu32(*tag);
            if tag == base_tag {
                diff_changed(&variant.ty, base_value, value, out)?;
            } else {
                encode(&variant.ty, value, out)?;
            }
        }
        (
            SchemaType::Struct(_)
            | SchemaType::Array(_)
            | SchemaType::Dictionary(_)
            | SchemaType::Union(_),
            _,
            _,
        ) => {
            let culprit = if base.kind_name() == ty.kind_name() {
                target
            } else {
                base
            };
            return Err(CodecError::mismatch(ty, culprit));
        }
        _ => encode(ty, target, out)?,
    }
    Ok(())
}

fn diff_dictionary(
    element: &SchemaType,
    base: &BTreeMap<String, Value>,
    target: &BTreeMap<String, Value>,
    out: &mut ByteWriter,
) -> CodecResult<()> {
    let removed: Vec<&String> = base.keys().filter(|k| !target.contains_key(*k)).collect();
    let added: Vec<(&String, &Value)> = target
        .iter()
        .filter(|(k, _)| !base.contains_key(*k))
        .collect();
    let changed: Vec<(&String, &Value, &Value)> = target
        .iter()
        .filter_map(|(k, t)| base.get(k).map(|b| (k, b, t)))
        .filter(|(_, b, t)| !equal(element, b, t))
        .collect();

    write_count(removed.len(), out)?;
    for key in removed {
        out.write_string(key)?;
    }
    write_count(added.len(), out)?;
    for (key, value) in added {
        out.write_string(key)?;
        encode(element, value, out)?;
    }
    write_count(changed.len(), out)?;
    for (key, b, t) in changed {
        out.write_string(key)?;
        diff_changed(element, b, t, out)?;
    }
    Ok(())
}

fn patch_at(
    ty: &SchemaType,
    base: &Value,
    reader: &mut ByteReader<'_>,
    limits: &CodecLimits,
    depth: usize,
) -> CodecResult<Value> {
    let value = match (ty, base) {
        (SchemaType::Struct(def), Value::Struct(fields)) => {
            let n = def.fields().len();
            check_count(n, fields.len())?;
            let depth = enter(depth, limits)?;
            let mask = read_mask(reader, n)?;
            let mut out = Vec::with_capacity(n);
            for ((field, value), changed) in def.fields().iter().zip(fields).zip(mask) {
                out.push(if changed {
                    patch_at(&field.ty, value, reader, limits, depth)?
                } else {
                    clone_value(&field.ty, value)?
                });
            }
            Value::Struct(out)
        }
        (SchemaType::Array(def), Value::Array(items)) => {
            check_array_len(def.len(), items.len())?;
            let depth = enter(depth, limits)?;
            let mask = read_mask(reader, def.len())?;
            let mut out = Vec::with_capacity(items.len());
            for (item, changed) in items.iter().zip(mask) {
                out.push(if changed {
                    patch_at(def.element(), item, reader, limits, depth)?
                } else {
                    clone_value(def.element(), item)?
                });
            }
            Value::Array(out)
        }
        (SchemaType::Dictionary(element), Value::Dictionary(entries)) => {
            let depth = enter(depth, limits)?;
            Value::Dictionary(patch_dictionary(element, entries, reader, limits, depth)?)
        }
        (SchemaType::Union(def), Value::Union { tag, value }) => {
            let depth = enter(depth, limits)?;
            let new_tag = reader.read_varu32()?;
            let variant = def.get(new_tag).ok_or(CodecError::UnknownVariant {
                tag: new_tag,
                variants: def.variants().len(),
            })?;
            let payload = if new_tag == *tag {
                patch_at(&variant.ty, value, reader, limits, depth)?
            } else {
                decode_at(&variant.ty, reader, limits, depth)?
            };
            Value::union(new_tag, payload)
        }
        (
            SchemaType::Struct(_)
            | SchemaType::Array(_)
            | SchemaType::Dictionary(_)
            | SchemaType::Union(_),
            _,
        ) => return Err(CodecError::mismatch(ty, base)),
        _ => decode_at(ty, reader, limits, depth)?,
    };
    Ok(value)
}

fn patch_dictionary(
    element: &SchemaType,
    base: &BTreeMap<String, Value>,
    reader: &mut ByteReader<'_>,
    limits: &CodecLimits,
    depth: usize,
) -> CodecResult<BTreeMap<String, Value>> {
    let mut entries = base
        .iter()
        .map(|(key, value)| Ok((key.clone(), clone_value(element, value)?)))
        .collect::<CodecResult<BTreeMap<_, _>>>()?;

    let removed = read_count(reader, limits)?;
    for _ in 0..removed {
        let key = read_key(reader, limits)?;
        if entries.remove(&key).is_none() {
            return Err(CodecError::UnknownKey { key });
        }
    }

    let added = read_count(reader, limits)?;
    for _ in 0..added {
        let key = read_key(reader, limits)?;
        let value = decode_at(element, reader, limits, depth)?;
        if entries.contains_key(&key) {
            return Err(CodecError::DuplicateKey { key });
        }
        entries.insert(key, value);
    }

    let changed = read_count(reader, limits)?;
    for _ in 0..changed {
        let key = read_key(reader, limits)?;
        let Some(slot) = entries.get_mut(&key) else {
            return Err(CodecError::UnknownKey { key });
        };
        *slot = patch_at(element, slot, reader, limits, depth)?;
    }
    Ok(entries)
}

fn write_mask(changed: &[bool], out: &mut ByteWriter) {
    for chunk in changed.chunks(8) {
        let byte = chunk
            .iter()
            .enumerate()
            .fold(0u8, |acc, (bit, &set)| acc | (u8::from(set) << bit));
        out.write_u8(byte);
    }
}

/// Reads a change mask for `members` members.
///
/// A mask with no bits set, or with bits set past the last member, cannot be
/// produced by [`diff`] and is rejected.
fn read_mask(reader: &mut ByteReader<'_>, members: usize) -> CodecResult<Vec<bool>> {
    let bytes = reader.read_bytes(members.div_ceil(8))?;
    let mut mask = Vec::with_capacity(members);
    let mut any = false;
    for (i, byte) in bytes.iter().enumerate() {
        for bit in 0..8 {
            let set = byte & (1 << bit) != 0;
            if i * 8 + bit >= members {
                if set {
                    return Err(CodecError::InvalidMask { members });
                }
                continue;
            }
            any |= set;
            mask.push(set);
        }
    }
    if !any {
        return Err(CodecError::InvalidMask { members });
    }
    Ok(mask)
}

fn check_count(expected: usize, found: usize) -> CodecResult<()> {
    if expected != found {
        return Err(CodecError::FieldCountMismatch { expected, found });
    }
    Ok(())
}

fn check_array_len(expected: usize, found: usize) -> CodecResult<()> {
    if expected != found {
        return Err(CodecError::ArrayLengthMismatch { expected, found });
    }
    Ok(())
}
