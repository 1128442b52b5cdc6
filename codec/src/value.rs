//! Allocation, copying and comparison of schema values.

use std::collections::BTreeMap;

use schema::{SchemaType, Value};

use crate::error::{CodecError, CodecResult, ValueReason};

/// Returns a fresh identity value for `ty`.
///
/// Values own their storage; dropping one is the matching free.
#[must_use]
pub fn alloc(ty: &SchemaType) -> Value {
    ty.identity()
}

/// Deep-copies `value`, normalised to the schema.
///
/// Integers are truncated to their width and floats rounded to their
/// precision, so the copy is exactly what a peer would decode.
pub fn clone_value(ty: &SchemaType, value: &Value) -> CodecResult<Value> {
    let copy = match (ty, value) {
        (SchemaType::Boolean, Value::Bool(v)) => Value::Bool(*v),
        (SchemaType::Int(int), Value::Int(v)) => Value::Int(int.truncate(*v)),
        (SchemaType::Float(width), Value::Float(v)) => Value::Float(width.truncate(*v)),
        (SchemaType::Ascii, Value::String(v)) => {
            if !v.is_ascii() {
                return Err(CodecError::InvalidValue {
                    reason: ValueReason::NonAscii,
                });
            }
            Value::String(v.clone())
        }
        (SchemaType::Utf8, Value::String(v)) => Value::String(v.clone()),
        (SchemaType::Struct(def), Value::Struct(fields)) => {
            if fields.len() != def.fields().len() {
                return Err(CodecError::FieldCountMismatch {
                    expected: def.fields().len(),
                    found: fields.len(),
                });
            }
            let fields = def
                .fields()
                .iter()
                .zip(fields)
                .map(|(field, value)| clone_value(&field.ty, value))
                .collect::<CodecResult<Vec<_>>>()?;
            Value::Struct(fields)
        }
        (SchemaType::Array(def), Value::Array(items)) => {
            if items.len() != def.len() {
                return Err(CodecError::ArrayLengthMismatch {
                    expected: def.len(),
                    found: items.len(),
                });
            }
            let items = items
                .iter()
                .map(|item| clone_value(def.element(), item))
                .collect::<CodecResult<Vec<_>>>()?;
            Value::Array(items)
        }
        (SchemaType::Dictionary(element), Value::Dictionary(entries)) => {
            let entries = entries
                .iter()
                .map(|(key, value)| Ok((key.clone(), clone_value(element, value)?)))
                .collect::<CodecResult<BTreeMap<_, _>>>()?;
            Value::Dictionary(entries)
        }
        (SchemaType::Union(def), Value::Union { tag, value }) => {
            let variant = def.get(*tag).ok_or(CodecError::UnknownVariant {
                tag: *tag,
                variants: def.variants().len(),
            })?;
            Value::union(*tag, clone_value(&variant.ty, value)?)
        }
        _ => return Err(CodecError::mismatch(ty, value)),
    };
    Ok(copy)
}

/// Deep equality as seen on the wire.
///
/// Integers compare after truncation and floats compare by bit pattern after
/// rounding to their width. Values whose shape does not match `ty` are never
/// equal.
#[must_use]
pub fn equal(ty: &SchemaType, a: &Value, b: &Value) -> bool {
    match (ty, a, b) {
        (SchemaType::Boolean, Value::Bool(a), Value::Bool(b)) => a == b,
        (SchemaType::Int(int), Value::Int(a), Value::Int(b)) => {
            int.truncate(*a) == int.truncate(*b)
        }
        (SchemaType::Float(width), Value::Float(a), Value::Float(b)) => {
            width.truncate(*a).to_bits() == width.truncate(*b).to_bits()
        }
        (SchemaType::Ascii | SchemaType::Utf8, Value::String(a), Value::String(b)) => a == b,
        (SchemaType::Struct(def), Value::Struct(a), Value::Struct(b)) => {
            a.len() == def.fields().len()
                && b.len() == def.fields().len()
                && def
                    .fields()
                    .iter()
                    .zip(a.iter().zip(b))
                    .all(|(field, (a, b))| equal(&field.ty, a, b))
        }
        (SchemaType::Array(def), Value::Array(a), Value::Array(b)) => {
            a.len() == def.len()
                && b.len() == def.len()
                && a.iter().zip(b).all(|(a, b)| equal(def.element(), a, b))
        }
        (SchemaType::Dictionary(element), Value::Dictionary(a), Value::Dictionary(b)) => {
            a.len() == b.len()
                && a
                    .iter()
                    .zip(b)
                    .all(|((ka, va), (kb, vb))| ka == kb && equal(element, va, vb))
        }
        (
            SchemaType::Union(def),
            Value::Union { tag: ta, value: va },
            Value::Union { tag: tb, value: vb },
        ) => ta == tb && def.get(*ta).is_some_and(|variant| equal(&variant.ty, va, vb)),
        _ => false,
    }
}
