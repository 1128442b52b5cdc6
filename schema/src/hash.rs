//! Deterministic structural hashing.

use std::fmt;

use blake3::Hasher;

use crate::{FloatWidth, IntWidth, SchemaType};

/// Truncated blake3 digest of a schema tree.
///
/// Two peers can only exchange values if they compute the same hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SchemaHash(u64);

impl SchemaHash {
    /// Wraps a raw hash value.
    #[must_use]
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw hash value.
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }

    /// Returns the 16-digit lowercase hex form used in handshakes.
    #[must_use]
    pub fn to_hex(self) -> String {
        format!("{:016x}", self.0)
    }

    /// Parses the hex form produced by [`to_hex`](Self::to_hex).
    #[must_use]
    pub fn from_hex(hex: &str) -> Option<Self> {
        if hex.len() != 16 {
            return None;
        }
        u64::from_str_radix(hex, 16).ok().map(Self)
    }
}

impl fmt::Display for SchemaHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// Computes a deterministic hash for a single schema tree.
#[must_use]
pub fn type_hash(ty: &SchemaType) -> SchemaHash {
    let mut hasher = Hasher::new();
    write_type(&mut hasher, ty);
    finish(&hasher)
}

/// Computes the hash of a state schema plus a named message set.
///
/// Message names are sorted before hashing, so the result does not depend on
/// registration order.
#[must_use]
pub fn schema_set_hash<'a, I>(state: &SchemaType, messages: I) -> SchemaHash
where
    I: IntoIterator<Item = (&'a str, &'a SchemaType)>,
{
    let mut entries: Vec<(&str, &SchemaType)> = messages.into_iter().collect();
    entries.sort_by(|a, b| a.0.cmp(b.0));

    let mut hasher = Hasher::new();
    write_type(&mut hasher, state);
    write_len(&mut hasher, entries.len());
    for (name, ty) in entries {
        write_str(&mut hasher, name);
        write_type(&mut hasher, ty);
    }
    finish(&hasher)
}

fn finish(hasher: &Hasher) -> SchemaHash {
    let hash = hasher.finalize();
    let mut head = [0u8; 8];
    head.copy_from_slice(&hash.as_bytes()[..8]);
    SchemaHash(u64::from_le_bytes(head))
}

fn write_type(hasher: &mut Hasher, ty: &SchemaType) {
    match ty {
        SchemaType::Boolean => {
            write_u8(hasher, 0);
        }
        SchemaType::Int(int) => {
            write_u8(hasher, 1);
            write_u8(hasher, int_width_code(int.width));
            write_u8(hasher, u8::from(int.signed));
        }
        SchemaType::Float(width) => {
            write_u8(hasher, 2);
            write_u8(hasher, float_width_code(*width));
        }
        SchemaType::Ascii => {
            write_u8(hasher, 3);
        }
        SchemaType::Utf8 => {
            write_u8(hasher, 4);
        }
        SchemaType::Struct(def) => {
            write_u8(hasher, 5);
            write_len(hasher, def.fields().len());
            for field in def.fields() {
                write_str(hasher, &field.name);
                write_type(hasher, &field.ty);
            }
        }
        SchemaType::Array(def) => {
            write_u8(hasher, 6);
            write_len(hasher, def.len());
            write_type(hasher, def.element());
        }
        SchemaType::Dictionary(element) => {
            write_u8(hasher, 7);
            write_type(hasher, element);
        }
        SchemaType::Union(def) => {
            write_u8(hasher, 8);
            write_len(hasher, def.variants().len());
            for variant in def.variants() {
                write_str(hasher, &variant.name);
                write_type(hasher, &variant.ty);
            }
        }
    }
}

const fn int_width_code(width: IntWidth) -> u8 {
    width.bits()
}

const fn float_width_code(width: FloatWidth) -> u8 {
    width.bits()
}

fn write_u8(hasher: &mut Hasher, value: u8) {
    hasher.update(&[value]);
}

fn write_len(hasher: &mut Hasher, len: usize) {
    hasher.update(&(len as u64).to_le_bytes());
}

fn write_str(hasher: &mut Hasher, value: &str) {
    write_len(hasher, value.len());
    hasher.update(value.as_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{StructType, UnionType};

    fn player() -> SchemaType {
        SchemaType::structure(
            StructType::new()
                .field("x", SchemaType::float32())
                .field("hp", SchemaType::uint8()),
        )
        .unwrap()
    }

    #[test]
    fn type_hash_is_stable() {
        assert_eq!(type_hash(&player()), type_hash(&player()));
    }

    #[test]
    fn type_hash_changes_with_field_order() {
        let swapped = SchemaType::structure(
            StructType::new()
                .field("hp", SchemaType::uint8())
                .field("x", SchemaType::float32()),
        )
        .unwrap();
        assert_ne!(type_hash(&player()), type_hash(&swapped));
    }

    #[test]
    fn type_hash_distinguishes_signedness_and_width() {
        assert_ne!(type_hash(&SchemaType::int8()), type_hash(&SchemaType::uint8()));
        assert_ne!(type_hash(&SchemaType::uint8()), type_hash(&SchemaType::uint16()));
        assert_ne!(
            type_hash(&SchemaType::float32()),
            type_hash(&SchemaType::float64())
        );
    }

    #[test]
    fn type_hash_distinguishes_field_names() {
        let renamed = SchemaType::structure(
            StructType::new()
                .field("y", SchemaType::float32())
                .field("hp", SchemaType::uint8()),
        )
        .unwrap();
        assert_ne!(type_hash(&player()), type_hash(&renamed));
    }

    #[test]
    fn set_hash_ignores_registration_order() {
        let chat = SchemaType::utf8();
        let ping = SchemaType::uint32();
        let a = schema_set_hash(&player(), [("chat", &chat), ("ping", &ping)]);
        let b = schema_set_hash(&player(), [("ping", &ping), ("chat", &chat)]);
        assert_eq!(a, b);
    }

    #[test]
    fn set_hash_depends_on_messages_and_state() {
        let chat = SchemaType::utf8();
        let base = schema_set_hash(&player(), [("chat", &chat)]);
        assert_ne!(base, schema_set_hash(&player(), []));
        assert_ne!(base, schema_set_hash(&SchemaType::boolean(), [("chat", &chat)]));

        let union = SchemaType::union(UnionType::new().variant("chat", SchemaType::utf8())).unwrap();
        assert_ne!(base, schema_set_hash(&player(), [("chat", &union)]));
    }

    #[test]
    fn hex_roundtrip() {
        let hash = type_hash(&player());
        let hex = hash.to_hex();
        assert_eq!(hex.len(), 16);
        assert_eq!(hex, hash.to_string());
        assert_eq!(SchemaHash::from_hex(&hex), Some(hash));
        assert_eq!(SchemaHash::from_hex("xyz"), None);
    }
}
