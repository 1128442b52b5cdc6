//! Primitive widths and named members of composite types.

use crate::error::{SchemaError, SchemaResult};
use crate::SchemaType;

/// Storage width of an integer schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum IntWidth {
    W8,
    W16,
    W32,
}

impl IntWidth {
    /// Parses a width from a bit count.
    pub const fn from_bits(bits: u8) -> SchemaResult<Self> {
        match bits {
            8 => Ok(Self::W8),
            16 => Ok(Self::W16),
            32 => Ok(Self::W32),
            _ => Err(SchemaError::InvalidIntWidth { bits }),
        }
    }

    /// Returns the width in bits.
    #[must_use]
    pub const fn bits(self) -> u8 {
        match self {
            Self::W8 => 8,
            Self::W16 => 16,
            Self::W32 => 32,
        }
    }

    /// Returns the width in bytes.
    #[must_use]
    pub const fn bytes(self) -> usize {
        self.bits() as usize / 8
    }
}

/// Integer schema parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct IntType {
    pub width: IntWidth,
    pub signed: bool,
}

impl IntType {
    /// Masks (and for signed types sign-extends) a value to this width.
    ///
    /// Two values that truncate to the same bits are the same value on the
    /// wire, so every comparison and write goes through this.
    #[must_use]
    pub const fn truncate(self, value: i64) -> i64 {
        match (self.width, self.signed) {
            (IntWidth::W8, false) => value as u8 as i64,
            (IntWidth::W8, true) => value as i8 as i64,
            (IntWidth::W16, false) => value as u16 as i64,
            (IntWidth::W16, true) => value as i16 as i64,
            (IntWidth::W32, false) => value as u32 as i64,
            (IntWidth::W32, true) => value as i32 as i64,
        }
    }
}

/// Storage width of a float schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum FloatWidth {
    F32,
    F64,
}

impl FloatWidth {
    /// Parses a width from a bit count.
    pub const fn from_bits(bits: u8) -> SchemaResult<Self> {
        match bits {
            32 => Ok(Self::F32),
            64 => Ok(Self::F64),
            _ => Err(SchemaError::InvalidFloatWidth { bits }),
        }
    }

    /// Returns the width in bits.
    #[must_use]
    pub const fn bits(self) -> u8 {
        match self {
            Self::F32 => 32,
            Self::F64 => 64,
        }
    }

    /// Rounds a value to the precision stored on the wire.
    #[must_use]
    pub fn truncate(self, value: f64) -> f64 {
        match self {
            #[allow(clippy::cast_possible_truncation)]
            Self::F32 => f64::from(value as f32),
            Self::F64 => value,
        }
    }
}

/// A named member of a struct or union.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FieldDef {
    pub name: String,
    pub ty: SchemaType,
}

impl FieldDef {
    /// Creates a named member.
    #[must_use]
    pub fn new(name: impl Into<String>, ty: SchemaType) -> Self {
        Self {
            name: name.into(),
            ty,
        }
    }
}
