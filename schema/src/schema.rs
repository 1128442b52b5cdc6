//! Schema type trees and validation.

use std::collections::{BTreeMap, HashSet};

use crate::error::{SchemaError, SchemaResult};
use crate::{FieldDef, FloatWidth, IntType, IntWidth, Value};

/// A value descriptor.
///
/// The set of variants is closed. A `SchemaType` is immutable once built and
/// its [`identity`](Self::identity) is fully determined by its shape.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SchemaType {
    /// `true`/`false`, one byte on the wire.
    Boolean,
    /// Fixed-width integer.
    Int(IntType),
    /// IEEE-754 float.
    Float(FloatWidth),
    /// 7-bit ASCII string.
    Ascii,
    /// UTF-8 string.
    Utf8,
    /// Ordered named fields.
    Struct(StructType),
    /// Fixed-length homogeneous array.
    Array(ArrayType),
    /// String-keyed map of homogeneous values.
    Dictionary(Box<SchemaType>),
    /// Tagged union of named variants; the tag is the variant index.
    Union(UnionType),
}

impl SchemaType {
    /// Boolean schema.
    #[must_use]
    pub const fn boolean() -> Self {
        Self::Boolean
    }

    /// Integer schema with an explicit width and signedness.
    #[must_use]
    pub const fn int(width: IntWidth, signed: bool) -> Self {
        Self::Int(IntType { width, signed })
    }

    /// Signed 8-bit integer schema.
    #[must_use]
    pub const fn int8() -> Self {
        Self::int(IntWidth::W8, true)
    }

    /// Signed 16-bit integer schema.
    #[must_use]
    pub const fn int16() -> Self {
        Self::int(IntWidth::W16, true)
    }

    /// Signed 32-bit integer schema.
    #[must_use]
    pub const fn int32() -> Self {
        Self::int(IntWidth::W32, true)
    }

    /// Unsigned 8-bit integer schema.
    #[must_use]
    pub const fn uint8() -> Self {
        Self::int(IntWidth::W8, false)
    }

    /// Unsigned 16-bit integer schema.
    #[must_use]
    pub const fn uint16() -> Self {
        Self::int(IntWidth::W16, false)
    }

    /// Unsigned 32-bit integer schema.
    #[must_use]
    pub const fn uint32() -> Self {
        Self::int(IntWidth::W32, false)
    }

    /// 32-bit float schema.
    #[must_use]
    pub const fn float32() -> Self {
        Self::Float(FloatWidth::F32)
    }

    /// 64-bit float schema.
    #[must_use]
    pub const fn float64() -> Self {
        Self::Float(FloatWidth::F64)
    }

    /// ASCII string schema.
    #[must_use]
    pub const fn ascii() -> Self {
        Self::Ascii
    }

    /// UTF-8 string schema.
    #[must_use]
    pub const fn utf8() -> Self {
        Self::Utf8
    }

    /// Struct schema after validating field names.
    pub fn structure(def: StructType) -> SchemaResult<Self> {
        let ty = Self::Struct(def);
        ty.validate()?;
        Ok(ty)
    }

    /// Fixed-length array schema.
    pub fn array(element: Self, len: usize) -> SchemaResult<Self> {
        let ty = Self::Array(ArrayType {
            element: Box::new(element),
            len,
        });
        ty.validate()?;
        Ok(ty)
    }

    /// Dictionary schema.
    pub fn dictionary(element: Self) -> SchemaResult<Self> {
        let ty = Self::Dictionary(Box::new(element));
        ty.validate()?;
        Ok(ty)
    }

    /// Union schema after validating variant names.
    pub fn union(def: UnionType) -> SchemaResult<Self> {
        let ty = Self::Union(def);
        ty.validate()?;
        Ok(ty)
    }

    /// Returns a short name for the variant, used in error messages.
    #[must_use]
    pub const fn kind_name(&self) -> &'static str {
        match self {
            Self::Boolean => "boolean",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Ascii => "ascii",
            Self::Utf8 => "utf8",
            Self::Struct(_) => "struct",
            Self::Array(_) => "array",
            Self::Dictionary(_) => "dictionary",
            Self::Union(_) => "union",
        }
    }

    /// Returns the default value of this type.
    #[must_use]
    pub fn identity(&self) -> Value {
        match self {
            Self::Boolean => Value::Bool(false),
            Self::Int(_) => Value::Int(0),
            Self::Float(_) => Value::Float(0.0),
            Self::Ascii | Self::Utf8 => Value::String(String::new()),
            Self::Struct(def) => {
                Value::Struct(def.fields.iter().map(|f| f.ty.identity()).collect())
            }
            Self::Array(def) => Value::Array(vec![def.element.identity(); def.len]),
            Self::Dictionary(_) => Value::Dictionary(BTreeMap::new()),
            // An unvalidated empty union has no payload type; use a unit struct.
            Self::Union(def) => Value::Union {
                tag: 0,
                value: Box::new(
                    def.variants
                        .first()
                        .map_or(Value::Struct(Vec::new()), |v| v.ty.identity()),
                ),
            },
        }
    }

    /// Validates every nested struct and union.
    pub fn validate(&self) -> SchemaResult<()> {
        match self {
            Self::Boolean | Self::Int(_) | Self::Float(_) | Self::Ascii | Self::Utf8 => Ok(()),
            Self::Struct(def) => {
                check_names(&def.fields, |name| SchemaError::DuplicateFieldName { name })?;
                def.fields.iter().try_for_each(|f| f.ty.validate())
            }
            Self::Array(def) => def.element.validate(),
            Self::Dictionary(element) => element.validate(),
            Self::Union(def) => {
                if def.variants.is_empty() {
                    return Err(SchemaError::EmptyUnion);
                }
                check_names(&def.variants, |name| SchemaError::DuplicateVariantName {
                    name,
                })?;
                def.variants.iter().try_for_each(|v| v.ty.validate())
            }
        }
    }
}

/// Struct schema: ordered named fields.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StructType {
    fields: Vec<FieldDef>,
}

impl StructType {
    /// Creates a struct with no fields.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a field to the struct.
    #[must_use]
    pub fn field(mut self, name: impl Into<String>, ty: SchemaType) -> Self {
        self.fields.push(FieldDef::new(name, ty));
        self
    }

    /// Returns the fields in declaration order.
    #[must_use]
    pub fn fields(&self) -> &[FieldDef] {
        &self.fields
    }

    /// Returns the index of a field by name.
    #[must_use]
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }
}

/// Fixed-length array schema.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ArrayType {
    element: Box<SchemaType>,
    len: usize,
}

impl ArrayType {
    /// Returns the element schema.
    #[must_use]
    pub fn element(&self) -> &SchemaType {
        &self.element
    }

    /// Returns the fixed number of elements.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` for a zero-length array.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// Tagged union schema.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct UnionType {
    variants: Vec<FieldDef>,
}

impl UnionType {
    /// Creates a union with no variants (must be given at least one).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a variant to the union.
    #[must_use]
    pub fn variant(mut self, name: impl Into<String>, ty: SchemaType) -> Self {
        self.variants.push(FieldDef::new(name, ty));
        self
    }

    /// Returns the variants in tag order.
    #[must_use]
    pub fn variants(&self) -> &[FieldDef] {
        &self.variants
    }

    /// Returns the tag of a variant by name.
    #[must_use]
    pub fn tag_of(&self, name: &str) -> Option<u32> {
        self.variants
            .iter()
            .position(|v| v.name == name)
            .and_then(|idx| u32::try_from(idx).ok())
    }

    /// Returns the variant for a tag.
    #[must_use]
    pub fn get(&self, tag: u32) -> Option<&FieldDef> {
        self.variants.get(tag as usize)
    }
}

fn check_names(
    members: &[FieldDef],
    duplicate: impl Fn(String) -> SchemaError,
) -> SchemaResult<()> {
    let mut seen = HashSet::new();
    for member in members {
        if member.name.is_empty() {
            return Err(SchemaError::EmptyName);
        }
        if !seen.insert(member.name.as_str()) {
            return Err(duplicate(member.name.clone()));
        }
    }
    Ok(())
}
