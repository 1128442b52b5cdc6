//! Schema validation errors.

use std::fmt;

/// Result type for schema operations.
pub type SchemaResult<T> = Result<T, SchemaError>;

/// Errors that can occur when building or validating a schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    /// Integer width other than 8, 16 or 32 bits.
    InvalidIntWidth { bits: u8 },

    /// Float width other than 32 or 64 bits.
    InvalidFloatWidth { bits: u8 },

    /// Two struct fields share a name.
    DuplicateFieldName { name: String },

    /// Two union variants share a name.
    DuplicateVariantName { name: String },

    /// A struct field or union variant has an empty name.
    EmptyName,

    /// A union must have at least one variant.
    EmptyUnion,
}

impl fmt::Display for SchemaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidIntWidth { bits } => {
                write!(f, "invalid integer width {bits}, expected 8, 16 or 32")
            }
            Self::InvalidFloatWidth { bits } => {
                write!(f, "invalid float width {bits}, expected 32 or 64")
            }
            Self::DuplicateFieldName { name } => write!(f, "duplicate field name `{name}`"),
            Self::DuplicateVariantName { name } => {
                write!(f, "duplicate union variant `{name}`")
            }
            Self::EmptyName => write!(f, "field and variant names must not be empty"),
            Self::EmptyUnion => write!(f, "union must have at least one variant"),
        }
    }
}

impl std::error::Error for SchemaError {}
