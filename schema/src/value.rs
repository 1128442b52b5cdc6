//! In-memory values described by a schema.

use std::collections::BTreeMap;

/// An instance of a [`SchemaType`](crate::SchemaType).
///
/// Values are plain data with no back-references. Integers of every width
/// share the `Int` variant; the schema decides how they are truncated.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Value {
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    /// Field values in declaration order.
    Struct(Vec<Value>),
    Array(Vec<Value>),
    Dictionary(BTreeMap<String, Value>),
    Union {
        tag: u32,
        value: Box<Value>,
    },
}

impl Value {
    /// Returns a short name for the variant, used in error messages.
    #[must_use]
    pub const fn kind_name(&self) -> &'static str {
        match self {
            Self::Bool(_) => "boolean",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::String(_) => "string",
            Self::Struct(_) => "struct",
            Self::Array(_) => "array",
            Self::Dictionary(_) => "dictionary",
            Self::Union { .. } => "union",
        }
    }

    /// Builds a dictionary value from key/value pairs.
    pub fn dictionary<K: Into<String>>(entries: impl IntoIterator<Item = (K, Self)>) -> Self {
        Self::Dictionary(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Builds a union value.
    #[must_use]
    pub fn union(tag: u32, value: Self) -> Self {
        Self::Union {
            tag,
            value: Box::new(value),
        }
    }

    #[must_use]
    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(*v),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_float(&self) -> Option<f64> {
        match self {
            Self::Float(v) => Some(*v),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(v) => Some(v),
            _ => None,
        }
    }

    /// Returns a struct field by index.
    #[must_use]
    pub fn field(&self, index: usize) -> Option<&Self> {
        match self {
            Self::Struct(fields) => fields.get(index),
            _ => None,
        }
    }

    /// Returns a dictionary entry by key.
    #[must_use]
    pub fn entry(&self, key: &str) -> Option<&Self> {
        match self {
            Self::Dictionary(entries) => entries.get(key),
            _ => None,
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<u32> for Value {
    fn from(value: u32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::String(value.to_owned())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dictionary_builder_sorts_keys() {
        let value = Value::dictionary([("b", Value::Int(2)), ("a", Value::Int(1))]);
        let Value::Dictionary(entries) = &value else {
            panic!("expected dictionary");
        };
        let keys: Vec<&str> = entries.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["a", "b"]);
        assert_eq!(value.entry("a"), Some(&Value::Int(1)));
    }

    #[test]
    fn accessors_match_variant() {
        assert_eq!(Value::from(true).as_bool(), Some(true));
        assert_eq!(Value::from(7i32).as_int(), Some(7));
        assert_eq!(Value::from("x").as_str(), Some("x"));
        assert_eq!(Value::from(7i32).as_str(), None);
        assert_eq!(
            Value::Struct(vec![Value::Int(1)]).field(0),
            Some(&Value::Int(1))
        );
    }

    #[test]
    fn kind_names() {
        assert_eq!(Value::union(0, Value::Bool(true)).kind_name(), "union");
        assert_eq!(Value::Float(1.0).kind_name(), "float");
    }
}
