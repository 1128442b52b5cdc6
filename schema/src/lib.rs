//! Schema type trees, values and hashing for the statecast codec.
//!
//! This crate defines how replicated state is described:
//! - [`SchemaType`], a closed set of value descriptors (primitives, strings,
//!   structs, fixed arrays, dictionaries, tagged unions)
//! - [`Value`], the in-memory instance of a schema
//! - Deterministic structural hashing used by the connection handshake
//!
//! Encoding, diffing and patching live in the `codec` crate.
//!
//! # Design Principles
//!
//! - **Runtime-first** - Schemas are built at runtime, no derive macros.
//! - **Immutable schemas** - A schema never changes once constructed.
//! - **Deterministic hashing** - Schema hash is stable given the same definition.

mod error;
mod field;
mod hash;
mod schema;
mod value;

pub use error::{SchemaError, SchemaResult};
pub use field::{FieldDef, FloatWidth, IntType, IntWidth};
pub use hash::{schema_set_hash, type_hash, SchemaHash};
pub use schema::{ArrayType, SchemaType, StructType, UnionType};
pub use value::Value;
