//! Schema-driven diff/patch encoding and tick history for statecast.
//!
//! This crate ties together `bytestream` and `schema` to compute and apply
//! minimal byte-level deltas between two values of the same schema.
//!
//! # Features
//!
//! - Full value encoding/decoding
//! - Delta encoding relative to a base value
//! - Tick-indexed state history with horizon eviction
//! - Bounded decoding of untrusted input via [`CodecLimits`]
//!
//! # Design Principles
//!
//! - **Minimal deltas** - Unchanged members cost nothing beyond a mask bit.
//! - **Wire equality** - Comparisons happen after width truncation.
//! - **Deterministic** - Same inputs produce same outputs.
//!
//! # Example
//!
//! ```
//! use bytestream::{BufferPool, ByteWriter};
//! use codec::{diff, equal, patch_bytes, CodecLimits};
//! use schema::{SchemaType, StructType, Value};
//!
//! let ty = SchemaType::structure(StructType::new().field("x", SchemaType::int32())).unwrap();
//! let base = ty.identity();
//! let target = Value::Struct(vec![Value::Int(5)]);
//!
//! let pool = BufferPool::new();
//! let mut out = ByteWriter::new(&pool);
//! assert!(diff(&ty, &base, &target, &mut out).unwrap());
//!
//! let patched = patch_bytes(&ty, &base, out.as_slice(), &CodecLimits::default()).unwrap();
//! assert!(equal(&ty, &patched, &target));
//! ```

mod delta;
mod error;
mod full;
mod history;
mod limits;
mod types;
mod value;

pub use delta::{diff, patch, patch_bytes};
pub use error::{CodecError, CodecResult, HistoryError, LimitKind, ValueReason};
pub use full::{check_limits, decode, decode_bytes, encode};
pub use history::StateHistory;
pub use limits::CodecLimits;
pub use types::Tick;
pub use value::{alloc, clone_value, equal};
