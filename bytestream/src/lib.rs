//! Pooled byte buffers and primitive streams for the statecast codec.
//!
//! This crate provides [`ByteWriter`] and [`ByteReader`] for byte-level encoding
//! and decoding, and [`BufferPool`], the size-class arena every writer draws its
//! storage from.
//!
//! # Design Principles
//!
//! - **No unsafe code** - Alignment independence comes from staging through a
//!   scratch buffer, not pointer casts.
//! - **Bounded reads** - All reads are bounds-checked and return errors.
//! - **Explicit pool** - The pool is a value handed to writers, never a global.
//! - **No domain knowledge** - This crate knows nothing about schemas or ticks.
//!
//! # Example
//!
//! ```
//! use bytestream::{BufferPool, ByteReader, ByteWriter};
//!
//! let pool = BufferPool::new();
//! let mut writer = ByteWriter::new(&pool);
//! writer.write_bool(true);
//! writer.write_u32(42);
//! writer.write_string("hi").unwrap();
//!
//! let bytes = writer.finish();
//!
//! let mut reader = ByteReader::new(&bytes);
//! assert!(reader.read_bool().unwrap());
//! assert_eq!(reader.read_u32().unwrap(), 42);
//! assert_eq!(reader.read_string().unwrap(), "hi");
//! pool.free(bytes);
//! ```

mod error;
mod pool;
mod reader;
mod writer;

pub use error::{StreamError, StreamResult};
pub use pool::{size_class, BufferPool, PoolStats};
pub use reader::ByteReader;
pub use writer::ByteWriter;
