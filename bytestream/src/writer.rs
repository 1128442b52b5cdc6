//! Growable byte writer backed by the buffer pool.

use crate::error::{StreamError, StreamResult};
use crate::pool::BufferPool;

/// Default capacity for a fresh writer.
const DEFAULT_CAPACITY: usize = 64;

/// A growable byte writer for encoding values.
///
/// The underlying buffer is drawn from a [`BufferPool`] and grows through the
/// pool as well. Multi-byte values are staged through a fixed 8-byte scratch
/// buffer and copied byte-by-byte, so output never depends on the alignment of
/// the current offset. All multi-byte values are little-endian.
///
/// Dropping a writer returns its buffer to the pool. Call
/// [`finish`](Self::finish) to take ownership of the bytes instead.
#[derive(Debug)]
pub struct ByteWriter {
    pool: BufferPool,
    bytes: Vec<u8>,
    scratch: [u8; 8],
}

impl ByteWriter {
    /// Creates a writer with the default capacity.
    #[must_use]
    pub fn new(pool: &BufferPool) -> Self {
        Self::with_capacity(pool, DEFAULT_CAPACITY)
    }

    /// Creates a writer with at least `capacity` bytes pre-allocated.
    #[must_use]
    pub fn with_capacity(pool: &BufferPool, capacity: usize) -> Self {
        Self {
            pool: pool.clone(),
            bytes: pool.alloc(capacity),
            scratch: [0; 8],
        }
    }

    /// Returns the number of bytes written so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Returns `true` if nothing has been written.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Returns the current buffer capacity.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.bytes.capacity()
    }

    /// Returns the bytes written so far.
    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        &self.bytes
    }

    /// Returns the pool this writer draws from.
    #[must_use]
    pub fn pool(&self) -> &BufferPool {
        &self.pool
    }

    /// Discards written bytes, keeping the buffer.
    pub fn clear(&mut self) {
        self.bytes.clear();
    }

    /// Truncates the written bytes to `len`.
    pub fn truncate(&mut self, len: usize) {
        self.bytes.truncate(len);
    }

    /// Ensures room for `extra` more bytes.
    ///
    /// When the current buffer is too small a larger one is drawn from the
    /// pool, the written bytes are copied over, and the old buffer is released
    /// back to its bucket.
    pub fn grow(&mut self, extra: usize) {
        let needed = self.bytes.len() + extra;
        if needed <= self.bytes.capacity() {
            return;
        }
        let mut next = self.pool.alloc(needed);
        next.extend_from_slice(&self.bytes);
        let old = std::mem::replace(&mut self.bytes, next);
        self.pool.free(old);
    }

    /// Writes a boolean as a single byte.
    pub fn write_bool(&mut self, value: bool) {
        self.write_u8(u8::from(value));
    }

    /// Writes a `u8`.
    pub fn write_u8(&mut self, value: u8) {
        self.grow(1);
        self.bytes.push(value);
    }

    /// Writes an `i8`.
    pub fn write_i8(&mut self, value: i8) {
        self.write_u8(value.to_le_bytes()[0]);
    }

    /// Writes a little-endian `u16`.
    pub fn write_u16(&mut self, value: u16) {
        self.scratch[..2].copy_from_slice(&value.to_le_bytes());
        self.write_staged(2);
    }

    /// Writes a little-endian `i16`.
    pub fn write_i16(&mut self, value: i16) {
        self.scratch[..2].copy_from_slice(&value.to_le_bytes());
        self.write_staged(2);
    }

    /// Writes a little-endian `u32`.
    pub fn write_u32(&mut self, value: u32) {
        self.scratch[..4].copy_from_slice(&value.to_le_bytes());
        self.write_staged(4);
    }

    /// Writes a little-endian `i32`.
    pub fn write_i32(&mut self, value: i32) {
        self.scratch[..4].copy_from_slice(&value.to_le_bytes());
        self.write_staged(4);
    }

    /// Writes a little-endian IEEE-754 `f32`.
    pub fn write_f32(&mut self, value: f32) {
        self.scratch[..4].copy_from_slice(&value.to_le_bytes());
        self.write_staged(4);
    }

    /// Writes a little-endian IEEE-754 `f64`.
    pub fn write_f64(&mut self, value: f64) {
        self.scratch.copy_from_slice(&value.to_le_bytes());
        self.write_staged(8);
    }

    /// Writes a varint `u32` (7 bits per byte, low groups first).
    pub fn write_varu32(&mut self, mut value: u32) {
        self.grow(5);
        loop {
            let mut byte = (value & 0x7F) as u8;
            value >>= 7;
            if value != 0 {
                byte |= 0x80;
            }
            self.bytes.push(byte);
            if value == 0 {
                break;
            }
        }
    }

    /// Writes raw bytes with no length prefix.
    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.grow(bytes.len());
        self.bytes.extend_from_slice(bytes);
    }

    /// Writes a string as a `u32` byte count followed by its UTF-8 bytes.
    pub fn write_string(&mut self, value: &str) -> StreamResult<()> {
        let len = u32::try_from(value.len()).map_err(|_| StreamError::LengthOverflow {
            length: value.len(),
        })?;
        self.write_u32(len);
        self.write_bytes(value.as_bytes());
        Ok(())
    }

    /// Writes a string with the same layout as [`write_string`](Self::write_string),
    /// rejecting any byte above 0x7F.
    pub fn write_ascii(&mut self, value: &str) -> StreamResult<()> {
        if !value.is_ascii() {
            return Err(StreamError::NonAscii {
                offset: self.bytes.len(),
            });
        }
        self.write_string(value)
    }

    /// Reserves four bytes for a `u32` to be filled in later.
    ///
    /// Returns the offset to pass to [`patch_u32_at`](Self::patch_u32_at).
    pub fn reserve_u32(&mut self) -> usize {
        let offset = self.bytes.len();
        self.write_u32(0);
        offset
    }

    /// Overwrites a previously reserved `u32`.
    ///
    /// Offsets outside the written range are ignored.
    pub fn patch_u32_at(&mut self, offset: usize, value: u32) {
        if let Some(slot) = self.bytes.get_mut(offset..offset + 4) {
            slot.copy_from_slice(&value.to_le_bytes());
        }
    }

    /// Finishes writing and returns the byte buffer.
    ///
    /// The buffer keeps its pooled capacity; hand it back with
    /// [`BufferPool::free`] once it is no longer needed.
    #[must_use]
    pub fn finish(mut self) -> Vec<u8> {
        std::mem::take(&mut self.bytes)
    }

    /// Discards the written bytes and returns the buffer to its pool.
    pub fn release(self) {
        drop(self);
    }

    /// Finishes writing and appends to the provided buffer.
    pub fn finish_into(self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&self.bytes);
    }

    fn write_staged(&mut self, len: usize) {
        self.grow(len);
        for &byte in &self.scratch[..len] {
            self.bytes.push(byte);
        }
    }
}

impl Drop for ByteWriter {
    fn drop(&mut self) {
        if self.bytes.capacity() > 0 {
            self.pool.free(std::mem::take(&mut self.bytes));
        }
    }
}
