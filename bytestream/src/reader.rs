//! Bounded byte reader.

use crate::error::{StreamError, StreamResult};

/// A byte reader for decoding values written by [`ByteWriter`](crate::ByteWriter).
///
/// All reads are bounds-checked and return errors on failure. Multi-byte
/// values are gathered byte-by-byte into a fixed scratch buffer before being
/// interpreted, mirroring the writer.
#[derive(Debug, Clone)]
pub struct ByteReader<'a> {
    data: &'a [u8],
    pos: usize,
    scratch: [u8; 8],
}

impl<'a> ByteReader<'a> {
    /// Creates a new reader over a byte slice.
    #[must_use]
    pub const fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            pos: 0,
            scratch: [0; 8],
        }
    }

    /// Returns the number of bytes remaining.
    #[must_use]
    pub const fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.pos)
    }

    /// Returns `true` if there are no more bytes to read.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// Returns the current byte offset.
    #[must_use]
    pub const fn position(&self) -> usize {
        self.pos
    }

    /// Returns the unread bytes without consuming them.
    #[must_use]
    pub fn rest(&self) -> &'a [u8] {
        &self.data[self.pos.min(self.data.len())..]
    }

    /// Reads a boolean byte (must be 0 or 1).
    pub fn read_bool(&mut self) -> StreamResult<bool> {
        match self.read_u8()? {
            0 => Ok(false),
            1 => Ok(true),
            value => Err(StreamError::InvalidBool { value }),
        }
    }

    /// Reads a `u8`.
    pub fn read_u8(&mut self) -> StreamResult<u8> {
        self.ensure(1)?;
        let value = self.data[self.pos];
        self.pos += 1;
        Ok(value)
    }

    /// Reads an `i8`.
    pub fn read_i8(&mut self) -> StreamResult<i8> {
        Ok(i8::from_le_bytes([self.read_u8()?]))
    }

    /// Reads a little-endian `u16`.
    pub fn read_u16(&mut self) -> StreamResult<u16> {
        self.stage(2)?;
        Ok(u16::from_le_bytes([self.scratch[0], self.scratch[1]]))
    }

    /// Reads a little-endian `i16`.
    pub fn read_i16(&mut self) -> StreamResult<i16> {
        self.stage(2)?;
        Ok(i16::from_le_bytes([self.scratch[0], self.scratch[1]]))
    }

    /// Reads a little-endian `u32`.
    pub fn read_u32(&mut self) -> StreamResult<u32> {
        self.stage(4)?;
        Ok(u32::from_le_bytes(self.staged4()))
    }

    /// Reads a little-endian `i32`.
    pub fn read_i32(&mut self) -> StreamResult<i32> {
        self.stage(4)?;
        Ok(i32::from_le_bytes(self.staged4()))
    }

    /// Reads a little-endian `f32`.
    pub fn read_f32(&mut self) -> StreamResult<f32> {
        self.stage(4)?;
        Ok(f32::from_le_bytes(self.staged4()))
    }

    /// Reads a little-endian `f64`.
    pub fn read_f64(&mut self) -> StreamResult<f64> {
        self.stage(8)?;
        Ok(f64::from_le_bytes(self.scratch))
    }

    /// Reads a varint `u32`.
    pub fn read_varu32(&mut self) -> StreamResult<u32> {
        let mut result = 0u32;
        for shift in (0..35).step_by(7) {
            let byte = self.read_u8()?;
            result |= u32::from(byte & 0x7F) << shift;
            if byte & 0x80 == 0 {
                return Ok(result);
            }
        }
        Err(StreamError::InvalidVarint)
    }

    /// Reads `len` raw bytes.
    pub fn read_bytes(&mut self, len: usize) -> StreamResult<&'a [u8]> {
        self.ensure(len)?;
        let bytes = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(bytes)
    }

    /// Reads `len` bytes and validates them as UTF-8.
    pub fn read_utf8(&mut self, len: usize) -> StreamResult<&'a str> {
        let offset = self.pos;
        let bytes = self.read_bytes(len)?;
        std::str::from_utf8(bytes).map_err(|_| StreamError::InvalidUtf8 { offset })
    }

    /// Reads a `u32` length-prefixed UTF-8 string.
    pub fn read_string(&mut self) -> StreamResult<String> {
        let len = self.read_u32()? as usize;
        self.read_utf8(len).map(str::to_owned)
    }

    /// Reads a `u32` length-prefixed string that must be pure ASCII.
    pub fn read_ascii(&mut self) -> StreamResult<String> {
        let len = self.read_u32()? as usize;
        let offset = self.pos;
        let bytes = self.read_bytes(len)?;
        if !bytes.is_ascii() {
            return Err(StreamError::NonAscii { offset });
        }
        std::str::from_utf8(bytes)
            .map(str::to_owned)
            .map_err(|_| StreamError::InvalidUtf8 { offset })
    }

    fn ensure(&self, len: usize) -> StreamResult<()> {
        let available = self.remaining();
        if len > available {
            return Err(StreamError::UnexpectedEof {
                requested: len,
                available,
            });
        }
        Ok(())
    }

    fn stage(&mut self, len: usize) -> StreamResult<()> {
        self.ensure(len)?;
        let source = &self.data[self.pos..self.pos + len];
        for (slot, byte) in self.scratch.iter_mut().zip(source) {
            *slot = *byte;
        }
        self.pos += len;
        Ok(())
    }

    fn staged4(&self) -> [u8; 4] {
        [
            self.scratch[0],
            self.scratch[1],
            self.scratch[2],
            self.scratch[3],
        ]
    }
}
