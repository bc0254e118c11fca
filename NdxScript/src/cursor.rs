//! Bounds-checked little-endian byte cursor
//!
//! Sequential reads advance the cursor; the `_at` variants read or patch at an
//! absolute offset and leave the cursor where it was. Nothing here knows
//! about game formats.

use byteorder::{ByteOrder, LittleEndian};

use crate::error::{Error, Result};

/// Owned byte buffer with a read position.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ByteCursor {
    data: Vec<u8>,
    pos: usize,
}

impl ByteCursor {
    pub fn new(data: Vec<u8>) -> Self {
        Self { data, pos: 0 }
    }

    pub fn from_slice(data: &[u8]) -> Self {
        Self::new(data.to_vec())
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.data
    }

    /// Current position.
    pub fn tell(&self) -> usize {
        self.pos
    }

    /// Move to an absolute offset. Seeking to `len()` is allowed (end of buffer).
    pub fn seek(&mut self, offset: usize) -> Result<()> {
        if offset > self.data.len() {
            return Err(self.out_of_bounds(offset, 0));
        }
        self.pos = offset;
        Ok(())
    }

    fn out_of_bounds(&self, offset: usize, size: usize) -> Error {
        Error::OutOfBounds {
            offset,
            size,
            len: self.data.len(),
        }
    }

    fn range(&self, offset: usize, size: usize) -> Result<std::ops::Range<usize>> {
        match offset.checked_add(size) {
            Some(end) if end <= self.data.len() => Ok(offset..end),
            _ => Err(self.out_of_bounds(offset, size)),
        }
    }

    // ------------------------------------------------------------------
    // Absolute reads (cursor unchanged)
    // ------------------------------------------------------------------

    pub fn read_u8_at(&self, offset: usize) -> Result<u8> {
        let range = self.range(offset, 1)?;
        Ok(self.data[range.start])
    }

    pub fn read_u16_at(&self, offset: usize) -> Result<u16> {
        let range = self.range(offset, 2)?;
        Ok(LittleEndian::read_u16(&self.data[range]))
    }

    pub fn read_u32_at(&self, offset: usize) -> Result<u32> {
        let range = self.range(offset, 4)?;
        Ok(LittleEndian::read_u32(&self.data[range]))
    }

    pub fn read_bytes_at(&self, offset: usize, size: usize) -> Result<&[u8]> {
        let range = self.range(offset, size)?;
        Ok(&self.data[range])
    }

    // ------------------------------------------------------------------
    // Sequential reads (cursor advances)
    // ------------------------------------------------------------------

    pub fn read_u8(&mut self) -> Result<u8> {
        let value = self.read_u8_at(self.pos)?;
        self.pos += 1;
        Ok(value)
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        let value = self.read_u16_at(self.pos)?;
        self.pos += 2;
        Ok(value)
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        let value = self.read_u32_at(self.pos)?;
        self.pos += 4;
        Ok(value)
    }

    // ------------------------------------------------------------------
    // Absolute writes (cursor unchanged)
    // ------------------------------------------------------------------

    pub fn write_u8_at(&mut self, offset: usize, value: u8) -> Result<()> {
        let range = self.range(offset, 1)?;
        self.data[range.start] = value;
        Ok(())
    }

    pub fn write_u16_at(&mut self, offset: usize, value: u16) -> Result<()> {
        let range = self.range(offset, 2)?;
        LittleEndian::write_u16(&mut self.data[range], value);
        Ok(())
    }

    pub fn write_u32_at(&mut self, offset: usize, value: u32) -> Result<()> {
        let range = self.range(offset, 4)?;
        LittleEndian::write_u32(&mut self.data[range], value);
        Ok(())
    }

    pub fn write_bytes_at(&mut self, offset: usize, bytes: &[u8]) -> Result<()> {
        let range = self.range(offset, bytes.len())?;
        self.data[range].copy_from_slice(bytes);
        Ok(())
    }

    /// Grow the buffer with `bytes` and return the offset they were placed at.
    pub fn append(&mut self, bytes: &[u8]) -> usize {
        let offset = self.data.len();
        self.data.extend_from_slice(bytes);
        offset
    }

    /// Drop everything from `len` onwards. The cursor is clamped to the new end.
    pub fn truncate(&mut self, len: usize) {
        self.data.truncate(len);
        self.pos = self.pos.min(self.data.len());
    }
}
