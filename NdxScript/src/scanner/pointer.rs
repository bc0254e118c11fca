//! SPDX-License-Identifier: MIT
//!
//! Pointer field encodings

use byteorder::{ByteOrder, LittleEndian};

use crate::cursor::ByteCursor;
use crate::error::{Error, Result};

/// How a pointer field is stored and what it is relative to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerEncoding {
    /// `u16` added to a section base (TSS strings section).
    RelativeU16 { base: usize },
    /// `u32` virtual address; the file offset is the value minus `base`.
    AbsoluteU32 { base: usize },
}

impl PointerEncoding {
    /// Width of the field in bytes.
    #[must_use]
    pub fn field_size(self) -> usize {
        match self {
            PointerEncoding::RelativeU16 { .. } => 2,
            PointerEncoding::AbsoluteU32 { .. } => 4,
        }
    }

    /// Read the field at `patch_offset` and resolve it to a buffer offset.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedPointer`] if the field does not fit in
    /// `buffer` or the resolved offset lies outside it.
    pub fn read(self, buffer: &[u8], patch_offset: usize) -> Result<usize> {
        let malformed = |target_offset| Error::MalformedPointer {
            patch_offset,
            target_offset,
            len: buffer.len(),
        };

        let field = patch_offset
            .checked_add(self.field_size())
            .and_then(|end| buffer.get(patch_offset..end))
            .ok_or_else(|| malformed(0))?;

        let target = match self {
            PointerEncoding::RelativeU16 { base } => {
                base + usize::from(LittleEndian::read_u16(field))
            }
            PointerEncoding::AbsoluteU32 { base } => {
                let raw = LittleEndian::read_u32(field) as usize;
                raw.checked_sub(base).ok_or_else(|| malformed(raw))?
            }
        };

        if target >= buffer.len() {
            return Err(malformed(target));
        }
        Ok(target)
    }

    /// Store `target` in the field at `patch_offset`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PointerOverflow`] if the stored value does not fit the
    /// field, or [`Error::OutOfBounds`] if the field is outside the buffer.
    pub fn write(self, cursor: &mut ByteCursor, patch_offset: usize, target: usize) -> Result<()> {
        let overflow = |value| Error::PointerOverflow {
            patch_offset,
            value,
        };

        match self {
            PointerEncoding::RelativeU16 { base } => {
                let relative = target.checked_sub(base).ok_or_else(|| overflow(target))?;
                let value = u16::try_from(relative).map_err(|_| overflow(relative))?;
                cursor.write_u16_at(patch_offset, value)
            }
            PointerEncoding::AbsoluteU32 { base } => {
                let absolute = target + base;
                let value = u32::try_from(absolute).map_err(|_| overflow(absolute))?;
                cursor.write_u32_at(patch_offset, value)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absolute_read_subtracts_base() {
        let buffer = [0x04, 0x00, 0x00, 0x08, 0xAA, 0xBB];
        let encoding = PointerEncoding::AbsoluteU32 { base: 0x0800_0000 };
        assert_eq!(encoding.read(&buffer, 0).unwrap(), 4);

        let below_base = PointerEncoding::AbsoluteU32 { base: 0x0900_0000 };
        assert!(matches!(
            below_base.read(&buffer, 0),
            Err(Error::MalformedPointer { target_offset: 0x0800_0004, .. })
        ));
    }

    #[test]
    fn test_relative_write_checks_range() {
        let mut cursor = ByteCursor::new(vec![0; 4]);
        let encoding = PointerEncoding::RelativeU16 { base: 0x100 };
        encoding.write(&mut cursor, 0, 0x134).unwrap();
        assert_eq!(cursor.read_u16_at(0).unwrap(), 0x34);

        assert!(matches!(
            encoding.write(&mut cursor, 0, 0x10100),
            Err(Error::PointerOverflow { patch_offset: 0, value: 0x10000 })
        ));
        assert!(matches!(
            encoding.write(&mut cursor, 2, 0x50),
            Err(Error::PointerOverflow { patch_offset: 2, value: 0x50 })
        ));
    }

    #[test]
    fn test_absolute_write_adds_base() {
        let mut cursor = ByteCursor::new(vec![0; 4]);
        PointerEncoding::AbsoluteU32 { base: 0x0800_0000 }
            .write(&mut cursor, 0, 0x1234)
            .unwrap();
        assert_eq!(cursor.read_u32_at(0).unwrap(), 0x0800_1234);
    }
}
