//! SPDX-License-Identifier: MIT
//!
//! Pointer patch helpers for fixed-address binaries

use crate::cursor::ByteCursor;
use crate::error::{Error, Result};

/// Split an address into the halves of a `lui`/`addiu` style pair.
///
/// The low half is added as a signed immediate, so the high half is bumped
/// when the low half has its sign bit set.
pub fn split_hi_lo(address: u32) -> (u16, u16) {
    let lo = (address & 0xFFFF) as u16;
    let mut hi = (address >> 16) as u16;
    if lo >= 0x8000 {
        hi = hi.wrapping_add(1);
    }
    (hi, lo)
}

/// Virtual address of a file position.
pub fn virtual_address(patch_offset: usize, position: usize, base_offset: usize) -> Result<u32> {
    position
        .checked_add(base_offset)
        .and_then(|address| u32::try_from(address).ok())
        .ok_or(Error::PointerOverflow {
            patch_offset,
            value: position.saturating_add(base_offset),
        })
}

/// Store a 32-bit address at `patch_offset`.
pub fn patch_u32(cursor: &mut ByteCursor, patch_offset: usize, address: u32) -> Result<()> {
    cursor.write_u32_at(patch_offset, address)
}

/// Store the split halves of `address` at `hi_offset` and `lo_offset`.
pub fn patch_hi_lo(
    cursor: &mut ByteCursor,
    hi_offset: usize,
    lo_offset: usize,
    address: u32,
) -> Result<()> {
    let (hi, lo) = split_hi_lo(address);
    cursor.write_u16_at(hi_offset, hi)?;
    cursor.write_u16_at(lo_offset, lo)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hi_lo_carry() {
        assert_eq!(split_hi_lo(0x0801_9234), (0x0802, 0x9234));
        assert_eq!(split_hi_lo(0x0801_7FFF), (0x0801, 0x7FFF));
        assert_eq!(split_hi_lo(0x0801_8000), (0x0802, 0x8000));
    }

    #[test]
    fn test_patch_hi_lo() {
        let mut cursor = ByteCursor::new(vec![0; 8]);
        patch_hi_lo(&mut cursor, 0, 4, 0x0801_9234).unwrap();
        assert_eq!(cursor.read_u16_at(0).unwrap(), 0x0802);
        assert_eq!(cursor.read_u16_at(4).unwrap(), 0x9234);
    }

    #[test]
    fn test_virtual_address_must_fit() {
        assert_eq!(virtual_address(0, 0x10, 0x0200_0000).unwrap(), 0x0200_0010);
        assert!(matches!(
            virtual_address(8, 0xFFFF_FFF0, 0x20),
            Err(Error::PointerOverflow { patch_offset: 8, .. })
        ));
    }
}
