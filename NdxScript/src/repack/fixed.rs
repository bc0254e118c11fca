//! Fixed-pool repack
//!
//! For binaries loaded at a fixed address: every string entry is written
//! into a free-space pool and all of its pointers are rewritten with the new
//! virtual address. Entries with a `MaxLength` are written in place instead.

use super::patch::{patch_hi_lo, patch_u32, virtual_address};
use super::{InsertionMask, PoolAllocator, RepackOutput, Warning};
use crate::codec::{CodecTable, TERMINATOR};
use crate::cursor::ByteCursor;
use crate::error::{Error, Result};
use crate::ir::{IrDocument, TranslationEntry};

/// Layout of the target binary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FixedOptions {
    /// Address the binary is loaded at.
    pub base_offset: usize,
    /// Pad each string so its terminated length is a multiple of four.
    pub pad: bool,
}

impl FixedOptions {
    pub fn new(base_offset: usize) -> Self {
        Self {
            base_offset,
            pad: false,
        }
    }

    #[must_use]
    pub fn with_pad(mut self, pad: bool) -> Self {
        self.pad = pad;
        self
    }
}

/// Write every string entry of `document` into `original`.
///
/// Entries are processed in document order.
///
/// # Errors
///
/// Returns [`Error::OutOfSpace`] when no pool can hold an entry, and
/// [`Error::Entry`] for entries that fail to encode or patch.
pub fn repack_fixed(
    original: &[u8],
    document: &IrDocument,
    codec: &CodecTable,
    mask: &InsertionMask,
    allocator: &mut PoolAllocator,
    options: FixedOptions,
) -> Result<RepackOutput> {
    let mut cursor = ByteCursor::from_slice(original);
    let mut warnings = Vec::new();

    for (section, entry) in document.string_entries() {
        let bytes = entry_bytes(entry, codec, mask, options.pad)
            .map_err(|e| e.in_entry(section, entry.id))?;

        if let Some(max_length) = entry.max_length {
            let warning = write_fixed_length(&mut cursor, section, entry, bytes, max_length)
                .map_err(|e| e.in_entry(section, entry.id))?;
            if let Some(warning) = warning {
                tracing::warn!("{warning}");
                warnings.push(warning);
            }
            continue;
        }

        let position = allocator
            .allocate(bytes.len())
            .ok_or_else(|| Error::OutOfSpace {
                section: section.to_string(),
                entry_id: entry.id,
                required: bytes.len(),
            })?;

        write_pooled(&mut cursor, entry, &bytes, position, options.base_offset)
            .map_err(|e| e.in_entry(section, entry.id))?;
    }

    tracing::debug!(
        "Fixed repack: {} entries, {} bytes left in pools, {} warnings",
        document.string_entries().count(),
        allocator.remaining(),
        warnings.len()
    );
    Ok(RepackOutput {
        bytes: cursor.into_inner(),
        warnings,
    })
}

/// Encoded text with optional alignment padding and the terminator.
fn entry_bytes(
    entry: &TranslationEntry,
    codec: &CodecTable,
    mask: &InsertionMask,
    pad: bool,
) -> Result<Vec<u8>> {
    let mut bytes = codec.encode(&mask.text_for(entry))?;
    if pad {
        let rest = 3 - bytes.len() % 4;
        bytes.resize(bytes.len() + rest, TERMINATOR);
    }
    bytes.push(TERMINATOR);
    Ok(bytes)
}

fn write_fixed_length(
    cursor: &mut ByteCursor,
    section: &str,
    entry: &TranslationEntry,
    mut bytes: Vec<u8>,
    max_length: usize,
) -> Result<Option<Warning>> {
    let offset = *entry.pointer_offsets.first().ok_or_else(|| {
        Error::InvalidIr(format!("entry {} has MaxLength but no offset", entry.id))
    })?;
    if max_length == 0 {
        return Err(Error::InvalidIr(format!("entry {} has MaxLength 0", entry.id)));
    }

    let encoded_length = bytes.len();
    let warning = if encoded_length > max_length {
        bytes.truncate(max_length - 1);
        bytes.push(TERMINATOR);
        Some(Warning::TruncatedText {
            section: section.to_string(),
            entry_id: entry.id,
            max_length,
            encoded_length,
        })
    } else {
        bytes.resize(max_length, TERMINATOR);
        None
    };

    cursor.write_bytes_at(offset, &bytes)?;
    Ok(warning)
}

fn write_pooled(
    cursor: &mut ByteCursor,
    entry: &TranslationEntry,
    bytes: &[u8],
    position: usize,
    base_offset: usize,
) -> Result<()> {
    cursor.write_bytes_at(position, bytes)?;

    for &offset in &entry.pointer_offsets {
        let address = virtual_address(offset, position, base_offset)?;
        patch_u32(cursor, offset, address)?;
    }

    if let Some(embed) = &entry.embed_offsets {
        for (&hi, &lo) in embed.hi.iter().zip(&embed.lo) {
            let hi_offset = file_offset(hi, base_offset)?;
            let lo_offset = file_offset(lo, base_offset)?;
            let address = virtual_address(hi_offset, position, base_offset)?;
            patch_hi_lo(cursor, hi_offset, lo_offset, address)?;
        }
    }
    Ok(())
}

/// Embedded offsets are stored as virtual addresses.
fn file_offset(address: usize, base_offset: usize) -> Result<usize> {
    address.checked_sub(base_offset).ok_or_else(|| {
        Error::InvalidIr(format!(
            "embedded offset {address:#x} is below base {base_offset:#x}"
        ))
    })
}
