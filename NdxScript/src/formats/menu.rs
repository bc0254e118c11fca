//! Menu overlays
//!
//! Menu text lives in binaries loaded at a fixed address (`arm9.bin`,
//! overlays, item tables). Each file is described by a [`MenuDefinition`]
//! listing where its pointer tables are and which regions are free for
//! relocated text. Packing goes through the fixed-pool strategy.

use std::fs;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::codec::CodecTable;
use crate::cursor::ByteCursor;
use crate::error::{Error, Result};
use crate::ir::{
    DocumentKind, IrDocument, IrSection, MergeOptions, SectionKind, TranslationEntry,
    merge_with_report, read_ir, write_ir,
};
use crate::repack::{
    FixedOptions, InsertionMask, PoolAllocator, RepackOutput, repack_fixed, write_atomic,
};
use crate::script::split_voice;

/// How one file's menu text is laid out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MenuDefinition {
    /// Name of the IR file, without extension.
    pub friendly_name: String,
    /// Path of the binary, relative to the extracted files root.
    pub file_path: PathBuf,
    /// Address the binary is loaded at.
    #[serde(default)]
    pub base_offset: usize,
    /// Free `[start, end)` regions available for relocated text.
    #[serde(default)]
    pub safe_areas: Vec<(usize, usize)>,
    #[serde(default)]
    pub pad: bool,
    pub sections: Vec<MenuSection>,
}

/// One pointer table, or a set of loose pointers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MenuSection {
    /// IR section name.
    pub section: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pointers_start: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pointers_end: Option<usize>,
    /// Layout of one table row, see [`StyleStep`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<String>,
    /// Offsets of individual `u32` pointers outside any table.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pointers_alone: Vec<usize>,
}

/// One token of a table row style.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StyleStep {
    /// `P`: a `u32` pointer.
    Pointer,
    /// `T`: inline text starting here.
    Text,
    /// Digits: bytes to skip.
    Skip(usize),
}

impl StyleStep {
    /// Parse a row style such as `"P4P"` or `"T32"`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidTable`] on unknown characters, or when a row
    /// would not advance through the table.
    pub fn parse_style(style: &str) -> Result<Vec<StyleStep>> {
        let mut steps = Vec::new();
        let mut chars = style.char_indices().peekable();

        while let Some((start, c)) = chars.next() {
            match c {
                'P' => steps.push(StyleStep::Pointer),
                'T' => steps.push(StyleStep::Text),
                '0'..='9' => {
                    let mut end = start + 1;
                    while let Some(&(i, d)) = chars.peek() {
                        if !d.is_ascii_digit() {
                            break;
                        }
                        end = i + 1;
                        chars.next();
                    }
                    let count = style[start..end]
                        .parse()
                        .map_err(|_| Error::InvalidTable(format!("bad skip in style {style:?}")))?;
                    steps.push(StyleStep::Skip(count));
                }
                other => {
                    return Err(Error::InvalidTable(format!(
                        "unexpected {other:?} in style {style:?}"
                    )));
                }
            }
        }

        let advances = steps.iter().any(|step| match step {
            StyleStep::Pointer => true,
            StyleStep::Skip(n) => *n > 0,
            StyleStep::Text => false,
        });
        if !advances {
            return Err(Error::InvalidTable(format!(
                "style {style:?} does not advance"
            )));
        }
        Ok(steps)
    }
}

impl MenuSection {
    /// Size of inline text fields, for styles starting with `T<n>`.
    pub fn max_length(&self) -> Option<usize> {
        let digits = self.style.as_deref()?.strip_prefix('T')?;
        let end = digits
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(digits.len());
        digits[..end].parse().ok()
    }

    /// Pointer field offsets and the file offsets they resolve to.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidTable`] for a bad style or a table without an
    /// end, [`Error::OutOfBounds`] for a table running past the buffer and
    /// [`Error::MalformedPointer`] for a loose pointer below `base_offset`.
    pub fn pointers(&self, buffer: &[u8], base_offset: usize) -> Result<Vec<(usize, usize)>> {
        let cursor = ByteCursor::from_slice(buffer);
        let mut pointers = Vec::new();

        if let Some(start) = self.pointers_start {
            let end = self.pointers_end.ok_or_else(|| {
                Error::InvalidTable(format!("section {} has no pointers_end", self.section))
            })?;
            let style = self.style.as_deref().unwrap_or("P");
            let steps = StyleStep::parse_style(style)?;

            let mut pos = start;
            while pos < end {
                for step in &steps {
                    match *step {
                        StyleStep::Pointer => {
                            let field = pos;
                            let value = cursor.read_u32_at(field)? as usize;
                            pos += 4;
                            // Null entries in tables of absolute pointers
                            if base_offset != 0 && value == 0 {
                                continue;
                            }
                            if field < end && value > base_offset {
                                pointers.push((field, value - base_offset));
                            }
                        }
                        StyleStep::Text => pointers.push((pos, pos)),
                        StyleStep::Skip(count) => pos += count,
                    }
                }
            }
        }

        for &field in &self.pointers_alone {
            let value = cursor.read_u32_at(field)? as usize;
            let target = value
                .checked_sub(base_offset)
                .ok_or(Error::MalformedPointer {
                    patch_offset: field,
                    target_offset: value,
                    len: buffer.len(),
                })?;
            pointers.push((field, target));
        }

        Ok(pointers)
    }
}

impl MenuDefinition {
    /// Parse a JSON list of definitions.
    ///
    /// # Errors
    ///
    /// Returns [`Error::JsonError`] if the JSON does not describe definitions.
    pub fn list_from_json_str(json: &str) -> Result<Vec<MenuDefinition>> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load a JSON list of definitions.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_list<P: AsRef<Path>>(path: P) -> Result<Vec<MenuDefinition>> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| Error::from(e).in_file(path))?;
        Self::list_from_json_str(&content).map_err(|e| e.in_file(path))
    }

    /// File name of this definition's IR.
    #[must_use]
    pub fn ir_file_name(&self) -> String {
        format!("{}.xml", self.friendly_name)
    }

    pub fn allocator(&self) -> PoolAllocator {
        PoolAllocator::from_safe_areas(&self.safe_areas)
    }
}

/// Extract the menu text of `buffer`.
///
/// Identical texts within a section share one entry carrying every pointer
/// offset, except inline text fields which stay one entry per field. Entry
/// ids run across sections.
///
/// # Errors
///
/// See [`MenuSection::pointers`]; decoding errors name the section.
pub fn extract_menu(
    buffer: &[u8],
    definition: &MenuDefinition,
    codec: &CodecTable,
) -> Result<IrDocument> {
    let mut document = IrDocument::new(DocumentKind::MenuText);
    let mut next_id = 1u32;

    for menu_section in &definition.sections {
        let pointers = menu_section.pointers(buffer, definition.base_offset)?;
        let max_length = menu_section.max_length();

        let mut texts: IndexMap<String, Vec<usize>> = IndexMap::new();
        let mut inline = Vec::new();
        for (field, target) in pointers {
            let (text, _) = codec
                .decode_text(buffer, target)
                .map_err(|e| e.in_entry(&menu_section.section, next_id))?;
            if max_length.is_some() {
                inline.push((text, vec![field]));
            } else {
                texts.entry(text).or_default().push(field);
            }
        }

        let mut section = IrSection::new(SectionKind::Strings, menu_section.section.as_str());
        for (text, pointer_offsets) in texts.into_iter().chain(inline) {
            let (voice_id, source) = split_voice(&text);
            section.entries.push(TranslationEntry {
                pointer_offsets,
                voice_id,
                max_length,
                ..TranslationEntry::new(next_id, source)
            });
            next_id += 1;
        }

        if section.entries.is_empty() {
            tracing::warn!(
                "{}: section {} has no pointers",
                definition.friendly_name,
                menu_section.section
            );
        }
        document.sections.push(section);
    }

    tracing::debug!(
        "{}: extracted {} entries",
        definition.friendly_name,
        document.entry_count()
    );
    Ok(document)
}

/// Write the text of `document` into a copy of `original`.
///
/// # Errors
///
/// See [`repack_fixed`].
pub fn pack_menu(
    original: &[u8],
    definition: &MenuDefinition,
    document: &IrDocument,
    codec: &CodecTable,
    mask: &InsertionMask,
) -> Result<RepackOutput> {
    let mut allocator = definition.allocator();
    repack_fixed(
        original,
        document,
        codec,
        mask,
        &mut allocator,
        FixedOptions::new(definition.base_offset).with_pad(definition.pad),
    )
}

/// Extract `definition` from under `files_root` into `ir_dir`.
///
/// With `keep_translations`, an IR already in `ir_dir` is merged in first.
///
/// # Errors
///
/// Returns [`Error::File`] naming the binary for any failure.
pub fn extract_menu_file(
    definition: &MenuDefinition,
    files_root: &Path,
    ir_dir: &Path,
    codec: &CodecTable,
    keep_translations: Option<&MergeOptions>,
) -> Result<IrDocument> {
    let source = files_root.join(&definition.file_path);
    let destination = ir_dir.join(definition.ir_file_name());

    let run = || -> Result<IrDocument> {
        let mut document = extract_menu(&fs::read(&source)?, definition, codec)?;
        if let Some(options) = keep_translations {
            if destination.exists() {
                let previous = read_ir(&destination)?;
                let (merged, report) = merge_with_report(&document, &previous, options);
                tracing::info!(
                    "{}: kept {} translations ({} stale)",
                    definition.friendly_name,
                    report.carried,
                    report.stale
                );
                document = merged;
            }
        }
        write_ir(&destination, &document)?;
        Ok(document)
    };
    run().map_err(|e| e.in_file(&source))
}

/// Pack the IR in `ir_dir` into the binary, written under `output_root`.
///
/// # Errors
///
/// Returns [`Error::File`] naming the binary for any failure.
pub fn pack_menu_file(
    definition: &MenuDefinition,
    files_root: &Path,
    ir_dir: &Path,
    output_root: &Path,
    codec: &CodecTable,
    mask: &InsertionMask,
) -> Result<RepackOutput> {
    let source = files_root.join(&definition.file_path);
    let destination = output_root.join(&definition.file_path);

    let run = || -> Result<RepackOutput> {
        let document = read_ir(ir_dir.join(definition.ir_file_name()))?;
        let output = pack_menu(&fs::read(&source)?, definition, &document, codec, mask)?;
        write_atomic(&destination, &output.bytes)?;
        tracing::info!(
            "{}: packed {} bytes, {} warnings",
            definition.friendly_name,
            output.bytes.len(),
            output.warnings.len()
        );
        Ok(output)
    };
    run().map_err(|e| e.in_file(&source))
}
