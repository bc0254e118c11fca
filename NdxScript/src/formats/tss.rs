//! TSS script containers
//!
//! A TSS file is bytecode followed by a strings section. The section start is
//! stored at `0x0C`; text pointers in the bytecode are `u16` offsets relative
//! to it. Records are located with a [`SignatureTable`] and rebuilt with the
//! growable-tail strategy.

use std::fs;
use std::path::Path;

use crate::codec::CodecTable;
use crate::cursor::ByteCursor;
use crate::error::{Error, Result};
use crate::ir::{
    ExportOptions, IrDocument, MergeOptions, merge_with_report, read_ir, to_ir, write_ir,
};
use crate::repack::{InsertionMask, RepackOutput, repack_script, write_atomic};
use crate::scanner::{PointerEncoding, SignatureTable, scan};
use crate::script::{ScriptGraph, build};

/// File magic. The fourth byte is not checked.
pub const TSS_MAGIC: &[u8; 3] = b"TSS";

/// Offset of the `u32` holding the strings section start.
const STRINGS_OFFSET_FIELD: usize = 0x0C;

/// Tables and knobs shared by every TSS file of a project.
#[derive(Debug, Clone)]
pub struct TssContext {
    pub codec: CodecTable,
    pub signatures: SignatureTable,
    pub export: ExportOptions,
    pub merge: MergeOptions,
}

impl Default for TssContext {
    fn default() -> Self {
        Self::new(CodecTable::default())
    }
}

impl TssContext {
    /// Context with the default record signatures.
    pub fn new(codec: CodecTable) -> Self {
        Self {
            codec,
            signatures: SignatureTable::tss(),
            export: ExportOptions::default(),
            merge: MergeOptions::default(),
        }
    }

    #[must_use]
    pub fn with_signatures(mut self, signatures: SignatureTable) -> Self {
        self.signatures = signatures;
        self
    }

    #[must_use]
    pub fn with_export(mut self, export: ExportOptions) -> Self {
        self.export = export;
        self
    }

    #[must_use]
    pub fn with_merge(mut self, merge: MergeOptions) -> Self {
        self.merge = merge;
        self
    }
}

/// A parsed TSS file.
#[derive(Debug)]
pub struct TssScript<'a> {
    context: &'a TssContext,
    bytes: Vec<u8>,
    strings_offset: usize,
    graph: ScriptGraph,
}

impl<'a> TssScript<'a> {
    /// Scan `bytes` and build its script graph.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidTssMagic`] for non-TSS input, and scanner or
    /// graph errors for malformed records.
    pub fn parse(bytes: Vec<u8>, context: &'a TssContext) -> Result<Self> {
        if !bytes.starts_with(TSS_MAGIC) {
            let mut magic = [0u8; 4];
            let available = bytes.len().min(4);
            magic[..available].copy_from_slice(&bytes[..available]);
            return Err(Error::InvalidTssMagic(magic));
        }

        let cursor = ByteCursor::new(bytes);
        let strings_offset = cursor.read_u32_at(STRINGS_OFFSET_FIELD)? as usize;
        let bytes = cursor.into_inner();
        let encoding = PointerEncoding::RelativeU16 {
            base: strings_offset,
        };

        let matches = scan(&bytes, &context.signatures, encoding)?;
        let graph = build(&bytes, &matches, &context.codec, encoding)?;

        Ok(Self {
            context,
            bytes,
            strings_offset,
            graph,
        })
    }

    #[must_use]
    pub fn strings_offset(&self) -> usize {
        self.strings_offset
    }

    #[must_use]
    pub fn graph(&self) -> &ScriptGraph {
        &self.graph
    }

    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Snapshot the script's text.
    pub fn extract(&self, options: &ExportOptions) -> IrDocument {
        to_ir(&self.graph, options)
    }

    /// Rebuild the file with the text of `document`.
    ///
    /// # Errors
    ///
    /// See [`repack_script`].
    pub fn pack(&mut self, document: &IrDocument, mask: &InsertionMask) -> Result<RepackOutput> {
        repack_script(
            &self.bytes,
            &mut self.graph,
            document,
            &self.context.codec,
            mask,
            PointerEncoding::RelativeU16 {
                base: self.strings_offset,
            },
        )
    }
}

/// Extract `source` into an IR file at `destination`.
///
/// With `keep_translations`, an IR already at `destination` is merged into
/// the fresh extraction first.
///
/// # Errors
///
/// Returns [`Error::File`] naming `source` for any failure.
pub fn extract_tss_file<P: AsRef<Path>, Q: AsRef<Path>>(
    source: P,
    destination: Q,
    context: &TssContext,
    keep_translations: bool,
) -> Result<IrDocument> {
    let source = source.as_ref();
    let destination = destination.as_ref();
    extract_inner(source, destination, context, keep_translations)
        .map_err(|e| e.in_file(source))
}

fn extract_inner(
    source: &Path,
    destination: &Path,
    context: &TssContext,
    keep_translations: bool,
) -> Result<IrDocument> {
    let script = TssScript::parse(fs::read(source)?, context)?;
    let mut document = script.extract(&context.export);

    if keep_translations && destination.exists() {
        let previous = read_ir(destination)?;
        let (merged, report) = merge_with_report(&document, &previous, &context.merge);
        tracing::info!(
            "Kept {} translations for {} ({} stale)",
            report.carried,
            source.display(),
            report.stale
        );
        document = merged;
    }

    write_ir(destination, &document)?;
    tracing::debug!(
        "Extracted {} entries from {}",
        document.entry_count(),
        source.display()
    );
    Ok(document)
}

/// Rebuild `source` with the IR at `ir_path`, writing to `destination`.
///
/// The destination is only replaced once the whole file has been rebuilt.
///
/// # Errors
///
/// Returns [`Error::File`] naming `source` for any failure.
pub fn pack_tss_file<P: AsRef<Path>, Q: AsRef<Path>, R: AsRef<Path>>(
    source: P,
    ir_path: Q,
    destination: R,
    context: &TssContext,
    mask: &InsertionMask,
) -> Result<RepackOutput> {
    let source = source.as_ref();
    pack_inner(source, ir_path.as_ref(), destination.as_ref(), context, mask)
        .map_err(|e| e.in_file(source))
}

fn pack_inner(
    source: &Path,
    ir_path: &Path,
    destination: &Path,
    context: &TssContext,
    mask: &InsertionMask,
) -> Result<RepackOutput> {
    let document = read_ir(ir_path)?;
    let mut script = TssScript::parse(fs::read(source)?, context)?;
    let output = script.pack(&document, mask)?;
    write_atomic(destination, &output.bytes)?;

    tracing::info!(
        "Packed {} -> {} ({} bytes)",
        source.display(),
        destination.display(),
        output.bytes.len()
    );
    Ok(output)
}
