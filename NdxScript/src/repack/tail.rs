//! Growable-tail repack
//!
//! The strings region is rebuilt from a start offset onwards: speakers
//! first, then record texts, each terminated. Pointers into the region are
//! re-patched through the container's [`PointerEncoding`].

use std::collections::{BTreeSet, HashMap};

use super::{InsertionMask, RepackOutput};
use crate::codec::{BUBBLE_TAG, CodecTable, TERMINATOR};
use crate::cursor::ByteCursor;
use crate::error::{Error, Result};
use crate::ir::{IrDocument, TranslationEntry};
use crate::scanner::PointerEncoding;
use crate::script::ScriptGraph;

/// Output buffer for the tail strategy.
#[derive(Debug)]
pub struct TailWriter {
    cursor: ByteCursor,
    encoding: PointerEncoding,
}

impl TailWriter {
    /// Keep `original[..start]` and write new strings after it.
    pub fn new(original: &[u8], start: usize, encoding: PointerEncoding) -> Result<Self> {
        if start > original.len() {
            return Err(Error::OutOfBounds {
                offset: start,
                size: 0,
                len: original.len(),
            });
        }
        let mut cursor = ByteCursor::from_slice(original);
        cursor.truncate(start);
        Ok(Self { cursor, encoding })
    }

    /// Append `bytes` plus a terminator. Returns where they landed.
    pub fn place(&mut self, bytes: &[u8]) -> usize {
        let offset = self.cursor.append(bytes);
        self.cursor.append(&[TERMINATOR]);
        offset
    }

    /// Point the field at `patch_offset` to `target`.
    pub fn patch(&mut self, patch_offset: usize, target: usize) -> Result<()> {
        self.encoding.write(&mut self.cursor, patch_offset, target)
    }

    pub fn len(&self) -> usize {
        self.cursor.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cursor.is_empty()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.cursor.into_inner()
    }
}

/// Where the rewritten strings region starts.
///
/// The lowest text offset holds the empty-string sentinel and stays in
/// place, so the region starts at the second-lowest distinct text offset or
/// the first speaker name, whichever comes first.
pub fn strings_start(graph: &ScriptGraph) -> Option<usize> {
    let texts: BTreeSet<usize> = graph.nodes.iter().map(|n| n.text_offset).collect();
    let text_start = texts.iter().nth(1).or_else(|| texts.iter().next()).copied();
    let speaker_start = graph.speakers.iter().map(|s| s.source_offset).min();

    match (speaker_start, text_start) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    }
}

/// Rebuild a script's strings region from `document`.
///
/// Speakers are written in ascending source offset, record texts in
/// ascending source offset then pointer offset. Speakers and records with
/// nothing to insert, including excluded categories, are written from their
/// source bytes.
/// Records sharing a source text that still encode identically share one
/// copy. Text left before the start offset is kept in place when unchanged.
///
/// Updates [`Speaker::written_offset`](crate::script::Speaker::written_offset).
///
/// # Errors
///
/// Returns [`Error::Entry`] wrapping [`Error::UnknownToken`] or
/// [`Error::PointerOverflow`] for the entry that could not be written.
pub fn repack_script(
    original: &[u8],
    graph: &mut ScriptGraph,
    document: &IrDocument,
    codec: &CodecTable,
    mask: &InsertionMask,
    encoding: PointerEncoding,
) -> Result<RepackOutput> {
    let Some(start) = strings_start(graph) else {
        return Ok(RepackOutput::new(original.to_vec()));
    };
    let mut writer = TailWriter::new(original, start, encoding)?;

    // Speakers
    let speaker_entries: HashMap<u32, &TranslationEntry> = document
        .speakers()
        .map(|s| s.entries.iter().map(|e| (e.id, e)).collect())
        .unwrap_or_default();

    let mut order: Vec<usize> = (0..graph.speakers.len()).collect();
    order.sort_by_key(|&i| graph.speakers[i].source_offset);
    for index in order {
        let speaker = &mut graph.speakers[index];
        let bytes = match speaker_entries.get(&speaker.id) {
            Some(entry) if mask.inserts(entry) => codec
                .encode(mask.select(entry))
                .map_err(|e| e.in_entry(crate::ir::SPEAKER_SECTION, speaker.id))?,
            _ => source_bytes(original, speaker.source_offset, codec)
                .map_err(|e| e.in_entry(crate::ir::SPEAKER_SECTION, speaker.id))?
                .to_vec(),
        };
        speaker.written_offset = Some(writer.place(&bytes));
    }

    // Record texts
    let mut by_pointer: HashMap<usize, Vec<&TranslationEntry>> = HashMap::new();
    for (_, entry) in document.string_entries() {
        if let Some(&offset) = entry.pointer_offsets.first() {
            by_pointer.entry(offset).or_default().push(entry);
        }
    }
    for offset in by_pointer.keys() {
        if graph.node_at(*offset).is_none() {
            tracing::warn!("IR references unknown pointer offset {offset:#x}, ignored");
        }
    }

    let mut order: Vec<usize> = (0..graph.nodes.len()).collect();
    order.sort_by_key(|&i| (graph.nodes[i].text_offset, graph.nodes[i].pointer_offset));

    let mut written: HashMap<(usize, Vec<u8>), usize> = HashMap::new();
    let mut relocated = 0usize;
    for index in order {
        let node = &graph.nodes[index];
        let section = node.category.section_name();

        let bytes = match by_pointer.get_mut(&node.pointer_offset) {
            Some(entries) if entries.iter().any(|e| mask.inserts(e)) => {
                entries.sort_by_key(|e| e.bubble_id.unwrap_or(0));
                let text = entries
                    .iter()
                    .map(|e| mask.text_for(e))
                    .collect::<Vec<_>>()
                    .join(&format!("<{BUBBLE_TAG}>"));
                codec
                    .encode(&text)
                    .map_err(|e| e.in_entry(section, node.id))?
            }
            _ => node.raw.clone(),
        };

        let unchanged_before_start = node.text_offset < start && bytes == node.raw;
        if !unchanged_before_start {
            let key = (node.text_offset, bytes);
            let target = match written.get(&key) {
                Some(&target) => target,
                None => {
                    let target = writer.place(&key.1);
                    written.insert(key, target);
                    relocated += 1;
                    target
                }
            };
            writer
                .patch(node.pointer_offset, target)
                .map_err(|e| e.in_entry(section, node.id))?;
        }

        if let (Some(speaker), Some(field)) = (node.speaker, node.speaker_pointer_offset) {
            if let Some(target) = graph.speakers.get(speaker).and_then(|s| s.written_offset) {
                writer
                    .patch(field, target)
                    .map_err(|e| e.in_entry(section, node.id))?;
            }
        }
    }

    tracing::debug!(
        "Tail repack: strings from {start:#x}, {} speakers, {relocated} texts, {} -> {} bytes",
        graph.speakers.len(),
        original.len(),
        writer.len()
    );
    Ok(RepackOutput::new(writer.into_bytes()))
}

/// Source bytes of the string at `offset`, terminator excluded.
pub(crate) fn source_bytes<'a>(original: &'a [u8], offset: usize, codec: &CodecTable) -> Result<&'a [u8]> {
    let (_, consumed) = codec.decode_text(original, offset)?;
    Ok(&original[offset..offset + consumed - 1])
}
