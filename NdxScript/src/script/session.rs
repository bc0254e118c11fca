//! Per-file graph construction

use std::collections::BTreeSet;

use super::{Bubble, ScriptGraph, SpeakerTable, StructNode, split_voice};
use crate::codec::CodecTable;
use crate::error::{Error, Result};
use crate::scanner::{PointerEncoding, ScanMatch};

/// State for extracting one file: the speaker table and id counters.
///
/// A session is consumed by [`ExtractionSession::build`], so ids never leak
/// from one file into the next.
#[derive(Debug)]
pub struct ExtractionSession<'a> {
    codec: &'a CodecTable,
    encoding: PointerEncoding,
    speakers: SpeakerTable,
    next_node_id: u32,
    seen: BTreeSet<usize>,
}

impl<'a> ExtractionSession<'a> {
    pub fn new(codec: &'a CodecTable, encoding: PointerEncoding) -> Self {
        Self {
            codec,
            encoding,
            speakers: SpeakerTable::new(),
            next_node_id: 1,
            seen: BTreeSet::new(),
        }
    }

    /// Resolve every match into the graph.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DuplicateRecord`] when two matches share a pointer
    /// offset, [`Error::MalformedPointer`] for an unreadable speaker pointer,
    /// and [`Error::OutOfBounds`] for unterminated text.
    pub fn build(mut self, buffer: &[u8], matches: &[ScanMatch]) -> Result<ScriptGraph> {
        let mut nodes = Vec::with_capacity(matches.len());
        for scan_match in matches {
            nodes.push(self.add_node(buffer, scan_match)?);
        }

        let graph = ScriptGraph {
            speakers: self.speakers.into_speakers(),
            nodes,
        };
        tracing::debug!(
            "Built script graph: {} nodes, {} speakers",
            graph.nodes.len(),
            graph.speakers.len()
        );
        Ok(graph)
    }

    fn add_node(&mut self, buffer: &[u8], scan_match: &ScanMatch) -> Result<StructNode> {
        let pointer_offset = scan_match.pointer.patch_offset;
        if !self.seen.insert(pointer_offset) {
            return Err(Error::DuplicateRecord { pointer_offset });
        }

        let (speaker, speaker_pointer_offset) = if scan_match.category.has_speaker() {
            let field = pointer_offset + self.encoding.field_size();
            let name_offset = self.encoding.read(buffer, field)?;
            let (name, _) = self.codec.decode_text(buffer, name_offset)?;
            let speaker = if name.is_empty() {
                None
            } else {
                Some(self.speakers.add(&name, name_offset))
            };
            (speaker, Some(field))
        } else {
            (None, None)
        };

        let text_offset = scan_match.pointer.target_offset;
        let decoded = self.codec.decode(buffer, text_offset)?;
        let raw = buffer[text_offset..text_offset + decoded.consumed - 1].to_vec();

        let bubbles = decoded
            .bubbles()
            .into_iter()
            .zip(0u32..)
            .map(|(text, id)| {
                let (voice_id, rest) = split_voice(&text);
                Bubble {
                    id,
                    text: rest.to_string(),
                    voice_id,
                }
            })
            .collect();

        let id = self.next_node_id;
        self.next_node_id += 1;

        Ok(StructNode {
            id,
            category: scan_match.category,
            pointer_offset,
            text_offset,
            raw,
            speaker,
            speaker_pointer_offset,
            bubbles,
        })
    }
}

/// Build the graph of one file in a fresh session.
///
/// # Errors
///
/// See [`ExtractionSession::build`].
pub fn build(
    buffer: &[u8],
    matches: &[ScanMatch],
    codec: &CodecTable,
    encoding: PointerEncoding,
) -> Result<ScriptGraph> {
    ExtractionSession::new(codec, encoding).build(buffer, matches)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanner::{Category, RawPointer};

    fn scan_match(category: Category, patch_offset: usize, target_offset: usize) -> ScanMatch {
        ScanMatch {
            category,
            pointer: RawPointer {
                patch_offset,
                target_offset,
            },
        }
    }

    /// Three u16 record slots (text + speaker), strings from 0x10.
    fn fixture() -> Vec<u8> {
        let mut buffer = vec![0u8; 0x10];
        buffer[0..4].copy_from_slice(&[0x11, 0x00, 0x1B, 0x00]);
        buffer[4..8].copy_from_slice(&[0x20, 0x00, 0x1B, 0x00]);
        buffer[8..12].copy_from_slice(&[0x10, 0x00, 0x10, 0x00]);
        // 0x10: sentinel, 0x11: "<S1>Hi<Bubble>Yo", 0x1B: "Reid", 0x20: "Ok"
        buffer.push(0);
        buffer.extend_from_slice(&[0x01, 0x12, 0x01, b'1', b'H', b'i', 0x0C, b'Y', b'o', 0]);
        buffer.extend_from_slice(b"Reid\0Ok\0");
        buffer
    }

    fn codec() -> CodecTable {
        CodecTable::ascii().with_param(0x12, "S")
    }

    #[test]
    fn test_build_graph() {
        let buffer = fixture();
        let codec = codec();
        let encoding = PointerEncoding::RelativeU16 { base: 0 };
        let matches = vec![
            scan_match(Category::Story, 0, 0x11),
            scan_match(Category::Npc, 4, 0x20),
            scan_match(Category::Story, 8, 0x10),
        ];

        let graph = build(&buffer, &matches, &codec, encoding).unwrap();
        assert_eq!(graph.nodes.len(), 3);
        assert_eq!(graph.speakers.len(), 1);
        assert_eq!(graph.speakers[0].name, "Reid");
        assert_eq!(graph.speakers[0].source_offset, 0x1B);

        let first = &graph.nodes[0];
        assert_eq!(first.id, 1);
        assert_eq!(first.speaker, Some(0));
        assert_eq!(first.speaker_pointer_offset, Some(2));
        assert_eq!(first.raw.len(), 9);
        assert_eq!(first.bubbles.len(), 2);
        assert_eq!(first.bubbles[0].voice_id.as_deref(), Some("S1"));
        assert_eq!(first.bubbles[0].text, "Hi");
        assert_eq!(first.bubbles[1].id, 1);
        assert_eq!(first.bubbles[1].text, "Yo");

        // Same speaker again reuses index 0
        assert_eq!(graph.nodes[1].speaker, Some(0));

        // Speaker pointer on the empty sentinel means no speaker
        let third = &graph.nodes[2];
        assert_eq!(third.speaker, None);
        assert_eq!(third.bubbles.len(), 1);
        assert_eq!(third.bubbles[0].text, "");
    }

    #[test]
    fn test_duplicate_pointer_offset() {
        let buffer = fixture();
        let codec = codec();
        let matches = vec![
            scan_match(Category::Misc, 4, 0x20),
            scan_match(Category::Misc, 4, 0x20),
        ];
        let err = build(&buffer, &matches, &codec, PointerEncoding::RelativeU16 { base: 0 })
            .unwrap_err();
        assert!(matches!(err, Error::DuplicateRecord { pointer_offset: 4 }));
    }

    #[test]
    fn test_misc_has_no_speaker_field() {
        let buffer = fixture();
        let codec = codec();
        let matches = vec![scan_match(Category::Misc, 4, 0x20)];
        let graph =
            build(&buffer, &matches, &codec, PointerEncoding::RelativeU16 { base: 0 }).unwrap();
        assert!(graph.speakers.is_empty());
        assert_eq!(graph.nodes[0].speaker_pointer_offset, None);
        assert_eq!(graph.nodes[0].bubbles[0].text, "Ok");
    }
}
