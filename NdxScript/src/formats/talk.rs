//! SPDX-License-Identifier: MIT
//!
//! Battle talk tables
//!
//! A `u32` record count, then one 16-byte record per line:
//!
//! | Offset | Field                   |
//! |--------|-------------------------|
//! | 0x0    | unknown, kept as is     |
//! | 0x4    | voice id pointer        |
//! | 0x8    | speaker name pointer    |
//! | 0xC    | text pointer            |
//!
//! Pointers are absolute file offsets. The strings after the table are
//! rebuilt with the growable-tail strategy.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use crate::codec::CodecTable;
use crate::cursor::ByteCursor;
use crate::error::{Error, Result};
use crate::ir::{
    DocumentKind, IrDocument, IrSection, SPEAKER_SECTION, SectionKind, TranslationEntry,
    read_ir, write_ir,
};
use crate::repack::{InsertionMask, RepackOutput, TailWriter, source_bytes, write_atomic};
use crate::scanner::PointerEncoding;
use crate::script::{Speaker, SpeakerTable};

/// Size of one record.
pub const RECORD_SIZE: usize = 16;

/// IR section name of the lines.
pub const TEXT_SECTION: &str = "Text";

const RECORDS_START: usize = 4;
const VOICE_FIELD: usize = 0x4;
const SPEAKER_FIELD: usize = 0x8;
const TEXT_FIELD: usize = 0xC;
const ENCODING: PointerEncoding = PointerEncoding::AbsoluteU32 { base: 0 };

/// One line of a talk table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TalkRecord {
    /// 1-based, in table order.
    pub id: u32,
    /// Offset of the record itself.
    pub offset: usize,
    pub voice_offset: usize,
    /// Voice id bytes, terminator excluded.
    pub voice_raw: Vec<u8>,
    pub voice_id: String,
    /// Index into [`TalkTable::speakers`].
    pub speaker: usize,
    pub speaker_offset: usize,
    pub text_offset: usize,
    /// Text bytes, terminator excluded.
    pub text_raw: Vec<u8>,
    pub text: String,
}

/// A parsed talk table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TalkTable {
    bytes: Vec<u8>,
    pub speakers: Vec<Speaker>,
    pub records: Vec<TalkRecord>,
}

impl TalkTable {
    /// Parse a talk table.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidTalkTable`] if the record count does not fit
    /// the buffer and [`Error::MalformedPointer`] for pointers outside it.
    pub fn parse(bytes: Vec<u8>, codec: &CodecTable) -> Result<Self> {
        let cursor = ByteCursor::new(bytes);
        if cursor.len() < RECORDS_START {
            return Err(Error::InvalidTalkTable(format!(
                "{} bytes is too short for a header",
                cursor.len()
            )));
        }
        let count = cursor.read_u32_at(0)? as usize;
        let table_end = count
            .checked_mul(RECORD_SIZE)
            .and_then(|size| size.checked_add(RECORDS_START))
            .filter(|&end| end <= cursor.len())
            .ok_or_else(|| {
                Error::InvalidTalkTable(format!(
                    "{count} records do not fit in {} bytes",
                    cursor.len()
                ))
            })?;
        let bytes = cursor.into_inner();

        let mut speakers = SpeakerTable::new();
        let mut records = Vec::with_capacity(count);
        for (offset, id) in (RECORDS_START..table_end).step_by(RECORD_SIZE).zip(1u32..) {
            let voice_offset = ENCODING.read(&bytes, offset + VOICE_FIELD)?;
            let speaker_offset = ENCODING.read(&bytes, offset + SPEAKER_FIELD)?;
            let text_offset = ENCODING.read(&bytes, offset + TEXT_FIELD)?;

            let (voice_id, voice_len) = codec.decode_text(&bytes, voice_offset)?;
            let (speaker, _) = codec.decode_text(&bytes, speaker_offset)?;
            let (text, text_len) = codec.decode_text(&bytes, text_offset)?;

            records.push(TalkRecord {
                id,
                offset,
                voice_offset,
                voice_raw: bytes[voice_offset..voice_offset + voice_len - 1].to_vec(),
                voice_id,
                speaker: speakers.add(&speaker, speaker_offset),
                speaker_offset,
                text_offset,
                text_raw: bytes[text_offset..text_offset + text_len - 1].to_vec(),
                text,
            });
        }

        tracing::debug!(
            "Talk table: {} records, {} speakers",
            records.len(),
            speakers.len()
        );
        Ok(Self {
            bytes,
            speakers: speakers.into_speakers(),
            records,
        })
    }

    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// End of the record table.
    #[must_use]
    pub fn table_end(&self) -> usize {
        RECORDS_START + self.records.len() * RECORD_SIZE
    }

    /// Snapshot the table's text.
    ///
    /// Every line carries its speaker id, including lines with an empty
    /// speaker name.
    pub fn extract(&self) -> IrDocument {
        let mut document = IrDocument::new(DocumentKind::SceneText);

        let mut speakers = IrSection::new(SectionKind::Speakers, SPEAKER_SECTION);
        speakers.entries = self
            .speakers
            .iter()
            .map(|s| TranslationEntry::new(s.id, s.name.clone()))
            .collect();
        document.sections.push(speakers);

        let mut lines = IrSection::new(SectionKind::Strings, TEXT_SECTION);
        lines.entries = self
            .records
            .iter()
            .map(|record| TranslationEntry {
                pointer_offsets: vec![record.offset],
                voice_id: Some(record.voice_id.clone()).filter(|v| !v.is_empty()),
                speaker_id: self.speakers.get(record.speaker).map(|s| s.id),
                ..TranslationEntry::new(record.id, record.text.clone())
            })
            .collect();
        document.sections.push(lines);

        document
    }

    /// Rebuild the strings after the table with the text of `document`.
    ///
    /// Strings are written in ascending source offset. Voice ids are copied
    /// from the source, as are speakers and lines with nothing to insert.
    /// Fields pointing at the same source offset keep sharing one copy while
    /// they still encode identically.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidTalkTable`] if a string lies inside the
    /// record table, and [`Error::Entry`] for entries that fail to encode.
    pub fn pack(
        &mut self,
        document: &IrDocument,
        codec: &CodecTable,
        mask: &InsertionMask,
    ) -> Result<RepackOutput> {
        let Some(start) = self.strings_start() else {
            return Ok(RepackOutput::new(self.bytes.clone()));
        };
        if start < self.table_end() {
            return Err(Error::InvalidTalkTable(format!(
                "string at {start:#x} overlaps the record table"
            )));
        }
        let mut writer = TailWriter::new(&self.bytes, start, ENCODING)?;
        for speaker in &mut self.speakers {
            speaker.written_offset = None;
        }

        let speaker_entries: HashMap<u32, &TranslationEntry> = document
            .speakers()
            .map(|s| s.entries.iter().map(|e| (e.id, e)).collect())
            .unwrap_or_default();
        let line_entries: HashMap<usize, &TranslationEntry> = document
            .string_entries()
            .filter_map(|(_, e)| e.pointer_offsets.first().map(|&offset| (offset, e)))
            .collect();

        let mut fields: Vec<(usize, usize, usize)> = self
            .records
            .iter()
            .enumerate()
            .flat_map(|(index, r)| {
                [
                    (r.voice_offset, index, VOICE_FIELD),
                    (r.speaker_offset, index, SPEAKER_FIELD),
                    (r.text_offset, index, TEXT_FIELD),
                ]
            })
            .collect();
        fields.sort_by_key(|&(offset, index, _)| (offset, index));

        let mut written: HashMap<(usize, Vec<u8>), usize> = HashMap::new();
        for (offset, index, field) in fields {
            let record = &self.records[index];
            let bytes = match field {
                VOICE_FIELD => record.voice_raw.clone(),
                SPEAKER_FIELD => {
                    let id = self.speakers.get(record.speaker).map_or(0, |s| s.id);
                    match speaker_entries.get(&id) {
                        Some(entry) if mask.inserts(entry) => codec
                            .encode(mask.select(entry))
                            .map_err(|e| e.in_entry(SPEAKER_SECTION, id))?,
                        _ => source_bytes(&self.bytes, offset, codec)
                            .map_err(|e| e.in_entry(SPEAKER_SECTION, id))?
                            .to_vec(),
                    }
                }
                _ => match line_entries.get(&record.offset) {
                    Some(entry) if mask.inserts(entry) => codec
                        .encode(mask.select(entry))
                        .map_err(|e| e.in_entry(TEXT_SECTION, record.id))?,
                    _ => record.text_raw.clone(),
                },
            };

            let target = *written
                .entry((offset, bytes))
                .or_insert_with_key(|(_, bytes)| writer.place(bytes));
            writer
                .patch(record.offset + field, target)
                .map_err(|e| e.in_entry(TEXT_SECTION, record.id))?;

            if field == SPEAKER_FIELD {
                if let Some(speaker) = self.speakers.get_mut(record.speaker) {
                    speaker.written_offset.get_or_insert(target);
                }
            }
        }

        tracing::debug!(
            "Talk repack: strings from {start:#x}, {} -> {} bytes",
            self.bytes.len(),
            writer.len()
        );
        Ok(RepackOutput::new(writer.into_bytes()))
    }

    fn strings_start(&self) -> Option<usize> {
        self.records
            .iter()
            .flat_map(|r| [r.voice_offset, r.speaker_offset, r.text_offset])
            .min()
    }
}

/// Extract the talk table at `source` into an IR file at `destination`.
///
/// # Errors
///
/// Returns [`Error::File`] naming `source` for any failure.
pub fn extract_talk_file<P: AsRef<Path>, Q: AsRef<Path>>(
    source: P,
    destination: Q,
    codec: &CodecTable,
) -> Result<IrDocument> {
    let source = source.as_ref();
    let run = || -> Result<IrDocument> {
        let table = TalkTable::parse(fs::read(source)?, codec)?;
        let document = table.extract();
        write_ir(destination.as_ref(), &document)?;
        Ok(document)
    };
    run().map_err(|e| e.in_file(source))
}

/// Rebuild the talk table at `source` with the IR at `ir_path`.
///
/// # Errors
///
/// Returns [`Error::File`] naming `source` for any failure.
pub fn pack_talk_file<P: AsRef<Path>, Q: AsRef<Path>, R: AsRef<Path>>(
    source: P,
    ir_path: Q,
    destination: R,
    codec: &CodecTable,
    mask: &InsertionMask,
) -> Result<RepackOutput> {
    let source = source.as_ref();
    let run = || -> Result<RepackOutput> {
        let document = read_ir(ir_path.as_ref())?;
        let mut table = TalkTable::parse(fs::read(source)?, codec)?;
        let output = table.pack(&document, codec, mask)?;
        write_atomic(destination.as_ref(), &output.bytes)?;
        Ok(output)
    };
    run().map_err(|e| e.in_file(source))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::Status;
    use pretty_assertions::assert_eq;

    fn record(voice: u32, speaker: u32, text: u32) -> [u8; RECORD_SIZE] {
        let mut out = [0u8; RECORD_SIZE];
        out[0..4].copy_from_slice(&7u32.to_le_bytes());
        out[4..8].copy_from_slice(&voice.to_le_bytes());
        out[8..12].copy_from_slice(&speaker.to_le_bytes());
        out[12..16].copy_from_slice(&text.to_le_bytes());
        out
    }

    /// Two records, strings laid out voices, speakers, texts.
    ///
    /// 0x24 "V01", 0x28 "V02", 0x2C "Reid", 0x31 "Hi", 0x34 "Yo"
    fn talk_bytes() -> Vec<u8> {
        let mut bytes = 2u32.to_le_bytes().to_vec();
        bytes.extend_from_slice(&record(0x24, 0x2C, 0x31));
        bytes.extend_from_slice(&record(0x28, 0x2C, 0x34));
        bytes.extend_from_slice(b"V01\0V02\0Reid\0Hi\0Yo\0");
        bytes
    }

    #[test]
    fn test_rejects_short_table() {
        let mut bytes = talk_bytes();
        bytes[0] = 9;
        let err = TalkTable::parse(bytes, &CodecTable::ascii()).unwrap_err();
        assert!(matches!(err, Error::InvalidTalkTable(_)));
    }

    #[test]
    fn test_extract() {
        let table = TalkTable::parse(talk_bytes(), &CodecTable::ascii()).unwrap();
        let document = table.extract();

        let speakers = document.speakers().unwrap();
        assert_eq!(speakers.entries.len(), 1);
        assert_eq!(speakers.entries[0].source, "Reid");

        let lines: Vec<_> = document.string_entries().collect();
        assert_eq!(lines[0].0, TEXT_SECTION);
        assert_eq!(lines[0].1.pointer_offsets, vec![4]);
        assert_eq!(lines[0].1.voice_id.as_deref(), Some("V01"));
        assert_eq!(lines[1].1.source, "Yo");
        assert_eq!(lines[1].1.speaker_id, Some(1));
        assert_eq!(lines[1].1.id, 2);
    }

    #[test]
    fn test_pack_untranslated_is_identity() {
        let codec = CodecTable::ascii();
        let mut table = TalkTable::parse(talk_bytes(), &codec).unwrap();
        let document = table.extract();
        let output = table.pack(&document, &codec, &InsertionMask::new()).unwrap();
        assert_eq!(output.bytes, talk_bytes());
    }

    /// Strings interleaved per record, with the speaker and line repeated.
    ///
    /// 0x24 "V1", 0x27 "Reid", 0x2C "Hi", 0x2F "V2", 0x32 "Hi"
    fn interleaved_bytes() -> Vec<u8> {
        let mut bytes = 2u32.to_le_bytes().to_vec();
        bytes.extend_from_slice(&record(0x24, 0x27, 0x2C));
        bytes.extend_from_slice(&record(0x2F, 0x27, 0x32));
        bytes.extend_from_slice(b"V1\0Reid\0Hi\0V2\0Hi\0");
        bytes
    }

    #[test]
    fn test_pack_untranslated_keeps_interleaved_layout() {
        let codec = CodecTable::ascii();
        let mut table = TalkTable::parse(interleaved_bytes(), &codec).unwrap();
        let document = table.extract();
        let output = table.pack(&document, &codec, &InsertionMask::new()).unwrap();
        assert_eq!(output.bytes, interleaved_bytes());
        assert_eq!(table.speakers[0].written_offset, Some(0x27));
    }

    #[test]
    fn test_pack_translation_keeps_source_order() {
        let codec = CodecTable::ascii();
        let mut table = TalkTable::parse(interleaved_bytes(), &codec).unwrap();
        let mut document = table.extract();
        let line = &mut document.sections[1].entries[0];
        line.target = Some("Hey".to_string());
        line.status = Status::Done;

        let output = table.pack(&document, &codec, &InsertionMask::new()).unwrap();
        let mut expected = interleaved_bytes()[..0x24].to_vec();
        expected[0x18..0x1C].copy_from_slice(&0x30u32.to_le_bytes());
        expected[0x20..0x24].copy_from_slice(&0x33u32.to_le_bytes());
        expected.extend_from_slice(b"V1\0Reid\0Hey\0V2\0Hi\0");
        assert_eq!(output.bytes, expected);
    }

    #[test]
    fn test_pack_translation() {
        let codec = CodecTable::ascii();
        let mut table = TalkTable::parse(talk_bytes(), &codec).unwrap();
        let mut document = table.extract();
        let line = &mut document.sections[1].entries[0];
        line.target = Some("Hello".to_string());
        line.status = Status::Done;

        let output = table.pack(&document, &codec, &InsertionMask::new()).unwrap();
        let repacked = TalkTable::parse(output.bytes, &codec).unwrap();
        let texts: Vec<_> = repacked.records.iter().map(|r| r.text.as_str()).collect();
        assert_eq!(texts, vec!["Hello", "Yo"]);
        assert_eq!(repacked.records[1].voice_id, "V02");
        assert_eq!(repacked.records[1].text_offset, 0x37);
    }

    #[test]
    fn test_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("BTL_TALK.bin");
        let ir_path = dir.path().join("BTL_TALK.xml");
        let packed = dir.path().join("out").join("BTL_TALK.bin");
        fs::write(&source, talk_bytes()).unwrap();
        let codec = CodecTable::ascii();

        extract_talk_file(&source, &ir_path, &codec).unwrap();
        pack_talk_file(&source, &ir_path, &packed, &codec, &InsertionMask::new()).unwrap();
        assert_eq!(fs::read(&packed).unwrap(), talk_bytes());
    }
}
