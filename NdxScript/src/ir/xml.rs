//! SPDX-License-Identifier: MIT
//!
//! IR ⇄ XML conversion
//!
//! ```xml
//! <SceneText>
//!   <Speakers>
//!     <Section>Speaker</Section>
//!     <Entry>
//!       <PointerOffset/>
//!       <JapaneseText>リッド</JapaneseText>
//!       <EnglishText>Reid</EnglishText>
//!       <Notes/>
//!       <Id>1</Id>
//!       <Status>Done</Status>
//!     </Entry>
//!   </Speakers>
//!   <Strings>
//!     <Section>Story</Section>
//!     <Entry>...</Entry>
//!   </Strings>
//! </SceneText>
//! ```

use std::borrow::Cow;
use std::io::Write;
use std::path::Path;

use quick_xml::Reader;
use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};

use super::{
    DocumentKind, EmbedOffsets, IrDocument, IrSection, SectionKind, Status, TranslationEntry,
};
use crate::error::{Error, Result};

/// Escape only the characters required in XML text content.
fn escape_text_minimal(s: &str) -> Cow<'_, str> {
    if s.contains('&') || s.contains('<') {
        Cow::Owned(s.replace('&', "&amp;").replace('<', "&lt;"))
    } else {
        Cow::Borrowed(s)
    }
}

fn join_offsets(offsets: &[usize]) -> String {
    offsets
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

fn write_field<W: Write>(writer: &mut Writer<W>, name: &str, value: Option<&str>) -> Result<()> {
    match value {
        Some(text) if !text.is_empty() => {
            writer.write_event(Event::Start(BytesStart::new(name)))?;
            let escaped = escape_text_minimal(text);
            writer.write_event(Event::Text(BytesText::from_escaped(escaped)))?;
            writer.write_event(Event::End(BytesEnd::new(name)))?;
        }
        _ => {
            writer.write_event(Event::Empty(BytesStart::new(name)))?;
        }
    }
    Ok(())
}

fn write_entry<W: Write>(writer: &mut Writer<W>, entry: &TranslationEntry) -> Result<()> {
    writer.write_event(Event::Start(BytesStart::new("Entry")))?;

    let offsets = join_offsets(&entry.pointer_offsets);
    write_field(writer, "PointerOffset", Some(&offsets))?;
    if let Some(voice) = &entry.voice_id {
        write_field(writer, "VoiceId", Some(voice))?;
    }
    write_field(writer, "JapaneseText", Some(&entry.source))?;
    write_field(writer, "EnglishText", entry.target.as_deref())?;
    write_field(writer, "Notes", entry.notes.as_deref())?;
    if let Some(speaker_id) = entry.speaker_id {
        write_field(writer, "SpeakerId", Some(&speaker_id.to_string()))?;
    }
    write_field(writer, "Id", Some(&entry.id.to_string()))?;
    if let Some(bubble_id) = entry.bubble_id {
        write_field(writer, "BubbleId", Some(&bubble_id.to_string()))?;
    }
    write_field(writer, "Status", Some(entry.status.as_str()))?;
    if let Some(max_length) = entry.max_length {
        write_field(writer, "MaxLength", Some(&max_length.to_string()))?;
    }
    if let Some(embed) = &entry.embed_offsets {
        writer.write_event(Event::Start(BytesStart::new("EmbedOffset")))?;
        write_field(writer, "hi", Some(&join_offsets(&embed.hi)))?;
        write_field(writer, "lo", Some(&join_offsets(&embed.lo)))?;
        writer.write_event(Event::End(BytesEnd::new("EmbedOffset")))?;
    }

    writer.write_event(Event::End(BytesEnd::new("Entry")))?;
    Ok(())
}

/// Serialize an IR document to XML.
///
/// # Errors
/// Returns an error if XML serialization fails.
pub fn to_xml(document: &IrDocument) -> Result<String> {
    let mut output = Vec::new();
    let mut writer = Writer::new_with_indent(&mut output, b' ', 2);

    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;

    let root = document.kind.element_name();
    writer.write_event(Event::Start(BytesStart::new(root)))?;

    for section in &document.sections {
        let element = section.kind.element_name();
        writer.write_event(Event::Start(BytesStart::new(element)))?;
        write_field(&mut writer, "Section", Some(&section.name))?;
        for entry in &section.entries {
            write_entry(&mut writer, entry)?;
        }
        writer.write_event(Event::End(BytesEnd::new(element)))?;
    }

    writer.write_event(Event::End(BytesEnd::new(root)))?;

    let mut xml = String::from_utf8(output)?;
    xml.push('\n');
    Ok(xml)
}

/// Fields collected for one `<Entry>` while reading.
#[derive(Default)]
struct PendingEntry {
    pointer_offsets: Vec<usize>,
    voice_id: Option<String>,
    source: Option<String>,
    target: Option<String>,
    notes: Option<String>,
    speaker_id: Option<u32>,
    id: Option<u32>,
    bubble_id: Option<u32>,
    status: Option<Status>,
    max_length: Option<usize>,
    embed_hi: Option<Vec<usize>>,
    embed_lo: Option<Vec<usize>>,
}

impl PendingEntry {
    fn set(&mut self, field: &str, text: String) -> Result<()> {
        let value = if text.is_empty() { None } else { Some(text) };
        match field {
            "PointerOffset" => {
                self.pointer_offsets = parse_offsets(value.as_deref().unwrap_or_default())?;
            }
            "VoiceId" => self.voice_id = value,
            "JapaneseText" => self.source = Some(value.unwrap_or_default()),
            "EnglishText" => self.target = value,
            "Notes" => self.notes = value,
            "SpeakerId" => self.speaker_id = parse_number(field, value.as_deref())?,
            "Id" => self.id = parse_number(field, value.as_deref())?,
            "BubbleId" => self.bubble_id = parse_number(field, value.as_deref())?,
            "Status" => self.status = value.as_deref().map(str::parse::<Status>).transpose()?,
            "MaxLength" => self.max_length = parse_number(field, value.as_deref())?,
            "hi" => self.embed_hi = Some(parse_offsets(value.as_deref().unwrap_or_default())?),
            "lo" => self.embed_lo = Some(parse_offsets(value.as_deref().unwrap_or_default())?),
            _ => {}
        }
        Ok(())
    }

    fn finish(self) -> Result<TranslationEntry> {
        let id = self
            .id
            .ok_or_else(|| Error::InvalidIr("entry without Id".to_string()))?;
        let status = self
            .status
            .ok_or_else(|| Error::InvalidIr(format!("entry {id} without Status")))?;

        let embed_offsets = match (self.embed_hi, self.embed_lo) {
            (None, None) => None,
            (hi, lo) => {
                let embed = EmbedOffsets {
                    hi: hi.unwrap_or_default(),
                    lo: lo.unwrap_or_default(),
                };
                if embed.hi.len() != embed.lo.len() {
                    return Err(Error::InvalidIr(format!(
                        "entry {id}: {} hi offsets but {} lo offsets",
                        embed.hi.len(),
                        embed.lo.len()
                    )));
                }
                Some(embed)
            }
        };

        Ok(TranslationEntry {
            pointer_offsets: self.pointer_offsets,
            voice_id: self.voice_id,
            source: self.source.unwrap_or_default(),
            target: self.target,
            notes: self.notes,
            speaker_id: self.speaker_id,
            id,
            bubble_id: self.bubble_id,
            status,
            max_length: self.max_length,
            embed_offsets,
        })
    }
}

fn parse_offsets(text: &str) -> Result<Vec<usize>> {
    text.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse()
                .map_err(|e| Error::InvalidIr(format!("bad offset {s:?}: {e}")))
        })
        .collect()
}

fn parse_number<T: std::str::FromStr>(field: &str, text: Option<&str>) -> Result<Option<T>>
where
    T::Err: std::fmt::Display,
{
    text.map(|s| {
        s.trim()
            .parse()
            .map_err(|e| Error::InvalidIr(format!("bad {field} {s:?}: {e}")))
    })
    .transpose()
}

/// Parse an IR document from XML.
///
/// Unknown elements are ignored.
///
/// # Errors
/// Returns an error if XML parsing fails or an entry lacks `Id` or `Status`.
pub fn from_xml(content: &str) -> Result<IrDocument> {
    let mut reader = Reader::from_str(content);
    // Text is significant: leading and trailing spaces belong to the string
    reader.trim_text(false);

    let mut document = IrDocument::default();
    let mut section: Option<IrSection> = None;
    let mut entry: Option<PendingEntry> = None;
    let mut field: Option<(String, String)> = None;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                let name = String::from_utf8(e.name().as_ref().to_vec())?;
                match name.as_str() {
                    "SceneText" => document.kind = DocumentKind::SceneText,
                    "MenuText" => document.kind = DocumentKind::MenuText,
                    "Speakers" => section = Some(IrSection::new(SectionKind::Speakers, "")),
                    "Strings" => section = Some(IrSection::new(SectionKind::Strings, "")),
                    "Entry" if section.is_some() => entry = Some(PendingEntry::default()),
                    "EmbedOffset" => {}
                    _ if section.is_some() => field = Some((name, String::new())),
                    _ => {}
                }
            }
            Ok(Event::Empty(e)) => {
                let name = String::from_utf8(e.name().as_ref().to_vec())?;
                if let Some(pending) = entry.as_mut() {
                    pending.set(&name, String::new())?;
                }
            }
            Ok(Event::Text(e)) => {
                if let Some((_, text)) = field.as_mut() {
                    text.push_str(&e.unescape()?);
                }
            }
            Ok(Event::CData(e)) => {
                if let Some((_, text)) = field.as_mut() {
                    text.push_str(&String::from_utf8(e.into_inner().into_owned())?);
                }
            }
            Ok(Event::End(e)) => match e.name().as_ref() {
                b"Entry" => {
                    if let (Some(pending), Some(current)) = (entry.take(), section.as_mut()) {
                        current.entries.push(pending.finish()?);
                    }
                }
                b"Speakers" | b"Strings" => {
                    if let Some(done) = section.take() {
                        document.sections.push(done);
                    }
                }
                _ => {
                    if let Some((name, text)) = field.take() {
                        if let Some(pending) = entry.as_mut() {
                            pending.set(&name, text)?;
                        } else if name == "Section" {
                            if let Some(current) = section.as_mut() {
                                current.name = text;
                            }
                        }
                    }
                }
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(Error::XmlError(e)),
            _ => {}
        }
        buf.clear();
    }

    Ok(document)
}

/// Write an IR document to `path` atomically.
///
/// The XML is written to a temporary file next to `path` and renamed over it
/// only once complete.
///
/// # Errors
/// Returns an error if serialization or any file operation fails.
pub fn write_ir<P: AsRef<Path>>(path: P, document: &IrDocument) -> Result<()> {
    let xml = to_xml(document)?;
    crate::repack::write_atomic(path.as_ref(), xml.as_bytes())
}

/// Read an IR document from `path`.
///
/// # Errors
/// Returns an error if the file cannot be read or parsed.
pub fn read_ir<P: AsRef<Path>>(path: P) -> Result<IrDocument> {
    let content = std::fs::read_to_string(path.as_ref())?;
    from_xml(&content)
}
