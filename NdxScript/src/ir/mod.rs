//! Intermediate representation for translators
//!
//! An [`IrDocument`] is a snapshot of a file's translatable text, grouped into
//! sections of [`TranslationEntry`] values. It holds no references back into
//! the script graph; repack matches entries by pointer offset and id.
//!
//! The on-disk form is XML (see [`to_xml`] and [`from_xml`]).

mod export;
mod merge;
mod xml;

use std::fmt;
use std::str::FromStr;

pub use export::{ExportOptions, to_ir};
pub use merge::{MergeOptions, MergeReport, merge, merge_with_report};
pub use xml::{from_xml, read_ir, to_xml, write_ir};

use crate::error::Error;

/// Section name of the speaker section.
pub const SPEAKER_SECTION: &str = "Speaker";

/// Translation progress of an entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Status {
    #[default]
    ToDo,
    Proofreading,
    Editing,
    Problematic,
    Done,
    /// A project-specific status.
    Custom(String),
}

impl Status {
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Status::ToDo => "To Do",
            Status::Proofreading => "Proofreading",
            Status::Editing => "Editing",
            Status::Problematic => "Problematic",
            Status::Done => "Done",
            Status::Custom(name) => name.as_str(),
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Status {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim() {
            "To Do" => Status::ToDo,
            "Proofreading" => Status::Proofreading,
            "Editing" => Status::Editing,
            "Problematic" => Status::Problematic,
            "Done" => Status::Done,
            "" => return Err(Error::InvalidIr("empty status".to_string())),
            other => Status::Custom(other.to_string()),
        })
    }
}

/// Offsets of split high/low immediate pairs that load an entry's address.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EmbedOffsets {
    pub hi: Vec<usize>,
    pub lo: Vec<usize>,
}

/// One translatable string.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TranslationEntry {
    /// Pointer fields referencing this text. Empty for speakers.
    pub pointer_offsets: Vec<usize>,
    pub voice_id: Option<String>,
    /// Source-language text; the merge key.
    pub source: String,
    pub target: Option<String>,
    pub notes: Option<String>,
    pub speaker_id: Option<u32>,
    pub id: u32,
    pub bubble_id: Option<u32>,
    pub status: Status,
    pub max_length: Option<usize>,
    pub embed_offsets: Option<EmbedOffsets>,
}

impl TranslationEntry {
    /// A fresh `To Do` entry.
    pub fn new(id: u32, source: impl Into<String>) -> Self {
        Self {
            id,
            source: source.into(),
            ..Self::default()
        }
    }

    /// Target text, if it is non-empty.
    pub fn translated(&self) -> Option<&str> {
        self.target.as_deref().filter(|t| !t.is_empty())
    }
}

/// Whether a section holds speakers or strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectionKind {
    Speakers,
    Strings,
}

impl SectionKind {
    #[must_use]
    pub fn element_name(self) -> &'static str {
        match self {
            SectionKind::Speakers => "Speakers",
            SectionKind::Strings => "Strings",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IrSection {
    pub kind: SectionKind,
    pub name: String,
    pub entries: Vec<TranslationEntry>,
}

impl IrSection {
    pub fn new(kind: SectionKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
            entries: Vec::new(),
        }
    }
}

/// Root element of the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DocumentKind {
    /// Scripts and talk tables.
    #[default]
    SceneText,
    /// Menu overlays.
    MenuText,
}

impl DocumentKind {
    #[must_use]
    pub fn element_name(self) -> &'static str {
        match self {
            DocumentKind::SceneText => "SceneText",
            DocumentKind::MenuText => "MenuText",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IrDocument {
    pub kind: DocumentKind,
    pub sections: Vec<IrSection>,
}

impl IrDocument {
    pub fn new(kind: DocumentKind) -> Self {
        Self {
            kind,
            sections: Vec::new(),
        }
    }

    /// The speaker section, if present.
    pub fn speakers(&self) -> Option<&IrSection> {
        self.sections
            .iter()
            .find(|s| s.kind == SectionKind::Speakers)
    }

    /// String sections in document order.
    pub fn strings(&self) -> impl Iterator<Item = &IrSection> {
        self.sections
            .iter()
            .filter(|s| s.kind == SectionKind::Strings)
    }

    /// Every string entry with its section name, in document order.
    pub fn string_entries(&self) -> impl Iterator<Item = (&str, &TranslationEntry)> {
        self.strings()
            .flat_map(|s| s.entries.iter().map(move |e| (s.name.as_str(), e)))
    }

    pub fn entry_count(&self) -> usize {
        self.sections.iter().map(|s| s.entries.len()).sum()
    }
}
