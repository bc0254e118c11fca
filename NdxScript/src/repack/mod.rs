//! Re-emit binaries from edited IR
//!
//! Two strategies:
//!
//! - [`tail`]: containers with a relocatable strings section. Text is
//!   rewritten sequentially from the start of the strings region and every
//!   pointer is re-patched.
//! - [`fixed`]: binaries that cannot grow. Text is placed into caller-supplied
//!   free-space pools (see [`pool`]) and pointers, including split hi/lo
//!   immediate pairs (see [`patch`]), are patched to the new address.

pub mod fixed;
pub mod patch;
pub mod pool;
pub mod tail;

use std::collections::BTreeSet;
use std::fmt;
use std::io::Write;
use std::path::Path;

use tempfile::NamedTempFile;

use crate::error::Result;
use crate::ir::{Status, TranslationEntry};
use crate::script::join_voice;

pub use fixed::{FixedOptions, repack_fixed};
pub use pool::{FreeSpacePool, PoolAllocator};
pub use tail::{TailWriter, repack_script};
pub(crate) use tail::source_bytes;

/// Statuses whose target text is written to the binary.
///
/// `Done` is always included.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsertionMask {
    statuses: BTreeSet<Status>,
}

impl Default for InsertionMask {
    fn default() -> Self {
        Self {
            statuses: BTreeSet::from([Status::Done]),
        }
    }
}

impl InsertionMask {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_status(mut self, status: Status) -> Self {
        self.statuses.insert(status);
        self
    }

    #[must_use]
    pub fn with_proofreading(self) -> Self {
        self.with_status(Status::Proofreading)
    }

    #[must_use]
    pub fn with_editing(self) -> Self {
        self.with_status(Status::Editing)
    }

    #[must_use]
    pub fn with_problematic(self) -> Self {
        self.with_status(Status::Problematic)
    }

    pub fn contains(&self, status: &Status) -> bool {
        self.statuses.contains(status)
    }

    /// Whether `entry`'s target gets written: its status is in the mask and
    /// the target is non-empty.
    pub fn inserts(&self, entry: &TranslationEntry) -> bool {
        entry.translated().is_some() && self.contains(&entry.status)
    }

    /// Target text when the entry [`inserts`](Self::inserts), source text
    /// otherwise.
    pub fn select<'a>(&self, entry: &'a TranslationEntry) -> &'a str {
        match entry.translated() {
            Some(target) if self.contains(&entry.status) => target,
            _ => &entry.source,
        }
    }

    /// [`select`](Self::select) with the entry's voice tag re-prepended.
    pub fn text_for(&self, entry: &TranslationEntry) -> String {
        join_voice(entry.voice_id.as_deref(), self.select(entry))
    }
}

/// Non-fatal repack findings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Warning {
    /// Text was cut to fit a fixed-size field.
    TruncatedText {
        section: String,
        entry_id: u32,
        max_length: usize,
        /// Encoded length including the terminator.
        encoded_length: usize,
    },
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Warning::TruncatedText {
                section,
                entry_id,
                max_length,
                encoded_length,
            } => write!(
                f,
                "section {section}, entry {entry_id}: {encoded_length} bytes truncated to {max_length}"
            ),
        }
    }
}

/// Repacked bytes plus anything worth telling the user.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RepackOutput {
    pub bytes: Vec<u8>,
    pub warnings: Vec<Warning>,
}

impl RepackOutput {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self {
            bytes,
            warnings: Vec::new(),
        }
    }
}

/// `bytes` without trailing zero padding.
///
/// Repacking does not reproduce alignment padding after the last string, so
/// round-trip comparisons go through this.
pub fn normalize_trailing_padding(bytes: &[u8]) -> &[u8] {
    let end = bytes.iter().rposition(|&b| b != 0).map_or(0, |i| i + 1);
    &bytes[..end]
}

/// Write `bytes` to `path` through a temporary file in the same directory.
///
/// Nothing appears at `path` unless the whole write succeeds.
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let parent = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(parent)?;

    let mut temp = NamedTempFile::new_in(parent)?;
    temp.write_all(bytes)?;
    temp.flush()?;
    temp.persist(path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insertion_mask_selects_text() {
        let mask = InsertionMask::new();
        let mut entry = TranslationEntry::new(1, "原文");
        entry.target = Some("Target".to_string());

        entry.status = Status::Editing;
        assert_eq!(mask.select(&entry), "原文");
        assert_eq!(mask.clone().with_editing().select(&entry), "Target");

        entry.status = Status::Done;
        assert_eq!(mask.select(&entry), "Target");
        assert!(mask.inserts(&entry));

        // Done without a translation falls back to the source
        entry.target = Some(String::new());
        assert_eq!(mask.select(&entry), "原文");
        assert!(!mask.inserts(&entry));

        entry.voice_id = Some("VCT_01".to_string());
        assert_eq!(mask.text_for(&entry), "<VCT_01>原文");
    }

    #[test]
    fn test_normalize_trailing_padding() {
        assert_eq!(normalize_trailing_padding(&[1, 0, 2, 0, 0, 0]), &[1, 0, 2]);
        assert_eq!(normalize_trailing_padding(&[0, 0]), &[] as &[u8]);
    }

    #[test]
    fn test_write_atomic_creates_parents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("file.bin");
        write_atomic(&path, &[1, 2, 3]).unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), vec![1, 2, 3]);

        write_atomic(&path, &[4]).unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), vec![4]);
    }

    #[test]
    fn test_warning_display() {
        let warning = Warning::TruncatedText {
            section: "Items".to_string(),
            entry_id: 4,
            max_length: 8,
            encoded_length: 10,
        };
        assert_eq!(
            warning.to_string(),
            "section Items, entry 4: 10 bytes truncated to 8"
        );
    }
}
