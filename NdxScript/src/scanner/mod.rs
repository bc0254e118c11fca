//! Signature-driven record scanner
//!
//! Text records in script blobs are found by searching for fixed byte
//! patterns ("bytecodes") that precede a pointer field. Each match yields a
//! [`RawPointer`] tagged with the [`Category`] of the signature that found it.

mod pointer;
mod signatures;

use std::fmt;
use std::str::FromStr;

pub use pointer::PointerEncoding;
pub use signatures::SignatureTable;

use crate::error::{Error, Result};

/// Record categories, in scan and export order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Category {
    Story,
    Npc,
    Misc,
}

impl Category {
    pub const ALL: [Category; 3] = [Category::Story, Category::Npc, Category::Misc];

    /// Section name used in IR documents.
    #[must_use]
    pub fn section_name(self) -> &'static str {
        match self {
            Category::Story => "Story",
            Category::Npc => "NPC",
            Category::Misc => "Misc",
        }
    }

    /// Story and NPC records carry a speaker pointer after the text pointer.
    #[must_use]
    pub fn has_speaker(self) -> bool {
        matches!(self, Category::Story | Category::Npc)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.section_name())
    }
}

impl FromStr for Category {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "Story" => Ok(Category::Story),
            "NPC" | "Npc" => Ok(Category::Npc),
            "Misc" => Ok(Category::Misc),
            other => Err(Error::InvalidTable(format!("unknown category {other:?}"))),
        }
    }
}

/// A pointer field and the offset it resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawPointer {
    /// Offset of the pointer field itself.
    pub patch_offset: usize,
    /// Offset of the data it points at.
    pub target_offset: usize,
}

/// One signature hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanMatch {
    pub category: Category,
    pub pointer: RawPointer,
}

/// Find every record in `buffer`.
///
/// Categories are visited in enum order, then each signature in table order,
/// then each non-overlapping occurrence left to right. Matches are not
/// deduplicated; two signatures reporting the same pointer field both show up.
///
/// # Errors
///
/// Returns [`Error::MalformedPointer`] if a pointer field runs past the end
/// of the buffer or resolves outside of it.
pub fn scan(
    buffer: &[u8],
    table: &SignatureTable,
    encoding: PointerEncoding,
) -> Result<Vec<ScanMatch>> {
    let mut matches = Vec::new();

    for (category, signatures) in table.iter() {
        for signature in signatures {
            for start in find_all(buffer, signature) {
                let patch_offset = start + signature.len();
                let target_offset = encoding.read(buffer, patch_offset)?;
                matches.push(ScanMatch {
                    category,
                    pointer: RawPointer {
                        patch_offset,
                        target_offset,
                    },
                });
            }
        }
    }

    tracing::debug!("Scanned {} bytes: {} records", buffer.len(), matches.len());
    Ok(matches)
}

/// Non-overlapping occurrences of `needle`, left to right.
fn find_all(haystack: &[u8], needle: &[u8]) -> Vec<usize> {
    let mut hits = Vec::new();
    if needle.is_empty() || needle.len() > haystack.len() {
        return hits;
    }

    let mut pos = 0;
    while pos + needle.len() <= haystack.len() {
        if haystack[pos..pos + needle.len()] == *needle {
            hits.push(pos);
            pos += needle.len();
        } else {
            pos += 1;
        }
    }
    hits
}
