//! Signature tables

use std::collections::BTreeMap;
use std::path::Path;

use indexmap::IndexMap;

use super::Category;
use crate::error::{Error, Result};

/// Byte patterns per category.
///
/// Loaded from JSON as `{ "Story": ["18000C04"], "NPC": ["40000C04"] }`.
/// Whitespace inside a pattern is ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SignatureTable {
    signatures: BTreeMap<Category, Vec<Vec<u8>>>,
}

impl SignatureTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Signatures of the shipped TSS scripts.
    ///
    /// No pattern is contained in another. Records behind `0E 00 00 82 02`
    /// are picked up by the Misc pattern.
    #[must_use]
    pub fn tss() -> Self {
        Self::new()
            .with_signature(Category::Story, &[0x18, 0x00, 0x0C, 0x04])
            .with_signature(Category::Npc, &[0x40, 0x00, 0x0C, 0x04])
            .with_signature(Category::Misc, &[0x00, 0x00, 0x82, 0x02])
    }

    #[must_use]
    pub fn with_signature(mut self, category: Category, pattern: &[u8]) -> Self {
        if !pattern.is_empty() {
            self.signatures
                .entry(category)
                .or_default()
                .push(pattern.to_vec());
        }
        self
    }

    /// Parse a JSON table.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidTable`] for unknown categories or bad hex.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let raw: IndexMap<String, Vec<String>> = serde_json::from_str(json)?;
        let mut table = Self::new();
        for (name, patterns) in raw {
            let category: Category = name.parse()?;
            for pattern in patterns {
                table = table.with_signature(category, &parse_pattern(&pattern)?);
            }
        }
        Ok(table)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    /// Categories in enum order with their patterns.
    pub fn iter(&self) -> impl Iterator<Item = (Category, &[Vec<u8>])> {
        self.signatures
            .iter()
            .map(|(category, patterns)| (*category, patterns.as_slice()))
    }

    pub fn is_empty(&self) -> bool {
        self.signatures.is_empty()
    }
}

fn parse_pattern(pattern: &str) -> Result<Vec<u8>> {
    let digits: String = pattern.chars().filter(|c| !c.is_whitespace()).collect();
    if digits.is_empty() || digits.len() % 2 != 0 || !digits.is_ascii() {
        return Err(Error::InvalidTable(format!("bad signature {pattern:?}")));
    }
    (0..digits.len())
        .step_by(2)
        .map(|i| {
            u8::from_str_radix(&digits[i..i + 2], 16)
                .map_err(|e| Error::InvalidTable(format!("bad signature {pattern:?}: {e}")))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_json() {
        let table =
            SignatureTable::from_json_str(r#"{ "NPC": ["40 00 0C 04"], "Story": ["18000C04"] }"#)
                .unwrap();
        let entries: Vec<_> = table.iter().collect();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].0, Category::Story);
        assert_eq!(entries[0].1, &[vec![0x18, 0x00, 0x0C, 0x04]]);
        assert_eq!(entries[1].1, &[vec![0x40, 0x00, 0x0C, 0x04]]);
    }

    #[test]
    fn test_bad_patterns() {
        assert!(SignatureTable::from_json_str(r#"{ "Story": ["180"] }"#).is_err());
        assert!(SignatureTable::from_json_str(r#"{ "Story": ["ZZ"] }"#).is_err());
        assert!(SignatureTable::from_json_str(r#"{ "Battle": ["18"] }"#).is_err());
    }

    #[test]
    fn test_default_tss_table() {
        let table = SignatureTable::tss();
        let counts: Vec<_> = table.iter().map(|(c, p)| (c, p.len())).collect();
        assert_eq!(
            counts,
            vec![(Category::Story, 1), (Category::Npc, 1), (Category::Misc, 1)]
        );
    }

    #[test]
    fn test_default_tss_patterns_do_not_contain_each_other() {
        let patterns: Vec<_> = SignatureTable::tss()
            .iter()
            .flat_map(|(_, p)| p.iter())
            .cloned()
            .collect();
        for (i, outer) in patterns.iter().enumerate() {
            for (j, inner) in patterns.iter().enumerate() {
                if i != j {
                    assert!(
                        !outer.windows(inner.len()).any(|w| w == inner.as_slice()),
                        "{outer:02X?} contains {inner:02X?}"
                    );
                }
            }
        }
    }
}
