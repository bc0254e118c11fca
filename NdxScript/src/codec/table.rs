//! SPDX-License-Identifier: MIT
//!
//! Encoding table: glyph, tag and parameter maps plus their inverses
//!
//! Tables are supplied as JSON with hexadecimal keys:
//!
//! ```json
//! {
//!   "TBL":    { "41": "A", "8140": "　" },
//!   "TAGS":   { "05": "Wait", "06": "Color:Red" },
//!   "PARAMS": { "10": "VSM_", "12": "S" },
//!   "ESCAPE": "01",
//!   "BUBBLE": "0C"
//! }
//! ```
//!
//! Two-digit `TBL` keys are single-byte glyphs, four-digit keys are
//! lead/trail byte pairs. When several codes share a glyph, the first one in
//! the file is used for encoding.

use std::collections::HashMap;
use std::path::Path;

use indexmap::IndexMap;
use serde::Deserialize;

use super::{DEFAULT_BUBBLE, DEFAULT_ESCAPE, TERMINATOR};
use crate::error::{Error, Result};

#[derive(Debug, Deserialize)]
struct RawCodecTable {
    #[serde(rename = "TBL", default)]
    glyphs: IndexMap<String, String>,
    #[serde(rename = "TAGS", default)]
    tags: IndexMap<String, String>,
    #[serde(rename = "PARAMS", default)]
    params: IndexMap<String, String>,
    #[serde(rename = "ESCAPE", default)]
    escape: Option<String>,
    #[serde(rename = "BUBBLE", default)]
    bubble: Option<String>,
}

/// Bidirectional byte ⇄ text mapping.
#[derive(Debug, Clone)]
pub struct CodecTable {
    pub(super) escape: u8,
    pub(super) bubble: Option<u8>,
    pub(super) single: HashMap<u8, String>,
    pub(super) double: HashMap<u16, String>,
    pub(super) tags: HashMap<u8, String>,
    pub(super) params: HashMap<u8, String>,
    pub(super) glyph_codes: HashMap<String, Vec<u8>>,
    pub(super) max_glyph_chars: usize,
    pub(super) tag_codes: HashMap<String, u8>,
    /// Parameter prefixes, longest first.
    pub(super) param_prefixes: Vec<(String, u8)>,
}

impl CodecTable {
    /// Empty table with the given escape byte and bubble delimiter.
    pub fn new(escape: u8, bubble: Option<u8>) -> Self {
        Self {
            escape,
            bubble,
            single: HashMap::new(),
            double: HashMap::new(),
            tags: HashMap::new(),
            params: HashMap::new(),
            glyph_codes: HashMap::new(),
            max_glyph_chars: 0,
            tag_codes: HashMap::new(),
            param_prefixes: Vec::new(),
        }
    }

    /// Printable ASCII (0x20-0x7E) plus `\n` at 0x0A, default escape and bubble bytes.
    pub fn ascii() -> Self {
        let mut table = Self::new(DEFAULT_ESCAPE, Some(DEFAULT_BUBBLE));
        table = table.with_glyph(&[0x0A], "\n");
        for byte in 0x20u8..=0x7E {
            table = table.with_glyph(&[byte], &char::from(byte).to_string());
        }
        table
    }

    /// Parse a JSON table.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let raw: RawCodecTable = serde_json::from_str(json)?;

        let escape = match raw.escape {
            Some(hex) => parse_byte(&hex)?,
            None => DEFAULT_ESCAPE,
        };
        let bubble = match raw.bubble {
            Some(hex) => Some(parse_byte(&hex)?),
            None => Some(DEFAULT_BUBBLE),
        };

        let mut table = Self::new(escape, bubble);
        for (code, glyph) in &raw.glyphs {
            table = table.with_glyph(&parse_code(code)?, glyph);
        }
        for (code, name) in &raw.tags {
            table = table.with_tag(parse_byte(code)?, name);
        }
        for (code, prefix) in &raw.params {
            table = table.with_param(parse_byte(code)?, prefix);
        }

        tracing::debug!(
            "Loaded codec table: {} single, {} double, {} tags, {} params",
            table.single.len(),
            table.double.len(),
            table.tags.len(),
            table.params.len()
        );
        Ok(table)
    }

    /// Read a JSON table from disk.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    /// Map a one- or two-byte code to a glyph.
    ///
    /// Codes that would collide with the terminator, escape or bubble bytes
    /// are ignored since they could never be decoded.
    #[must_use]
    pub fn with_glyph(mut self, code: &[u8], glyph: &str) -> Self {
        if glyph.is_empty() || code.is_empty() || code.len() > 2 {
            return self;
        }
        let lead = code[0];
        if lead == TERMINATOR || lead == self.escape || Some(lead) == self.bubble {
            return self;
        }
        match *code {
            [byte] => {
                self.single.insert(byte, glyph.to_string());
            }
            [_, TERMINATOR] => return self,
            [lead, trail] => {
                self.double.insert(u16::from_be_bytes([lead, trail]), glyph.to_string());
            }
            _ => return self,
        }
        if !self.glyph_codes.contains_key(glyph) {
            self.glyph_codes.insert(glyph.to_string(), code.to_vec());
            self.max_glyph_chars = self.max_glyph_chars.max(glyph.chars().count());
        }
        self
    }

    /// Map an escape sequence (escape byte + `code`) to a `<name>` tag.
    #[must_use]
    pub fn with_tag(mut self, code: u8, name: &str) -> Self {
        self.tags.insert(code, name.to_string());
        self.tag_codes.entry(name.to_string()).or_insert(code);
        self
    }

    /// Map an escape sequence (escape byte + `code` + length + ASCII) to a
    /// `<prefixVALUE>` tag.
    #[must_use]
    pub fn with_param(mut self, code: u8, prefix: &str) -> Self {
        self.params.insert(code, prefix.to_string());
        if !self.param_prefixes.iter().any(|(p, _)| p == prefix) {
            self.param_prefixes.push((prefix.to_string(), code));
            self.param_prefixes
                .sort_by(|a, b| b.0.len().cmp(&a.0.len()).then_with(|| a.0.cmp(&b.0)));
        }
        self
    }

    pub fn escape_byte(&self) -> u8 {
        self.escape
    }

    pub fn bubble_byte(&self) -> Option<u8> {
        self.bubble
    }
}

impl Default for CodecTable {
    fn default() -> Self {
        Self::ascii()
    }
}

fn parse_byte(hex: &str) -> Result<u8> {
    u8::from_str_radix(hex.trim(), 16)
        .map_err(|e| Error::InvalidTable(format!("bad byte {hex:?}: {e}")))
}

fn parse_code(hex: &str) -> Result<Vec<u8>> {
    let hex = hex.trim();
    match hex.len() {
        2 => Ok(vec![parse_byte(hex)?]),
        4 => Ok(vec![parse_byte(&hex[..2])?, parse_byte(&hex[2..])?]),
        _ => Err(Error::InvalidTable(format!(
            "glyph code {hex:?} must be 2 or 4 hex digits"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_json() {
        let json = r#"{
            "TBL": { "41": "A", "8140": "　", "42": "A" },
            "TAGS": { "05": "Wait" },
            "PARAMS": { "10": "VSM_", "12": "S" },
            "ESCAPE": "01",
            "BUBBLE": "0C"
        }"#;
        let table = CodecTable::from_json_str(json).unwrap();
        assert_eq!(table.single.get(&0x41).map(String::as_str), Some("A"));
        assert_eq!(table.double.get(&0x8140).map(String::as_str), Some("　"));
        // First code wins for encoding
        assert_eq!(table.glyph_codes.get("A"), Some(&vec![0x41]));
        assert_eq!(table.tag_codes.get("Wait"), Some(&0x05));
        assert_eq!(table.param_prefixes[0].0, "VSM_");
        assert_eq!(table.bubble_byte(), Some(0x0C));
    }

    #[test]
    fn test_bad_hex_is_rejected() {
        let err = CodecTable::from_json_str(r#"{ "TBL": { "4G": "A" } }"#).unwrap_err();
        assert!(matches!(err, Error::InvalidTable(_)));
        let err = CodecTable::from_json_str(r#"{ "TBL": { "414": "A" } }"#).unwrap_err();
        assert!(matches!(err, Error::InvalidTable(_)));
    }

    #[test]
    fn test_reserved_bytes_are_not_glyphs() {
        let table = CodecTable::new(0x01, Some(0x0C))
            .with_glyph(&[0x00], "x")
            .with_glyph(&[0x01], "y")
            .with_glyph(&[0x0C], "z")
            .with_glyph(&[0x82, 0x00], "w");
        assert!(table.single.is_empty());
        assert!(table.double.is_empty());
        assert!(table.glyph_codes.is_empty());
    }
}
