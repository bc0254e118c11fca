//! Text → bytes

use super::decode::is_param_byte;
use super::{BUBBLE_TAG, CodecTable, TERMINATOR};
use crate::error::{Error, Result};

impl CodecTable {
    /// Encode marker text back to bytes. The terminator is not appended.
    pub fn encode(&self, text: &str) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(text.len());
        let mut rest = text;

        while let Some(first) = rest.chars().next() {
            if first == '<' {
                if let Some(end) = rest.find('>') {
                    let inner = &rest[1..end];
                    if is_marker_name(inner) {
                        self.encode_marker(inner, &mut out)?;
                        rest = &rest[end + 1..];
                        continue;
                    }
                }
            }

            if first == '{' {
                if let Some(byte) = parse_raw_byte(rest) {
                    out.push(byte);
                    rest = &rest[4..];
                    continue;
                }
            }

            let consumed = self.encode_glyph(rest, &mut out)?;
            rest = &rest[consumed..];
        }

        Ok(out)
    }

    /// Encode and append the terminator.
    pub fn encode_terminated(&self, text: &str) -> Result<Vec<u8>> {
        let mut bytes = self.encode(text)?;
        bytes.push(TERMINATOR);
        Ok(bytes)
    }

    fn encode_marker(&self, inner: &str, out: &mut Vec<u8>) -> Result<()> {
        if inner == BUBBLE_TAG {
            if let Some(bubble) = self.bubble {
                out.push(bubble);
                return Ok(());
            }
        }

        if let Some(&code) = self.tag_codes.get(inner) {
            out.extend_from_slice(&[self.escape, code]);
            return Ok(());
        }

        for (prefix, code) in &self.param_prefixes {
            let Some(value) = inner.strip_prefix(prefix.as_str()) else {
                continue;
            };
            if value.is_empty() || !value.bytes().all(is_param_byte) {
                continue;
            }
            let Ok(len) = u8::try_from(value.len()) else {
                continue;
            };
            out.extend_from_slice(&[self.escape, *code, len]);
            out.extend_from_slice(value.as_bytes());
            return Ok(());
        }

        Err(Error::UnknownToken {
            token: format!("<{inner}>"),
        })
    }

    /// Longest glyph match at the start of `text`. Returns the bytes of text consumed.
    fn encode_glyph(&self, text: &str, out: &mut Vec<u8>) -> Result<usize> {
        let boundaries: Vec<usize> = text
            .char_indices()
            .map(|(i, _)| i)
            .skip(1)
            .chain(std::iter::once(text.len()))
            .take(self.max_glyph_chars.max(1))
            .collect();

        for &end in boundaries.iter().rev() {
            if let Some(code) = self.glyph_codes.get(&text[..end]) {
                out.extend_from_slice(code);
                return Ok(end);
            }
        }

        let token = text.chars().next().map(String::from).unwrap_or_default();
        Err(Error::UnknownToken { token })
    }
}

fn is_marker_name(inner: &str) -> bool {
    !inner.is_empty()
        && inner
            .chars()
            .all(|c| c.is_alphanumeric() || matches!(c, '_' | '/' | ':'))
}

/// `{XX}` at the start of `text`.
fn parse_raw_byte(text: &str) -> Option<u8> {
    let bytes = text.as_bytes();
    if bytes.len() < 4 || bytes[3] != b'}' {
        return None;
    }
    if !bytes[1].is_ascii_hexdigit() || !bytes[2].is_ascii_hexdigit() {
        return None;
    }
    u8::from_str_radix(&text[1..3], 16).ok()
}
