//! Bytes → tokens

use super::{CodecTable, DecodedText, TERMINATOR, Token};
use crate::error::{Error, Result};

impl CodecTable {
    /// Decode the terminated string starting at `offset`.
    pub fn decode(&self, buffer: &[u8], offset: usize) -> Result<DecodedText> {
        let mut tokens = Vec::new();
        let mut pos = offset;

        loop {
            let byte = *buffer.get(pos).ok_or(Error::OutOfBounds {
                offset: pos,
                size: 1,
                len: buffer.len(),
            })?;

            if byte == TERMINATOR {
                pos += 1;
                break;
            }

            if byte == self.escape {
                if let Some((token, size)) = self.decode_escape(buffer, pos) {
                    tokens.push(token);
                    pos += size;
                } else {
                    tokens.push(Token::Raw(byte));
                    pos += 1;
                }
                continue;
            }

            if Some(byte) == self.bubble {
                tokens.push(Token::BubbleBreak);
                pos += 1;
                continue;
            }

            if let Some(&trail) = buffer.get(pos + 1) {
                if let Some(glyph) = self.double.get(&u16::from_be_bytes([byte, trail])) {
                    push_glyph(&mut tokens, glyph);
                    pos += 2;
                    continue;
                }
            }

            match self.single.get(&byte) {
                Some(glyph) => push_glyph(&mut tokens, glyph),
                None => tokens.push(Token::Raw(byte)),
            }
            pos += 1;
        }

        Ok(DecodedText {
            tokens,
            consumed: pos - offset,
        })
    }

    /// Decode and render in one step. Returns the text and the bytes consumed.
    pub fn decode_text(&self, buffer: &[u8], offset: usize) -> Result<(String, usize)> {
        let decoded = self.decode(buffer, offset)?;
        Ok((decoded.text(), decoded.consumed))
    }

    /// Escape sequence at `pos`, or `None` when the bytes after the escape
    /// byte are not a known sequence.
    fn decode_escape(&self, buffer: &[u8], pos: usize) -> Option<(Token, usize)> {
        let code = *buffer.get(pos + 1)?;

        if let Some(name) = self.tags.get(&code) {
            return Some((Token::Tag(name.clone()), 2));
        }

        let prefix = self.params.get(&code)?;
        let len = usize::from(*buffer.get(pos + 2)?);
        let payload = buffer.get(pos + 3..pos + 3 + len)?;
        if payload.is_empty() || !payload.iter().all(|b| is_param_byte(*b)) {
            return None;
        }
        let value = payload.iter().map(|&b| char::from(b)).collect();
        Some((
            Token::Param {
                prefix: prefix.clone(),
                value,
            },
            3 + len,
        ))
    }
}

pub(super) fn is_param_byte(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || byte == b'_'
}

/// Consecutive glyphs are merged so token lists stay short.
fn push_glyph(tokens: &mut Vec<Token>, glyph: &str) {
    if let Some(Token::Glyph(last)) = tokens.last_mut() {
        last.push_str(glyph);
    } else {
        tokens.push(Token::Glyph(glyph.to_string()));
    }
}
