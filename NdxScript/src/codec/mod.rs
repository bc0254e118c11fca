//! Table-driven text codec
//!
//! Game text is a 0x00-terminated run of one- and two-byte glyph codes mixed
//! with escape sequences. Decoding turns it into [`Token`]s which render as
//! plain text with bracketed markers:
//!
//! - `<Name>` for control tags (escape byte + tag byte)
//! - `<VSM_0012>` for parameter tags (escape byte + tag byte + length + ASCII payload)
//! - `<Bubble>` for the bubble delimiter
//! - `{XX}` for any byte the table does not know
//!
//! Encoding is the exact inverse. A marker with no table entry is an
//! [`Error::UnknownToken`](crate::Error::UnknownToken), never skipped.

mod decode;
mod encode;
mod table;

use std::fmt;

pub use table::CodecTable;

/// Text terminator.
pub const TERMINATOR: u8 = 0x00;

/// Escape byte used when the table does not set one.
pub const DEFAULT_ESCAPE: u8 = 0x01;

/// Bubble delimiter used when the table does not set one.
pub const DEFAULT_BUBBLE: u8 = 0x0C;

/// Name of the marker rendered for the bubble delimiter.
pub const BUBBLE_TAG: &str = "Bubble";

/// One decoded unit of text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// A glyph from the character table.
    Glyph(String),
    /// A control tag from the tag table.
    Tag(String),
    /// A tag carrying an ASCII parameter (voice ids, portraits).
    Param { prefix: String, value: String },
    /// Segment delimiter between dialogue bubbles.
    BubbleBreak,
    /// A byte with no table entry.
    Raw(u8),
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Glyph(glyph) => f.write_str(glyph),
            Self::Tag(name) => write!(f, "<{name}>"),
            Self::Param { prefix, value } => write!(f, "<{prefix}{value}>"),
            Self::BubbleBreak => write!(f, "<{BUBBLE_TAG}>"),
            Self::Raw(byte) => write!(f, "{{{byte:02X}}}"),
        }
    }
}

/// Result of decoding one terminated string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedText {
    pub tokens: Vec<Token>,
    /// Bytes consumed, terminator included.
    pub consumed: usize,
}

impl DecodedText {
    /// Render every token, bubble delimiters included.
    pub fn text(&self) -> String {
        render(&self.tokens)
    }

    /// Render the text split at each bubble delimiter.
    ///
    /// Always returns at least one (possibly empty) bubble.
    pub fn bubbles(&self) -> Vec<String> {
        self.tokens
            .split(|token| *token == Token::BubbleBreak)
            .map(render)
            .collect()
    }
}

/// Render tokens back to marker text.
pub fn render(tokens: &[Token]) -> String {
    tokens.iter().map(ToString::to_string).collect()
}
