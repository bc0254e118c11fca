//! Error types for `ndxscript`

use std::path::PathBuf;

use thiserror::Error;

/// The error type for `ndxscript` operations.
///
/// Everything except [`Error::Io`] and the parsing variants is fatal for the
/// file being processed only; batch drivers keep going with the next file.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum Error {
    // ==================== IO Errors ====================
    /// IO error from file operations.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // ==================== Cursor Errors ====================
    /// A read or write would cross the end of the buffer.
    #[error("out of bounds: {size} byte(s) at {offset:#x} (buffer length {len:#x})")]
    OutOfBounds {
        /// Absolute offset of the access.
        offset: usize,
        /// Width of the access in bytes.
        size: usize,
        /// Length of the buffer.
        len: usize,
    },

    // ==================== Scanner / Graph Errors ====================
    /// A signature matched but its pointer field or target lies outside the buffer.
    #[error("malformed pointer at {patch_offset:#x}: target {target_offset:#x} outside buffer of {len:#x} bytes")]
    MalformedPointer {
        /// Offset of the pointer field.
        patch_offset: usize,
        /// Resolved text offset (or the raw field value when unreadable).
        target_offset: usize,
        /// Length of the buffer.
        len: usize,
    },

    /// Two records claim the same pointer offset.
    #[error("duplicate record at pointer offset {pointer_offset:#x}")]
    DuplicateRecord {
        /// The pointer offset claimed twice.
        pointer_offset: usize,
    },

    // ==================== Codec Errors ====================
    /// A text token has no inverse mapping in the encoding table.
    #[error("unknown token {token:?}")]
    UnknownToken {
        /// The offending token, as written in the text.
        token: String,
    },

    /// The encoding or signature table is malformed.
    #[error("invalid table: {0}")]
    InvalidTable(String),

    // ==================== Repack Errors ====================
    /// No free-space pool is large enough for an entry.
    #[error("out of space in section {section}: entry {entry_id} needs {required} bytes")]
    OutOfSpace {
        /// IR section of the entry.
        section: String,
        /// Id of the entry.
        entry_id: u32,
        /// Encoded length including the terminator.
        required: usize,
    },

    /// A relocated address does not fit its pointer field.
    #[error("pointer at {patch_offset:#x} cannot hold value {value:#x}")]
    PointerOverflow {
        /// Offset of the pointer field.
        patch_offset: usize,
        /// The value that did not fit.
        value: usize,
    },

    /// A per-entry failure, with the entry that caused it.
    #[error("section {section}, entry {entry_id}: {source}")]
    Entry {
        /// IR section of the entry.
        section: String,
        /// Id of the entry.
        entry_id: u32,
        /// The underlying error.
        #[source]
        source: Box<Error>,
    },

    /// A per-file failure, with the file that caused it.
    #[error("{}: {source}", path.display())]
    File {
        /// The file being processed.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: Box<Error>,
    },

    // ==================== Container Errors ====================
    /// The buffer is not a TSS script (missing `TSS` magic).
    #[error("invalid TSS magic: expected TSS, found {0:?}")]
    InvalidTssMagic([u8; 4]),

    /// The battle talk table header is inconsistent with the buffer.
    #[error("invalid talk table: {0}")]
    InvalidTalkTable(String),

    // ==================== Parsing Errors ====================
    /// The IR document is missing required data.
    #[error("invalid IR document: {0}")]
    InvalidIr(String),

    /// XML parsing error.
    #[error("XML parse error: {0}")]
    XmlError(#[from] quick_xml::Error),

    /// JSON parsing or serialization error.
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// UTF-8 conversion error.
    #[error("UTF-8 conversion error: {0}")]
    Utf8Error(#[from] std::string::FromUtf8Error),
}

impl Error {
    /// Attach the section and entry id that produced this error.
    #[must_use]
    pub fn in_entry(self, section: &str, entry_id: u32) -> Self {
        Error::Entry {
            section: section.to_string(),
            entry_id,
            source: Box::new(self),
        }
    }

    /// Attach the file that produced this error.
    #[must_use]
    pub fn in_file(self, path: impl Into<PathBuf>) -> Self {
        Error::File {
            path: path.into(),
            source: Box::new(self),
        }
    }
}

impl From<tempfile::PersistError> for Error {
    fn from(err: tempfile::PersistError) -> Self {
        Error::Io(err.error)
    }
}

/// A specialized Result type for `ndxscript` operations.
pub type Result<T> = std::result::Result<T, Error>;
