//! # ndxscript
//!
//! Script text extraction and re-insertion for NDX game binaries.
//!
//! ## Pipeline
//!
//! - **Codec** - table-driven byte ↔ text conversion with control tags
//! - **Scanner** - signature search for text records in bytecode
//! - **Script graph** - records, deduplicated speakers and dialogue bubbles
//! - **IR** - translator-facing XML documents, with translation merge
//! - **Repack** - re-emit binaries, growing the strings region or filling
//!   free-space pools, and re-patch every pointer
//!
//! ## Quick Start
//!
//! ### Extracting and packing a TSS script
//!
//! ```no_run
//! use ndxscript::formats::{TssContext, extract_tss_file, pack_tss_file};
//! use ndxscript::codec::CodecTable;
//! use ndxscript::repack::InsertionMask;
//!
//! let context = TssContext::new(CodecTable::load("tbl.json")?);
//!
//! // Keep translations already present in the XML
//! extract_tss_file("map/ep_000.tss", "xml/ep_000.xml", &context, true)?;
//!
//! let mask = InsertionMask::new().with_editing();
//! pack_tss_file("map/ep_000.tss", "xml/ep_000.xml", "out/ep_000.tss", &context, &mask)?;
//! # Ok::<(), ndxscript::Error>(())
//! ```
//!
//! ### Menu overlays
//!
//! ```no_run
//! use std::path::Path;
//! use ndxscript::formats::{MenuDefinition, extract_menu_file};
//! use ndxscript::codec::CodecTable;
//!
//! let codec = CodecTable::load("tbl.json")?;
//! for definition in MenuDefinition::load_list("menu.json")? {
//!     extract_menu_file(&definition, Path::new("files"), Path::new("xml/menu"), &codec, None)?;
//! }
//! # Ok::<(), ndxscript::Error>(())
//! ```

pub mod batch;
pub mod codec;
pub mod cursor;
pub mod error;
pub mod formats;
pub mod ir;
pub mod repack;
pub mod scanner;
pub mod script;

// Re-exports for convenience
pub use error::{Error, Result};

/// Prelude module for common imports
pub mod prelude {
    pub use crate::error::{Error, Result};
    pub use crate::codec::CodecTable;
    pub use crate::cursor::ByteCursor;
    pub use crate::scanner::{Category, PointerEncoding, SignatureTable, scan};
    pub use crate::script::{ScriptGraph, build};
    pub use crate::ir::{
        ExportOptions, IrDocument, MergeOptions, Status, TranslationEntry, from_xml, merge,
        read_ir, to_ir, to_xml, write_ir,
    };
    pub use crate::repack::{
        FixedOptions, InsertionMask, PoolAllocator, RepackOutput, Warning,
        normalize_trailing_padding, repack_fixed, repack_script,
    };

    pub use crate::formats::{
        MenuDefinition, TalkTable, TssContext, TssScript, extract_menu_file, extract_talk_file,
        extract_tss_file, pack_menu_file, pack_talk_file, pack_tss_file,
    };
    pub use crate::batch::{BatchResult, find_files, run_batch};
}

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
