//! Container formats
//!
//! Each format wires the pipeline for one kind of file:
//!
//! - [`tss`]: TSS scripts. Signature scan, growable-tail repack.
//! - [`menu`]: menu overlays. Declarative pointer tables, fixed-pool repack.
//! - [`talk`]: battle talk tables. Fixed record table, growable-tail repack.

pub mod menu;
pub mod talk;
pub mod tss;

pub use menu::{
    MenuDefinition, MenuSection, StyleStep, extract_menu, extract_menu_file, pack_menu,
    pack_menu_file,
};
pub use talk::{TalkRecord, TalkTable, extract_talk_file, pack_talk_file};
pub use tss::{TssContext, TssScript, extract_tss_file, pack_tss_file};
