//! Script object graph
//!
//! Scan matches are resolved into an arena-backed graph: speakers are
//! deduplicated by name, each record becomes a [`StructNode`] and its text
//! is split into [`Bubble`]s. Nodes refer to speakers by arena index.

mod session;
mod speakers;
mod voice;

pub use session::{ExtractionSession, build};
pub use speakers::SpeakerTable;
pub use voice::{join_voice, split_voice};

use crate::scanner::Category;

/// A deduplicated speaker name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Speaker {
    /// 1-based, in first-seen order.
    pub id: u32,
    pub name: String,
    /// Where the name was first read.
    pub source_offset: usize,
    /// Where the name was written during the last repack.
    pub written_offset: Option<usize>,
}

/// One dialogue segment of a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bubble {
    /// 0-based ordinal within the node.
    pub id: u32,
    pub text: String,
    /// Leading voice tag, without brackets.
    pub voice_id: Option<String>,
}

/// One text record found by the scanner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructNode {
    /// 1-based, in match order.
    pub id: u32,
    pub category: Category,
    /// Offset of the text pointer field. Unique per file.
    pub pointer_offset: usize,
    pub text_offset: usize,
    /// Source bytes of the text, terminator excluded.
    pub raw: Vec<u8>,
    /// Index into [`ScriptGraph::speakers`].
    pub speaker: Option<usize>,
    /// Offset of the speaker pointer field, for speaker-bearing categories.
    pub speaker_pointer_offset: Option<usize>,
    pub bubbles: Vec<Bubble>,
}

/// Speakers and records of one file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScriptGraph {
    pub speakers: Vec<Speaker>,
    /// In match order.
    pub nodes: Vec<StructNode>,
}

impl ScriptGraph {
    pub fn speaker(&self, index: usize) -> Option<&Speaker> {
        self.speakers.get(index)
    }

    /// Speaker of `node`, if any.
    pub fn speaker_of(&self, node: &StructNode) -> Option<&Speaker> {
        node.speaker.and_then(|index| self.speakers.get(index))
    }

    pub fn speaker_by_id(&self, id: u32) -> Option<&Speaker> {
        self.speakers.iter().find(|s| s.id == id)
    }

    pub fn node_at(&self, pointer_offset: usize) -> Option<&StructNode> {
        self.nodes.iter().find(|n| n.pointer_offset == pointer_offset)
    }

    /// Nodes of one category, by ascending pointer offset.
    pub fn nodes_in(&self, category: Category) -> Vec<&StructNode> {
        let mut nodes: Vec<_> = self
            .nodes
            .iter()
            .filter(|n| n.category == category)
            .collect();
        nodes.sort_by_key(|n| n.pointer_offset);
        nodes
    }

    pub fn has_category(&self, category: Category) -> bool {
        self.nodes.iter().any(|n| n.category == category)
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}
