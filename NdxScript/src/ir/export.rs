//! Graph → IR

use std::collections::BTreeSet;

use super::{
    DocumentKind, IrDocument, IrSection, SPEAKER_SECTION, SectionKind, TranslationEntry,
};
use crate::scanner::Category;
use crate::script::ScriptGraph;

/// Export knobs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportOptions {
    /// Categories left out of the document. Repack re-emits them verbatim.
    pub excluded: BTreeSet<Category>,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            excluded: BTreeSet::from([Category::Misc]),
        }
    }
}

impl ExportOptions {
    /// Export every category.
    #[must_use]
    pub fn all() -> Self {
        Self {
            excluded: BTreeSet::new(),
        }
    }

    #[must_use]
    pub fn with_excluded(mut self, category: Category) -> Self {
        self.excluded.insert(category);
        self
    }

    #[must_use]
    pub fn with_included(mut self, category: Category) -> Self {
        self.excluded.remove(&category);
        self
    }

    pub fn is_excluded(&self, category: Category) -> bool {
        self.excluded.contains(&category)
    }
}

/// Snapshot `graph` as an IR document.
///
/// One entry per speaker and one per bubble. String entries are ordered by
/// pointer offset, then bubble id, and every entry starts as `To Do`.
pub fn to_ir(graph: &ScriptGraph, options: &ExportOptions) -> IrDocument {
    let mut document = IrDocument::new(DocumentKind::SceneText);

    if !graph.speakers.is_empty() {
        let mut section = IrSection::new(SectionKind::Speakers, SPEAKER_SECTION);
        let mut speakers: Vec<_> = graph.speakers.iter().collect();
        speakers.sort_by_key(|s| s.id);
        section.entries = speakers
            .into_iter()
            .map(|s| TranslationEntry::new(s.id, s.name.clone()))
            .collect();
        document.sections.push(section);
    }

    for category in Category::ALL {
        if options.is_excluded(category) || !graph.has_category(category) {
            continue;
        }

        let mut section = IrSection::new(SectionKind::Strings, category.section_name());
        for node in graph.nodes_in(category) {
            let speaker_id = graph.speaker_of(node).map(|s| s.id);
            for bubble in &node.bubbles {
                section.entries.push(TranslationEntry {
                    pointer_offsets: vec![node.pointer_offset],
                    voice_id: bubble.voice_id.clone(),
                    speaker_id,
                    bubble_id: category.has_speaker().then_some(bubble.id),
                    ..TranslationEntry::new(node.id, bubble.text.clone())
                });
            }
        }
        document.sections.push(section);
    }

    tracing::debug!(
        "Exported {} sections, {} entries",
        document.sections.len(),
        document.entry_count()
    );
    document
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::Status;
    use crate::script::{Bubble, Speaker, StructNode};

    fn node(id: u32, category: Category, pointer_offset: usize, texts: &[&str]) -> StructNode {
        StructNode {
            id,
            category,
            pointer_offset,
            text_offset: 0,
            raw: Vec::new(),
            speaker: category.has_speaker().then_some(0),
            speaker_pointer_offset: category.has_speaker().then_some(pointer_offset + 2),
            bubbles: texts
                .iter()
                .zip(0u32..)
                .map(|(text, id)| Bubble {
                    id,
                    text: (*text).to_string(),
                    voice_id: None,
                })
                .collect(),
        }
    }

    fn graph() -> ScriptGraph {
        ScriptGraph {
            speakers: vec![Speaker {
                id: 1,
                name: "Reid".to_string(),
                source_offset: 0x100,
                written_offset: None,
            }],
            nodes: vec![
                node(1, Category::Story, 0x40, &["b"]),
                node(2, Category::Story, 0x20, &["a0", "a1"]),
                node(3, Category::Misc, 0x30, &["m"]),
            ],
        }
    }

    #[test]
    fn test_sections_and_order() {
        let document = to_ir(&graph(), &ExportOptions::default());
        let names: Vec<_> = document.sections.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["Speaker", "Story"]);

        let story = &document.sections[1];
        let keys: Vec<_> = story
            .entries
            .iter()
            .map(|e| (e.pointer_offsets[0], e.bubble_id, e.source.as_str()))
            .collect();
        assert_eq!(
            keys,
            vec![
                (0x20, Some(0), "a0"),
                (0x20, Some(1), "a1"),
                (0x40, Some(0), "b"),
            ]
        );
        assert_eq!(story.entries[0].id, 2);
        assert_eq!(story.entries[0].speaker_id, Some(1));
        assert!(story.entries.iter().all(|e| e.status == Status::ToDo));
    }

    #[test]
    fn test_misc_can_be_included() {
        let document = to_ir(&graph(), &ExportOptions::default().with_included(Category::Misc));
        let misc = document.sections.last().unwrap();
        assert_eq!(misc.name, "Misc");
        assert_eq!(misc.entries[0].bubble_id, None);
        assert_eq!(misc.entries[0].speaker_id, None);
    }
}
