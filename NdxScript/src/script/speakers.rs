//! Speaker name table

use std::collections::HashMap;

use super::Speaker;

/// Deduplicating speaker table. The first occurrence of a name wins its id.
#[derive(Debug, Clone, Default)]
pub struct SpeakerTable {
    speakers: Vec<Speaker>,
    indices: HashMap<String, usize>,
}

impl SpeakerTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a name read at `source_offset`, returns its arena index.
    pub fn add(&mut self, name: &str, source_offset: usize) -> usize {
        if let Some(&index) = self.indices.get(name) {
            return index;
        }

        let index = self.speakers.len();
        self.speakers.push(Speaker {
            id: index as u32 + 1,
            name: name.to_string(),
            source_offset,
            written_offset: None,
        });
        self.indices.insert(name.to_string(), index);
        index
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Speaker> {
        self.speakers.get(index)
    }

    #[must_use]
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.indices.get(name).copied()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.speakers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.speakers.is_empty()
    }

    pub fn into_speakers(self) -> Vec<Speaker> {
        self.speakers
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_occurrence_keeps_id() {
        let mut table = SpeakerTable::new();
        assert_eq!(table.add("Reid", 0x40), 0);
        assert_eq!(table.add("Farah", 0x50), 1);
        assert_eq!(table.add("Reid", 0x90), 0);
        assert_eq!(table.len(), 2);

        let reid = table.get(0).unwrap();
        assert_eq!(reid.id, 1);
        assert_eq!(reid.source_offset, 0x40);
        assert_eq!(table.index_of("Farah"), Some(1));
        assert_eq!(table.into_speakers()[1].id, 2);
    }
}
