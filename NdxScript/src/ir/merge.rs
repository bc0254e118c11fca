//! SPDX-License-Identifier: MIT
//!
//! Carry translations from a previous IR into a fresh extraction

use std::collections::{BTreeSet, HashMap, HashSet};

use super::{IrDocument, SectionKind, Status, TranslationEntry};

/// Merge knobs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeOptions {
    /// Statuses whose translations are carried forward.
    pub carry_forward: BTreeSet<Status>,
}

impl Default for MergeOptions {
    fn default() -> Self {
        Self {
            carry_forward: BTreeSet::from([
                Status::Proofreading,
                Status::Editing,
                Status::Problematic,
                Status::Done,
            ]),
        }
    }
}

impl MergeOptions {
    #[must_use]
    pub fn with_status(mut self, status: Status) -> Self {
        self.carry_forward.insert(status);
        self
    }

    #[must_use]
    pub fn without_status(mut self, status: &Status) -> Self {
        self.carry_forward.remove(status);
        self
    }

    pub fn carries(&self, status: &Status) -> bool {
        self.carry_forward.contains(status)
    }
}

/// What a merge did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeReport {
    /// Fresh entries that received a previous translation.
    pub carried: usize,
    /// Eligible previous entries whose source text no longer exists. Dropped.
    pub stale: usize,
}

/// Merge `previous` translations into `fresh`.
///
/// Entries are matched on exact source text; speakers only against
/// speakers, strings against strings from any section. See
/// [`merge_with_report`].
pub fn merge(fresh: &IrDocument, previous: &IrDocument, options: &MergeOptions) -> IrDocument {
    merge_with_report(fresh, previous, options).0
}

/// Merge and report how many entries were carried and how many went stale.
///
/// A previous entry is eligible when its status is in
/// [`MergeOptions::carry_forward`]. The last eligible entry for a source
/// text wins; every fresh entry with that text receives its target, status
/// and (when present) notes.
pub fn merge_with_report(
    fresh: &IrDocument,
    previous: &IrDocument,
    options: &MergeOptions,
) -> (IrDocument, MergeReport) {
    let mut merged = fresh.clone();
    let mut report = MergeReport::default();

    for kind in [SectionKind::Speakers, SectionKind::Strings] {
        let translations = eligible(previous, kind, options);

        let mut fresh_sources = HashSet::new();
        for section in merged.sections.iter_mut().filter(|s| s.kind == kind) {
            for entry in &mut section.entries {
                fresh_sources.insert(entry.source.clone());
                if let Some(old) = translations.get(entry.source.as_str()) {
                    carry(entry, old);
                    report.carried += 1;
                }
            }
        }

        report.stale += previous
            .sections
            .iter()
            .filter(|s| s.kind == kind)
            .flat_map(|s| &s.entries)
            .filter(|e| options.carries(&e.status) && !fresh_sources.contains(&e.source))
            .count();
    }

    tracing::debug!(
        "Merged translations: {} carried, {} stale",
        report.carried,
        report.stale
    );
    (merged, report)
}

fn eligible<'a>(
    document: &'a IrDocument,
    kind: SectionKind,
    options: &MergeOptions,
) -> HashMap<&'a str, &'a TranslationEntry> {
    let mut translations = HashMap::new();
    for section in document.sections.iter().filter(|s| s.kind == kind) {
        for entry in &section.entries {
            if options.carries(&entry.status) {
                translations.insert(entry.source.as_str(), entry);
            }
        }
    }
    translations
}

fn carry(entry: &mut TranslationEntry, old: &TranslationEntry) {
    entry.target.clone_from(&old.target);
    entry.status = old.status.clone();
    if old.notes.is_some() {
        entry.notes.clone_from(&old.notes);
    }
}
