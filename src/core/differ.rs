use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, warn};

use super::fingerprint::Fingerprint;
use super::line_diff::{line_diff, LineDiff};
use super::segmenter::{Section, Segmenter};
use crate::config::{CollisionPolicy, Config};
use crate::error::Result;

/// Fingerprint-keyed section texts of one document revision, in first-seen order
#[derive(Debug, Clone, Default)]
pub struct SectionSet {
    entries: Vec<(Fingerprint, String)>,
    index: HashMap<Fingerprint, usize>,
    collisions: usize,
}

impl SectionSet {
    pub fn from_sections(sections: Vec<Section>, policy: CollisionPolicy) -> Self {
        let mut set = Self::default();
        for section in sections {
            set.insert(section.fingerprint, section.text, policy);
        }
        set
    }

    fn insert(&mut self, fingerprint: Fingerprint, text: String, policy: CollisionPolicy) {
        if let Some(&slot) = self.index.get(&fingerprint) {
            self.collisions += 1;
            warn!(
                "Duplicate section fingerprint {} ({:?})",
                fingerprint.short(),
                policy
            );
            if policy == CollisionPolicy::LastWriteWins {
                self.entries[slot].1 = text;
            }
            return;
        }
        self.index.insert(fingerprint.clone(), self.entries.len());
        self.entries.push((fingerprint, text));
    }

    pub fn get(&self, fingerprint: &Fingerprint) -> Option<&str> {
        self.index
            .get(fingerprint)
            .map(|&slot| self.entries[slot].1.as_str())
    }

    pub fn contains(&self, fingerprint: &Fingerprint) -> bool {
        self.index.contains_key(fingerprint)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Fingerprint, &str)> {
        self.entries.iter().map(|(fp, text)| (fp, text.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of sections that collided with an earlier fingerprint
    pub fn collisions(&self) -> usize {
        self.collisions
    }
}

/// A section present in both revisions under the same fingerprint but with different text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModifiedSection {
    pub old: String,
    pub new: String,
    pub diff: LineDiff,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeSet {
    pub added: Vec<String>,
    pub deleted: Vec<String>,
    pub modified: Vec<ModifiedSection>,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.deleted.is_empty() && self.modified.is_empty()
    }

    pub fn total_changes(&self) -> usize {
        self.added.len() + self.deleted.len() + self.modified.len()
    }
}

/// Compares two document revisions section by section
#[derive(Debug, Clone)]
pub struct ContentDiffer {
    segmenter: Segmenter,
    context_lines: usize,
    collision_policy: CollisionPolicy,
}

impl ContentDiffer {
    pub fn new(config: &Config) -> Result<Self> {
        Ok(Self {
            segmenter: Segmenter::new(&config.segmentation)?,
            context_lines: config.diff.context_lines,
            collision_policy: config.diff.collision_policy,
        })
    }

    pub fn section_set(&self, document: &str) -> SectionSet {
        SectionSet::from_sections(self.segmenter.segment(document), self.collision_policy)
    }

    /// Classify every section of the two revisions as added, deleted or modified.
    ///
    /// Unchanged sections are dropped. `added` follows the new document's order,
    /// `deleted` and `modified` the old document's.
    pub fn diff(&self, old_doc: &str, new_doc: &str) -> ChangeSet {
        let old_set = self.section_set(old_doc);
        let new_set = self.section_set(new_doc);
        self.compare_sets(&old_set, &new_set)
    }

    /// Diff two already resolved section sets
    pub fn compare_sets(&self, old_set: &SectionSet, new_set: &SectionSet) -> ChangeSet {
        if old_set.is_empty() && new_set.is_empty() {
            debug!("Both revisions are empty");
            return ChangeSet::default();
        }

        let added = new_set
            .iter()
            .filter(|(fp, _)| !old_set.contains(fp))
            .map(|(_, text)| text.to_string())
            .collect();

        let mut deleted = Vec::new();
        let mut modified = Vec::new();
        for (fp, old_text) in old_set.iter() {
            match new_set.get(fp) {
                None => deleted.push(old_text.to_string()),
                Some(new_text) if new_text != old_text => modified.push(ModifiedSection {
                    old: old_text.to_string(),
                    new: new_text.to_string(),
                    diff: line_diff(old_text, new_text, self.context_lines),
                }),
                Some(_) => {}
            }
        }

        let changes = ChangeSet { added, deleted, modified };
        debug!(
            "Compared {} old / {} new sections: {} added, {} deleted, {} modified",
            old_set.len(),
            new_set.len(),
            changes.added.len(),
            changes.deleted.len(),
            changes.modified.len()
        );
        changes
    }
}

impl Default for ContentDiffer {
    fn default() -> Self {
        let config = Config::default();
        Self {
            segmenter: Segmenter::default(),
            context_lines: config.diff.context_lines,
            collision_policy: config.diff.collision_policy,
        }
    }
}
