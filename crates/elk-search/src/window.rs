//! Sliding window of recently displayed entries.

use std::collections::VecDeque;

use tracing::trace;

use crate::types::DisplayedEntry;

/// Insertion-ordered record of displayed entries.
///
/// Follow-up polls re-read a short overlap before the last timestamp; the ids
/// held here are excluded from those polls so nothing is printed twice.
#[derive(Debug, Clone, Default)]
pub struct DedupWindow {
    entries: VecDeque<DisplayedEntry>,
}

impl DedupWindow {
    /// Creates an empty window.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an entry at the newest end.
    pub fn push(&mut self, entry: DisplayedEntry) {
        self.entries.push_back(entry);
    }

    /// Drops entries older than `cutoff` from the oldest end.
    ///
    /// Stops at the first entry that is not older, and never removes the
    /// last remaining entry. Returns the number of entries removed.
    pub fn drain_older_than(&mut self, cutoff: &str) -> usize {
        let mut removed = 0;
        while self.entries.len() > 1 {
            match self.entries.front() {
                Some(oldest) if oldest.is_before(cutoff) => {
                    self.entries.pop_front();
                    removed += 1;
                }
                _ => break,
            }
        }
        trace!(removed, remaining = self.entries.len(), cutoff, "drained window");
        removed
    }

    /// Ids of all entries, oldest first.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|entry| entry.id.as_str())
    }

    /// Returns true if an entry with `id` is held.
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.entries.iter().any(|entry| entry.id == id)
    }

    /// Number of held entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the window is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
