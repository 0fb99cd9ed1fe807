//! In-memory collection of fetched items for one session.
//!
//! Items keep their insertion order. Removal by id is the only in-place
//! mutation and is idempotent. Duplicate ids are not defended against; they
//! can only appear if a fetch capability reuses ids.
//!
//! The scheduler appends while a run is active; callers must not remove items
//! concurrently with a run.

use crate::models::Item;
use tracing::debug;

#[derive(Debug, Default)]
pub struct ResultAccumulator {
    items: Vec<Item>,
}

impl ResultAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a batch in the order given.
    pub fn append(&mut self, items: Vec<Item>) {
        let added = items.len();
        self.items.extend(items);
        debug!(added, total = self.items.len(), "Appended items");
    }

    /// Remove the item with `id`. Returns whether anything was removed.
    pub fn remove(&mut self, id: &str) -> bool {
        let before = self.items.len();
        self.items.retain(|item| item.id != id);
        before != self.items.len()
    }

    /// All items in insertion order.
    pub fn all(&self) -> &[Item] {
        &self.items
    }

    pub fn count(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Drop every item whose source label matches one of `labels`
    /// (case-insensitive). Returns how many were removed.
    pub fn remove_sources(&mut self, labels: &[String]) -> usize {
        let ids: Vec<String> = self
            .items
            .iter()
            .filter(|item| labels.iter().any(|l| l.eq_ignore_ascii_case(&item.source_label)))
            .map(|item| item.id.clone())
            .collect();
        ids.iter().filter(|id| self.remove(id)).count()
    }
}
