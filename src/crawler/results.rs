//! Current result view
//!
//! Holds the snapshots the last crawl produced, plus the baseline that text
//! filters run against. Filtering a filtered view keeps using the baseline
//! captured before the first filter.

use crate::storage::ResourceSnapshot;

#[derive(Debug, Default)]
pub struct ResultSet {
    items: Vec<ResourceSnapshot>,
    baseline: Option<Vec<ResourceSnapshot>>,
}

impl ResultSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn items(&self) -> &[ResourceSnapshot] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Empties the view and drops any filter baseline
    pub fn clear(&mut self) {
        self.items.clear();
        self.baseline = None;
    }

    /// Replaces the view with the given snapshots
    pub fn replace_all(&mut self, items: Vec<ResourceSnapshot>) {
        self.items = items;
        self.baseline = None;
    }

    /// Adds a snapshot, replacing the entry with the same URI in place
    pub fn replace_or_push(&mut self, snapshot: ResourceSnapshot) {
        self.reset_filter();
        match self.items.iter_mut().find(|s| s.uri == snapshot.uri) {
            Some(existing) => *existing = snapshot,
            None => self.items.push(snapshot),
        }
    }

    /// Drops every entry belonging to an origin
    pub fn remove_origin(&mut self, origin: &str) {
        let keep = |s: &ResourceSnapshot| s.origin().as_deref() != Some(origin);
        self.items.retain(keep);
        if let Some(baseline) = self.baseline.as_mut() {
            baseline.retain(keep);
        }
    }

    /// Filters the baseline by a case-insensitive substring of the content
    ///
    /// The first filter captures the current view as baseline. Order is
    /// preserved.
    pub fn filter(&mut self, keyword: &str) -> &[ResourceSnapshot] {
        let baseline = self.baseline.get_or_insert_with(|| self.items.clone());
        let needle = keyword.to_lowercase();
        self.items = baseline
            .iter()
            .filter(|s| s.content.to_lowercase().contains(&needle))
            .cloned()
            .collect();
        &self.items
    }

    /// Restores the unfiltered view, if a filter is active
    pub fn reset_filter(&mut self) {
        if let Some(baseline) = self.baseline.take() {
            self.items = baseline;
        }
    }

    pub fn is_filtered(&self) -> bool {
        self.baseline.is_some()
    }
}
