use crate::crawler::Search;
use std::collections::HashSet;
use tokio_util::sync::CancellationToken;

/// In-memory state of one auto-dive run
///
/// Owned by the coordinator for the duration of a single top-level search and
/// dropped when the run ends. The visited set is keyed by normalized absolute
/// URI, so equivalent links written in different relative forms collapse to
/// one entry.
#[derive(Debug)]
pub struct CrawlState {
    visited: HashSet<String>,
    token: CancellationToken,
    search: Search,
}

impl CrawlState {
    /// Creates the state for a run whose seed has already been fetched
    ///
    /// # Arguments
    ///
    /// * `search` - The originating search
    /// * `seed` - Normalized seed URI, marked visited up front
    /// * `token` - Cancellation token armed for this run
    pub fn new(search: Search, seed: &str, token: CancellationToken) -> Self {
        let mut visited = HashSet::new();
        visited.insert(seed.to_string());
        Self {
            visited,
            token,
            search,
        }
    }

    /// Marks a URI as visited
    ///
    /// # Returns
    ///
    /// `true` if the URI was not visited before (the caller should fetch it)
    pub fn mark_visited(&mut self, uri: &str) -> bool {
        self.visited.insert(uri.to_string())
    }

    pub fn is_visited(&self, uri: &str) -> bool {
        self.visited.contains(uri)
    }

    pub fn visited_count(&self) -> usize {
        self.visited.len()
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn search(&self) -> &Search {
        &self.search
    }
}
