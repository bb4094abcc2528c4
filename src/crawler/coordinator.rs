//! Crawler coordinator - main crawl orchestration logic
//!
//! This module drives a search from seed to completion, including:
//! - Fetching the seed and aborting the whole search if it fails
//! - Persisting snapshots and updating the node registry
//! - Depth-first descent through extracted links with a visited set
//! - Cancellation between fetches
//! - Keyword filtering of the current results

use crate::config::Config;
use crate::credentials::{CredentialCipher, PassthroughCipher};
use crate::crawler::events::{CrawlEvent, EventSender};
use crate::crawler::fetcher::{build_http_client, execute, FetchOutcome};
use crate::crawler::parser::{parse_resource, ParsedResource};
use crate::crawler::results::ResultSet;
use crate::crawler::search::{Search, SearchTarget};
use crate::state::{CrawlPhase, CrawlState};
use crate::storage::{
    open_shared_storage, CrawlError, ResourceSnapshot, SharedStorage, SqliteStorage, Storage,
    StorageResult,
};
use crate::url::{extract_origin, normalize_uri};
use crate::{DiverError, UrlError};
use chrono::Utc;
use reqwest::Client;
use std::collections::HashSet;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use url::Url;

/// Summary of one crawl
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlReport {
    /// Normalized seed URI
    pub seed: String,
    /// Successful fetches, seed included
    pub fetched: usize,
    /// Failed fetches below the seed
    pub failed: usize,
    /// Links skipped because they were already visited
    pub skipped: usize,
    /// Size of the visited set when the crawl ended
    pub visited: usize,
    /// The crawl stopped on a cancellation signal
    pub cancelled: bool,
}

impl CrawlReport {
    fn new(seed: &Url) -> Self {
        Self {
            seed: seed.to_string(),
            fetched: 0,
            failed: 0,
            skipped: 0,
            visited: 0,
            cancelled: false,
        }
    }
}

/// Result of a search
#[derive(Debug, Clone, PartialEq)]
pub enum SearchOutcome {
    /// The keyword was a URI and was fetched (and possibly dived)
    Crawled(CrawlReport),
    /// The keyword was text; these are the matching results
    Filtered(Vec<ResourceSnapshot>),
}

/// Handle for cancelling the running crawl
///
/// Clones share state. Each crawl arms a fresh token when it starts, so a
/// cancel only ever affects the crawl that is running.
#[derive(Debug, Clone, Default)]
pub struct CrawlControl {
    current: Arc<Mutex<CancellationToken>>,
}

impl CrawlControl {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests that the running crawl stop before its next fetch
    pub fn cancel(&self) {
        if let Ok(token) = self.current.lock() {
            token.cancel();
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.current
            .lock()
            .map(|token| token.is_cancelled())
            .unwrap_or(false)
    }

    fn arm(&self) -> CancellationToken {
        let token = CancellationToken::new();
        if let Ok(mut current) = self.current.lock() {
            *current = token.clone();
        }
        token
    }
}

/// Main crawler coordinator structure
pub struct Coordinator {
    config: Arc<Config>,
    storage: SharedStorage,
    client: Client,
    cipher: Arc<dyn CredentialCipher>,
    events: Option<EventSender>,
    control: CrawlControl,
    results: ResultSet,
    phase: CrawlPhase,
    last_etag: String,
}

impl Coordinator {
    /// Creates a new coordinator instance
    ///
    /// # Arguments
    ///
    /// * `config` - The application configuration
    /// * `storage` - Shared storage for snapshots, nodes and errors
    ///
    /// # Returns
    ///
    /// * `Ok(Coordinator)` - Successfully created coordinator
    /// * `Err(DiverError)` - Failed to build the HTTP client
    pub fn new(config: Config, storage: SharedStorage) -> Result<Self, DiverError> {
        let client = build_http_client(&config)?;

        Ok(Self {
            config: Arc::new(config),
            storage,
            client,
            cipher: Arc::new(PassthroughCipher),
            events: None,
            control: CrawlControl::new(),
            results: ResultSet::new(),
            phase: CrawlPhase::Idle,
            last_etag: String::new(),
        })
    }

    /// Creates a coordinator backed by the database named in the config
    pub fn open(config: Config) -> Result<Self, DiverError> {
        let storage = open_shared_storage(Path::new(&config.storage.database_path))?;
        Self::new(config, storage)
    }

    /// Sends crawl events to the given channel
    pub fn with_events(mut self, events: EventSender) -> Self {
        self.events = Some(events);
        self
    }

    /// Uses the given cipher for stored passwords
    pub fn with_cipher(mut self, cipher: Arc<dyn CredentialCipher>) -> Self {
        self.cipher = cipher;
        self
    }

    /// Returns a handle that can cancel the running crawl
    pub fn control(&self) -> CrawlControl {
        self.control.clone()
    }

    pub fn storage(&self) -> SharedStorage {
        Arc::clone(&self.storage)
    }

    pub fn phase(&self) -> CrawlPhase {
        self.phase
    }

    /// The most recent non-empty `@odata.etag` seen on a seed
    pub fn last_etag(&self) -> &str {
        &self.last_etag
    }

    pub fn results(&self) -> &[ResourceSnapshot] {
        self.results.items()
    }

    pub fn clear_results(&mut self) {
        self.results.clear();
    }

    /// Runs a search
    ///
    /// A keyword starting with `http://` or `https://` is fetched (and dived
    /// into when auto-dive is on and the method is GET). Any other keyword
    /// filters the current results without touching the network.
    ///
    /// # Returns
    ///
    /// * `Ok(SearchOutcome)` - The crawl report or the filtered results
    /// * `Err(DiverError::SeedFailed)` - The seed request failed
    /// * `Err(DiverError)` - Bad URI, or a storage failure that aborted the
    ///   crawl after emitting `CrawlEvent::Aborted`
    pub async fn search(&mut self, search: Search) -> Result<SearchOutcome, DiverError> {
        match search.target()? {
            SearchTarget::Filter(keyword) => {
                debug!("Filtering {} results by {:?}", self.results.len(), keyword);
                Ok(SearchOutcome::Filtered(self.results.filter(&keyword).to_vec()))
            }
            SearchTarget::Resource(seed) => match self.crawl(search, seed).await {
                Ok(report) => Ok(SearchOutcome::Crawled(report)),
                Err(e) => {
                    self.phase = CrawlPhase::Idle;
                    // A failed seed has already sent `Failed`
                    if !matches!(e, DiverError::SeedFailed(_)) {
                        error!("Crawl aborted: {}", e);
                        self.emit(CrawlEvent::Aborted(e.to_string()));
                    }
                    Err(e)
                }
            },
        }
    }

    async fn crawl(&mut self, search: Search, seed: Url) -> Result<CrawlReport, DiverError> {
        let token = self.control.arm();
        let mut report = CrawlReport::new(&seed);

        self.phase = CrawlPhase::Fetching;
        let snapshot = match execute(&self.client, &search, &seed, self.config.proxy.enabled).await {
            FetchOutcome::Success(snapshot) => snapshot,
            FetchOutcome::Failure(error) => {
                self.with_storage(|s| s.append_error(&error))?;
                self.emit(CrawlEvent::Failed(error.clone()));
                return Err(DiverError::SeedFailed(Box::new(error)));
            }
        };
        report.fetched += 1;

        let dives = search.dives();
        if dives {
            self.results.clear();
        }

        self.store_snapshot(&snapshot)?;

        self.phase = CrawlPhase::Extracting;
        let parsed = self.parse(&snapshot, &seed);
        if !parsed.etag.is_empty() {
            self.last_etag = parsed.etag.clone();
            self.emit(CrawlEvent::EtagRefreshed(parsed.etag.clone()));
        }

        let origin = extract_origin(&seed).ok_or(UrlError::MissingHost)?;
        self.register_node(&search, &origin)?;

        if !dives {
            report.visited = 1;
            self.phase = CrawlPhase::Idle;
            self.emit(CrawlEvent::Finished);
            return Ok(report);
        }

        let mut state = CrawlState::new(search, seed.as_str(), token);
        let mut origins = HashSet::from([origin]);

        // Pushed in reverse so links pop in document order
        let mut stack: Vec<(Url, Url)> = parsed
            .links
            .into_iter()
            .rev()
            .map(|link| (link, seed.clone()))
            .collect();

        self.phase = CrawlPhase::Recursing;
        while let Some((uri, parent)) = stack.pop() {
            if state.is_cancelled() {
                info!("Crawl of {} cancelled", seed);
                report.cancelled = true;
                break;
            }

            if !state.mark_visited(uri.as_str()) {
                report.skipped += 1;
                continue;
            }

            let child = state.search().child(&uri, &parent);
            self.phase = CrawlPhase::Fetching;

            match execute(&self.client, &child, &uri, self.config.proxy.enabled).await {
                FetchOutcome::Failure(error) => {
                    report.failed += 1;
                    self.with_storage(|s| s.append_error(&error))?;
                    self.emit(CrawlEvent::Error(error));
                }
                FetchOutcome::Success(snapshot) => {
                    report.fetched += 1;
                    self.store_snapshot(&snapshot)?;

                    if let Some(origin) = extract_origin(&uri) {
                        if !origins.contains(&origin) {
                            self.register_node(state.search(), &origin)?;
                            origins.insert(origin);
                        }
                    }

                    self.phase = CrawlPhase::Extracting;
                    let parsed = self.parse(&snapshot, &uri);
                    for link in parsed.links.into_iter().rev() {
                        stack.push((link, uri.clone()));
                    }
                }
            }

            self.phase = CrawlPhase::Recursing;
        }

        report.visited = state.visited_count();

        if report.cancelled {
            self.phase = CrawlPhase::Cancelled;
            self.emit(CrawlEvent::Cancelled);
        } else {
            info!(
                "Crawl of {} complete: {} fetched, {} failed, {} skipped",
                seed, report.fetched, report.failed, report.skipped
            );
            self.phase = CrawlPhase::Idle;
            self.emit(CrawlEvent::Finished);
        }

        Ok(report)
    }

    fn parse(&self, snapshot: &ResourceSnapshot, uri: &Url) -> ParsedResource {
        let parsed = parse_resource(&snapshot.content, uri);
        if let Some(e) = &parsed.syntax_error {
            warn!("Could not fully parse {}: {}", uri, e);
        }
        parsed
    }

    fn store_snapshot(&mut self, snapshot: &ResourceSnapshot) -> Result<(), DiverError> {
        let stored = self.with_storage(|s| s.upsert_snapshot(snapshot))?;
        if stored.has_previous() {
            debug!("Content of {} changed", stored.uri);
        }
        self.results.replace_or_push(stored.clone());
        self.emit(CrawlEvent::SnapshotStored(stored));
        Ok(())
    }

    fn register_node(&mut self, search: &Search, origin: &str) -> Result<(), DiverError> {
        let password = self.cipher.encrypt(&search.password);
        let node = self.with_storage(|s| {
            s.upsert_node(origin, Some(&search.username), Some(&password), Utc::now())
        })?;
        self.emit(CrawlEvent::NodeUpdated(node));
        Ok(())
    }

    fn emit(&self, event: CrawlEvent) {
        if let Some(events) = &self.events {
            if events.send(event).is_err() {
                debug!("Event receiver dropped");
            }
        }
    }

    fn with_storage<T>(
        &self,
        f: impl FnOnce(&mut SqliteStorage) -> StorageResult<T>,
    ) -> Result<T, DiverError> {
        let mut storage = self
            .storage
            .lock()
            .map_err(|e| DiverError::Storage(format!("Storage lock poisoned: {}", e)))?;
        Ok(f(&mut *storage)?)
    }

    /// Builds a search that repeats the request behind a stored snapshot
    ///
    /// # Returns
    ///
    /// `None` when the snapshot or the node of its origin is missing
    pub fn replay_search(&self, uri: &str) -> Result<Option<Search>, DiverError> {
        let uri = normalize_uri(uri)?;
        let origin = extract_origin(&uri).ok_or(UrlError::MissingHost)?;

        let (snapshot, node) =
            self.with_storage(|s| Ok((s.get_snapshot(uri.as_str())?, s.get_node(&origin)?)))?;

        Ok(match (snapshot, node) {
            (Some(snapshot), Some(node)) => {
                Some(Search::from_snapshot(&snapshot, &node, self.cipher.as_ref()))
            }
            _ => None,
        })
    }

    /// Builds a search that repeats a failed request from the error log
    pub fn replay_error(&self, error: &CrawlError) -> Result<Option<Search>, DiverError> {
        let uri = normalize_uri(&error.uri)?;
        let origin = extract_origin(&uri).ok_or(UrlError::MissingHost)?;

        let node = self.with_storage(|s| s.get_node(&origin))?;
        Ok(node.map(|node| Search::from_crawl_error(error, &node, self.cipher.as_ref())))
    }

    /// Replaces the current results with the stored snapshots of one origin
    pub fn load_origin(&mut self, origin: &str) -> Result<&[ResourceSnapshot], DiverError> {
        let snapshots = self.with_storage(|s| s.get_snapshots_by_origin(origin))?;
        self.results.replace_all(snapshots);
        Ok(self.results.items())
    }

    /// Deletes a node and every snapshot of its origin
    ///
    /// # Returns
    ///
    /// The number of snapshots removed
    pub fn remove_node(&mut self, origin: &str) -> Result<usize, DiverError> {
        let removed = self.with_storage(|s| s.delete_node(origin))?;
        self.results.remove_origin(origin);
        info!("Removed node {} and {} snapshots", origin, removed);
        Ok(removed)
    }
}
