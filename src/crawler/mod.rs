//! Crawler module for resource fetching and traversal
//!
//! This module contains the core crawling logic, including:
//! - HTTP request execution and outcome classification
//! - Streaming JSON scanning for links and ETags
//! - Depth-first traversal with cycle detection and cancellation
//! - Crawl events and the current result view

mod coordinator;
mod events;
mod fetcher;
mod parser;
mod results;
mod search;

pub use coordinator::{Coordinator, CrawlControl, CrawlReport, SearchOutcome};
pub use events::{event_channel, CrawlEvent, EventReceiver, EventSender};
pub use fetcher::{build_http_client, execute, status_message, status_text, FetchOutcome};
pub use parser::{extract_etag, extract_links, is_json_text, parse_resource, ParsedResource};
pub use results::ResultSet;
pub use search::{HttpMethod, KeyValue, Search, SearchTarget, IF_MATCH};

use crate::config::Config;
use crate::DiverError;

/// Runs a single search against a freshly opened coordinator
///
/// This is the simplest entry point. It will:
/// 1. Open the database named in the configuration
/// 2. Build the HTTP client
/// 3. Run the search, forwarding events to `events` if given
///
/// # Arguments
///
/// * `config` - The application configuration
/// * `search` - The search to run
/// * `events` - Optional event channel
///
/// # Returns
///
/// * `Ok(SearchOutcome)` - The crawl report or filter results
/// * `Err(DiverError)` - Search failed
pub async fn run_search(
    config: Config,
    search: Search,
    events: Option<EventSender>,
) -> Result<SearchOutcome, DiverError> {
    let mut coordinator = Coordinator::open(config)?;
    if let Some(events) = events {
        coordinator = coordinator.with_events(events);
    }
    coordinator.search(search).await
}
