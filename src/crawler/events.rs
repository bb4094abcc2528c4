//! Crawl events
//!
//! The coordinator reports progress on an unbounded channel so a presentation
//! layer can update as the crawl runs. Every crawl ends with exactly one
//! terminal event: `Finished`, `Failed`, `Cancelled` or `Aborted`.

use crate::storage::{CrawlError, OriginCredential, ResourceSnapshot};
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};

/// Sending half of the event channel
pub type EventSender = UnboundedSender<CrawlEvent>;

/// Receiving half of the event channel
pub type EventReceiver = UnboundedReceiver<CrawlEvent>;

/// Creates a new event channel
pub fn event_channel() -> (EventSender, EventReceiver) {
    tokio::sync::mpsc::unbounded_channel()
}

/// Progress reported by the coordinator
#[derive(Debug, Clone, PartialEq)]
pub enum CrawlEvent {
    /// A snapshot was upserted; carries the post-merge state
    SnapshotStored(ResourceSnapshot),

    /// A request below the seed failed; the crawl continues
    Error(CrawlError),

    /// A fresh `@odata.etag` for the next conditional request
    EtagRefreshed(String),

    /// The node registry entry of an origin was created or updated
    NodeUpdated(OriginCredential),

    /// All reachable content was retrieved
    Finished,

    /// The seed request failed; nothing was traversed
    Failed(CrawlError),

    /// The crawl stopped on a cancellation signal
    Cancelled,

    /// The crawl stopped on an internal failure, usually the store
    Aborted(String),
}

impl CrawlEvent {
    /// Returns true for the events that end a search
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Finished | Self::Failed(_) | Self::Cancelled | Self::Aborted(_)
        )
    }
}
