/// Phase definitions for tracking crawl progress
use std::fmt;

/// Represents the coordinator's position in the crawl state machine
///
/// A crawl moves `Idle → Fetching → (Extracting → Recursing)* → Idle`.
/// `Cancelled` is reachable from any phase of a running traversal and stays
/// until the next crawl starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CrawlPhase {
    /// No crawl is running
    #[default]
    Idle,

    /// A request is in flight
    Fetching,

    /// Links and the ETag are being pulled from a fetched body
    Extracting,

    /// Descending into the links of a fetched resource
    Recursing,

    /// The last crawl stopped on a cancellation signal
    Cancelled,
}

impl CrawlPhase {
    /// Returns true while a traversal is in progress
    pub fn is_running(&self) -> bool {
        matches!(self, Self::Fetching | Self::Extracting | Self::Recursing)
    }

    /// Returns the lowercase name of the phase
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Fetching => "fetching",
            Self::Extracting => "extracting",
            Self::Recursing => "recursing",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for CrawlPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
