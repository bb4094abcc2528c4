//! State module for tracking crawl progress
//!
//! This module provides the in-memory state owned by the crawl coordinator.
//!
//! # Components
//!
//! - `CrawlPhase`: Where the coordinator currently is in a crawl
//! - `CrawlState`: The visited set, cancellation token and originating search of one run

mod crawl_state;
mod phase;

// Re-export main types
pub use crawl_state::CrawlState;
pub use phase::CrawlPhase;
