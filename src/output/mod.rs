//! Output module for presenting crawl results
//!
//! This module handles:
//! - Formatting crawl events, nodes and error log entries for the console
//! - Recording store statistics

pub mod console;
pub mod stats;

pub use console::{format_event, format_report, print_errors, print_nodes};
pub use stats::{load_statistics, print_statistics, StoreStatistics};
