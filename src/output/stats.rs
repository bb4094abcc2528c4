//! Statistics generation from the content store
//!
//! This module provides functionality for extracting and displaying
//! statistics about stored snapshots, nodes and logged errors.

use crate::storage::Storage;
use crate::DiverError;

/// Store statistics summary
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreStatistics {
    /// Total number of stored snapshots
    pub total_snapshots: u64,

    /// Snapshots whose content changed at least once
    pub changed_snapshots: u64,

    /// Number of registered nodes
    pub total_nodes: u64,

    /// Entries in the error log
    pub total_errors: u64,

    /// Snapshot count per origin, ordered by origin
    pub snapshots_by_origin: Vec<(String, u64)>,
}

/// Loads statistics from storage
///
/// # Arguments
///
/// * `storage` - The storage backend to query
///
/// # Returns
///
/// * `Ok(StoreStatistics)` - Successfully loaded statistics
/// * `Err(DiverError)` - Failed to query statistics
pub fn load_statistics(storage: &dyn Storage) -> Result<StoreStatistics, DiverError> {
    Ok(StoreStatistics {
        total_snapshots: storage.count_snapshots()?,
        changed_snapshots: storage.count_changed_snapshots()?,
        total_nodes: storage.count_nodes()?,
        total_errors: storage.count_errors()?,
        snapshots_by_origin: storage.count_snapshots_per_origin()?,
    })
}

/// Prints statistics to stdout in a formatted manner
///
/// # Arguments
///
/// * `stats` - The statistics to display
pub fn print_statistics(stats: &StoreStatistics) {
    println!("=== Store Statistics ===\n");

    println!("Overview:");
    println!("  Snapshots: {}", stats.total_snapshots);
    println!("  Nodes: {}", stats.total_nodes);
    println!("  Logged errors: {}", stats.total_errors);
    println!();

    if !stats.snapshots_by_origin.is_empty() {
        println!("Snapshots by Origin:");
        for (origin, count) in &stats.snapshots_by_origin {
            println!("  {}: {}", origin, count);
        }
        println!();
    }

    let change_rate = if stats.total_snapshots > 0 {
        (stats.changed_snapshots as f64 / stats.total_snapshots as f64) * 100.0
    } else {
        0.0
    };

    println!(
        "Changed Content: {:.1}% ({} / {} snapshots hold a previous version)",
        change_rate, stats.changed_snapshots, stats.total_snapshots
    );
}
