//! Storage traits and error types
//!
//! This module defines the trait interface for storage backends and
//! associated error types.

use crate::storage::{CrawlError, NodeDetails, OriginCredential, ResourceSnapshot};
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Node not found: {0}")]
    NodeNotFound(String),

    #[error("Invalid resource URI: {0}")]
    InvalidUri(String),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for storage backend implementations
///
/// This trait defines all database operations needed by the crawler.
/// Writes are last-writer-wins per key.
pub trait Storage {
    // ===== Content Store =====

    /// Inserts a snapshot or merges it into the stored one
    ///
    /// On first sight of `snapshot.uri` the snapshot is stored as-is, with no
    /// previous generation. Otherwise the content digests are compared: if
    /// they differ the stored content and timestamp move to the previous
    /// slots before the new content is written; if they match only the
    /// timestamp (and request/response metadata) is refreshed.
    ///
    /// # Returns
    ///
    /// The snapshot as stored after the merge
    fn upsert_snapshot(&mut self, snapshot: &ResourceSnapshot) -> StorageResult<ResourceSnapshot>;

    /// Gets a snapshot by its exact URI
    fn get_snapshot(&self, uri: &str) -> StorageResult<Option<ResourceSnapshot>>;

    /// Gets every snapshot belonging to an origin, in insertion order
    fn get_snapshots_by_origin(&self, origin: &str) -> StorageResult<Vec<ResourceSnapshot>>;

    /// Deletes every snapshot belonging to an origin
    ///
    /// # Returns
    ///
    /// The number of snapshots removed
    fn delete_snapshots_by_origin(&mut self, origin: &str) -> StorageResult<usize>;

    // ===== Node Registry =====

    /// Updates the credentials of an origin, creating the node if needed
    ///
    /// A new node gets `timestamp` as both its created and updated time.
    fn upsert_node(
        &mut self,
        origin: &str,
        username: Option<&str>,
        password: Option<&str>,
        timestamp: DateTime<Utc>,
    ) -> StorageResult<OriginCredential>;

    /// Gets a node by origin
    fn get_node(&self, origin: &str) -> StorageResult<Option<OriginCredential>>;

    /// Lists all nodes ordered by origin
    fn list_nodes(&self) -> StorageResult<Vec<OriginCredential>>;

    /// Replaces the editable metadata of an existing node
    fn update_node_details(
        &mut self,
        origin: &str,
        details: &NodeDetails,
        timestamp: DateTime<Utc>,
    ) -> StorageResult<OriginCredential>;

    /// Deletes a node together with all snapshots of its origin
    ///
    /// # Returns
    ///
    /// The number of snapshots removed along with the node
    fn delete_node(&mut self, origin: &str) -> StorageResult<usize>;

    // ===== Error Log =====

    /// Appends an entry to the error log
    fn append_error(&mut self, error: &CrawlError) -> StorageResult<i64>;

    /// Lists the error log, oldest first
    fn list_errors(&self) -> StorageResult<Vec<CrawlError>>;

    /// Clears the error log
    fn clear_errors(&mut self) -> StorageResult<usize>;

    // ===== Statistics =====

    /// Gets total snapshot count
    fn count_snapshots(&self) -> StorageResult<u64>;

    /// Counts snapshots holding a previous content generation
    fn count_changed_snapshots(&self) -> StorageResult<u64>;

    /// Counts snapshots per origin, ordered by origin
    fn count_snapshots_per_origin(&self) -> StorageResult<Vec<(String, u64)>>;

    /// Gets total node count
    fn count_nodes(&self) -> StorageResult<u64>;

    /// Gets the number of entries in the error log
    fn count_errors(&self) -> StorageResult<u64>;
}
