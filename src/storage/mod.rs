//! Storage module for persisting crawl data
//!
//! This module handles all database operations for the crawler, including:
//! - SQLite database initialization and schema management
//! - Resource snapshots with two-generation content retention
//! - The per-origin credential registry (nodes)
//! - The append-only crawl error log

mod schema;
mod sqlite;
mod traits;

pub use sqlite::SqliteStorage;
pub use traits::{Storage, StorageError, StorageResult};

use crate::crawler::KeyValue;
use crate::url::extract_origin;
use crate::DiverError;
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use std::path::Path;
use std::sync::{Arc, Mutex};
use url::Url;

/// Storage shared between the crawl coordinator and its callers
pub type SharedStorage = Arc<Mutex<SqliteStorage>>;

/// Initializes or opens a storage database
///
/// # Arguments
///
/// * `path` - Path to the SQLite database file
///
/// # Returns
///
/// * `Ok(SqliteStorage)` - Successfully initialized storage
/// * `Err(DiverError)` - Failed to initialize storage
pub fn open_storage(path: &Path) -> Result<SqliteStorage, DiverError> {
    SqliteStorage::new(path)
}

/// Opens a storage database wrapped for sharing with a coordinator
pub fn open_shared_storage(path: &Path) -> Result<SharedStorage, DiverError> {
    Ok(Arc::new(Mutex::new(SqliteStorage::new(path)?)))
}

/// Computes the hex-encoded SHA-256 digest of a resource body
///
/// Two bodies with the same digest are treated as the same content version.
pub fn content_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    hex::encode(hasher.finalize())
}

/// One fetched resource together with its previous content generation
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceSnapshot {
    /// Normalized absolute URI (unique key)
    pub uri: String,
    /// HTTP method used to obtain the resource
    pub method: String,
    /// Request headers, serialized as a JSON array of `{"Key","Value"}`
    pub request_headers: Option<String>,
    /// Request query parameters, serialized like the headers
    pub request_params: Option<String>,
    pub json_body: Option<String>,
    pub status_code: u16,
    /// Response headers, serialized like the request headers
    pub response_headers: String,
    pub is_json: bool,
    pub content: String,
    pub updated: DateTime<Utc>,
    /// Content before the last change; set only after a second fetch with
    /// different content
    pub previous_content: Option<String>,
    pub previous_updated: Option<DateTime<Utc>>,
}

impl ResourceSnapshot {
    /// Returns the origin this snapshot belongs to
    pub fn origin(&self) -> Option<String> {
        Url::parse(&self.uri).ok().as_ref().and_then(extract_origin)
    }

    /// Returns true once the content has changed at least once
    pub fn has_previous(&self) -> bool {
        self.previous_content.is_some()
    }

    /// Returns the digest of the current content
    pub fn content_hash(&self) -> String {
        content_hash(&self.content)
    }

    /// Decodes the stored request headers
    pub fn request_header_pairs(&self) -> Vec<KeyValue> {
        KeyValue::decode_list(self.request_headers.as_deref())
    }

    /// Decodes the stored request parameters
    pub fn request_param_pairs(&self) -> Vec<KeyValue> {
        KeyValue::decode_list(self.request_params.as_deref())
    }

    /// Decodes the stored response headers
    pub fn response_header_pairs(&self) -> Vec<KeyValue> {
        KeyValue::decode_list(Some(&self.response_headers))
    }
}

/// Credentials and free-text metadata for one origin (a "node")
#[derive(Debug, Clone, PartialEq)]
pub struct OriginCredential {
    /// `scheme://host[:port]` (unique key)
    pub origin: String,
    pub username: Option<String>,
    /// Password as produced by the credential cipher
    pub password: Option<String>,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
    /// Name of the external tool associated with this node
    pub plugin: String,
    pub title: Option<String>,
    pub summary: Option<String>,
    pub note: Option<String>,
}

/// User-editable node metadata
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodeDetails {
    pub plugin: String,
    pub title: Option<String>,
    pub summary: Option<String>,
    pub note: Option<String>,
}

/// Default plugin tag for nodes with no associated tool
pub const NO_PLUGIN: &str = "None";

/// One failed request, as recorded in the error log
#[derive(Debug, Clone, PartialEq)]
pub struct CrawlError {
    pub created: DateTime<Utc>,
    /// Human-readable description of the failure
    pub message: String,
    /// Whether the request went through the configured proxy
    pub proxy_enabled: bool,
    pub method: String,
    pub uri: String,
    /// URI of the resource the failed link was discovered in, if any
    pub parent_uri: Option<String>,
    pub request_headers: Option<String>,
    pub request_params: Option<String>,
    pub json_body: Option<String>,
    /// Response status, or 0 when no response was received
    pub status_code: u16,
    pub response_headers: String,
    pub content: String,
    pub is_json: bool,
}

impl CrawlError {
    /// Returns true if a response was received before the failure
    pub fn has_response(&self) -> bool {
        self.status_code != 0
    }
}
