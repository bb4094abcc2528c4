//! Redfish-Diver: a resource-graph crawler for hypermedia REST APIs
//!
//! This crate walks Redfish/OData-style services by following the `@odata.id`
//! and `href` links embedded in their JSON bodies, persisting every fetched
//! resource together with its previous version so content drift can be
//! surfaced.

pub mod config;
pub mod crawler;
pub mod credentials;
pub mod output;
pub mod state;
pub mod storage;
pub mod url;

use thiserror::Error;

/// Main error type for Redfish-Diver operations
#[derive(Debug, Error)]
pub enum DiverError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The seed request of a crawl failed; nothing was traversed
    #[error("Crawl failed at {}: {}", .0.uri, .0.message)]
    SeedFailed(Box<storage::CrawlError>),

    #[error("Storage error: {0}")]
    StorageError(#[from] storage::StorageError),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("URL error: {0}")]
    UrlError(#[from] UrlError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Credential key error: {0}")]
    CredentialKey(String),

    #[error("Unsupported HTTP method: {0}")]
    UnsupportedMethod(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage error: {0}")]
    Storage(String),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing host in URL")]
    MissingHost,
}

/// Result type alias for Redfish-Diver operations
pub type Result<T> = std::result::Result<T, DiverError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{
    Coordinator, CrawlControl, CrawlEvent, CrawlReport, HttpMethod, Search, SearchOutcome,
};
pub use state::CrawlPhase;
pub use storage::{CrawlError, OriginCredential, ResourceSnapshot};
pub use url::{extract_origin, normalize_uri};
