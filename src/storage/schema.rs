//! Database schema definitions
//!
//! This module contains all SQL schema definitions for the Redfish-Diver database.

/// Version written to `PRAGMA user_version` after initialization
pub const SCHEMA_VERSION: u32 = 1;

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- Fetched resources with their previous content generation
CREATE TABLE IF NOT EXISTS snapshots (
    uri TEXT PRIMARY KEY,
    origin TEXT NOT NULL,
    method TEXT NOT NULL,
    request_headers TEXT,
    request_params TEXT,
    json_body TEXT,
    status_code INTEGER NOT NULL,
    response_headers TEXT NOT NULL,
    is_json INTEGER NOT NULL DEFAULT 0,
    content TEXT NOT NULL,
    updated TEXT NOT NULL,
    previous_content TEXT,
    previous_updated TEXT
);

CREATE INDEX IF NOT EXISTS idx_snapshots_origin ON snapshots(origin);

-- Per-origin credentials and notes
CREATE TABLE IF NOT EXISTS nodes (
    origin TEXT PRIMARY KEY,
    username TEXT,
    password TEXT,
    created TEXT NOT NULL,
    updated TEXT NOT NULL,
    plugin TEXT NOT NULL DEFAULT 'None',
    title TEXT,
    summary TEXT,
    note TEXT
);

-- Append-only log of failed requests
CREATE TABLE IF NOT EXISTS crawl_errors (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    created TEXT NOT NULL,
    message TEXT NOT NULL,
    proxy_enabled INTEGER NOT NULL DEFAULT 0,
    method TEXT NOT NULL,
    uri TEXT NOT NULL,
    parent_uri TEXT,
    request_headers TEXT,
    request_params TEXT,
    json_body TEXT,
    status_code INTEGER NOT NULL DEFAULT 0,
    response_headers TEXT NOT NULL,
    content TEXT NOT NULL,
    is_json INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS idx_crawl_errors_uri ON crawl_errors(uri);
"#;

/// Initializes the database schema
///
/// # Arguments
///
/// * `conn` - The database connection
///
/// # Returns
///
/// * `Ok(())` - Schema initialized successfully
/// * `Err(rusqlite::Error)` - Failed to initialize schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    conn.pragma_update(None, "user_version", SCHEMA_VERSION)?;
    Ok(())
}
