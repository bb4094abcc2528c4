//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the Storage trait.

use crate::storage::schema::initialize_schema;
use crate::storage::traits::{Storage, StorageError, StorageResult};
use crate::storage::{CrawlError, NodeDetails, OriginCredential, ResourceSnapshot, NO_PLUGIN};
use crate::DiverError;
use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;

const SNAPSHOT_COLUMNS: &str = "uri, method, request_headers, request_params, json_body, \
     status_code, response_headers, is_json, content, updated, previous_content, previous_updated";

const NODE_COLUMNS: &str =
    "origin, username, password, created, updated, plugin, title, summary, note";

const ERROR_COLUMNS: &str = "created, message, proxy_enabled, method, uri, parent_uri, \
     request_headers, request_params, json_body, status_code, response_headers, content, is_json";

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Creates a new SqliteStorage instance
    ///
    /// Missing parent directories are created.
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStorage)` - Successfully opened/created database
    /// * `Err(DiverError)` - Failed to open database
    pub fn new(path: &Path) -> Result<Self, DiverError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database (for testing)
    #[cfg(test)]
    pub fn new_in_memory() -> Result<Self, DiverError> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }
}

fn parse_timestamp(idx: usize, value: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn parse_optional_timestamp(idx: usize, value: Option<String>) -> rusqlite::Result<Option<DateTime<Utc>>> {
    value.map(|s| parse_timestamp(idx, &s)).transpose()
}

fn snapshot_from_row(row: &Row<'_>) -> rusqlite::Result<ResourceSnapshot> {
    Ok(ResourceSnapshot {
        uri: row.get(0)?,
        method: row.get(1)?,
        request_headers: row.get(2)?,
        request_params: row.get(3)?,
        json_body: row.get(4)?,
        status_code: row.get(5)?,
        response_headers: row.get(6)?,
        is_json: row.get(7)?,
        content: row.get(8)?,
        updated: parse_timestamp(9, &row.get::<_, String>(9)?)?,
        previous_content: row.get(10)?,
        previous_updated: parse_optional_timestamp(11, row.get(11)?)?,
    })
}

fn node_from_row(row: &Row<'_>) -> rusqlite::Result<OriginCredential> {
    Ok(OriginCredential {
        origin: row.get(0)?,
        username: row.get(1)?,
        password: row.get(2)?,
        created: parse_timestamp(3, &row.get::<_, String>(3)?)?,
        updated: parse_timestamp(4, &row.get::<_, String>(4)?)?,
        plugin: row.get(5)?,
        title: row.get(6)?,
        summary: row.get(7)?,
        note: row.get(8)?,
    })
}

fn error_from_row(row: &Row<'_>) -> rusqlite::Result<CrawlError> {
    Ok(CrawlError {
        created: parse_timestamp(0, &row.get::<_, String>(0)?)?,
        message: row.get(1)?,
        proxy_enabled: row.get(2)?,
        method: row.get(3)?,
        uri: row.get(4)?,
        parent_uri: row.get(5)?,
        request_headers: row.get(6)?,
        request_params: row.get(7)?,
        json_body: row.get(8)?,
        status_code: row.get(9)?,
        response_headers: row.get(10)?,
        content: row.get(11)?,
        is_json: row.get(12)?,
    })
}

/// Merges an incoming snapshot into the stored one, if any
fn merge_snapshot(stored: Option<ResourceSnapshot>, incoming: &ResourceSnapshot) -> ResourceSnapshot {
    let mut merged = incoming.clone();
    match stored {
        None => {
            merged.previous_content = None;
            merged.previous_updated = None;
        }
        Some(stored) if stored.content_hash() != incoming.content_hash() => {
            merged.previous_content = Some(stored.content);
            merged.previous_updated = Some(stored.updated);
        }
        Some(stored) => {
            merged.previous_content = stored.previous_content;
            merged.previous_updated = stored.previous_updated;
        }
    }
    merged
}

impl Storage for SqliteStorage {
    // ===== Content Store =====

    fn upsert_snapshot(&mut self, snapshot: &ResourceSnapshot) -> StorageResult<ResourceSnapshot> {
        let origin = snapshot
            .origin()
            .ok_or_else(|| StorageError::InvalidUri(snapshot.uri.clone()))?;

        let tx = self.conn.transaction()?;

        let stored = tx
            .query_row(
                &format!("SELECT {} FROM snapshots WHERE uri = ?1", SNAPSHOT_COLUMNS),
                params![snapshot.uri],
                snapshot_from_row,
            )
            .optional()?;

        let merged = merge_snapshot(stored, snapshot);

        tx.execute(
            "INSERT INTO snapshots (uri, origin, method, request_headers, request_params, json_body,
                                    status_code, response_headers, is_json, content, updated,
                                    previous_content, previous_updated)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
             ON CONFLICT(uri) DO UPDATE SET
                method = excluded.method,
                request_headers = excluded.request_headers,
                request_params = excluded.request_params,
                json_body = excluded.json_body,
                status_code = excluded.status_code,
                response_headers = excluded.response_headers,
                is_json = excluded.is_json,
                content = excluded.content,
                updated = excluded.updated,
                previous_content = excluded.previous_content,
                previous_updated = excluded.previous_updated",
            params![
                merged.uri,
                origin,
                merged.method,
                merged.request_headers,
                merged.request_params,
                merged.json_body,
                merged.status_code,
                merged.response_headers,
                merged.is_json,
                merged.content,
                merged.updated.to_rfc3339(),
                merged.previous_content,
                merged.previous_updated.map(|t| t.to_rfc3339()),
            ],
        )?;

        tx.commit()?;
        Ok(merged)
    }

    fn get_snapshot(&self, uri: &str) -> StorageResult<Option<ResourceSnapshot>> {
        let snapshot = self
            .conn
            .query_row(
                &format!("SELECT {} FROM snapshots WHERE uri = ?1", SNAPSHOT_COLUMNS),
                params![uri],
                snapshot_from_row,
            )
            .optional()?;
        Ok(snapshot)
    }

    fn get_snapshots_by_origin(&self, origin: &str) -> StorageResult<Vec<ResourceSnapshot>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM snapshots WHERE origin = ?1 ORDER BY rowid",
            SNAPSHOT_COLUMNS
        ))?;

        let snapshots = stmt
            .query_map(params![origin], snapshot_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(snapshots)
    }

    fn delete_snapshots_by_origin(&mut self, origin: &str) -> StorageResult<usize> {
        let removed = self
            .conn
            .execute("DELETE FROM snapshots WHERE origin = ?1", params![origin])?;
        Ok(removed)
    }

    // ===== Node Registry =====

    fn upsert_node(
        &mut self,
        origin: &str,
        username: Option<&str>,
        password: Option<&str>,
        timestamp: DateTime<Utc>,
    ) -> StorageResult<OriginCredential> {
        self.conn.execute(
            "INSERT INTO nodes (origin, username, password, created, updated, plugin)
             VALUES (?1, ?2, ?3, ?4, ?4, ?5)
             ON CONFLICT(origin) DO UPDATE SET
                username = excluded.username,
                password = excluded.password,
                updated = excluded.updated",
            params![origin, username, password, timestamp.to_rfc3339(), NO_PLUGIN],
        )?;

        self.get_node(origin)?
            .ok_or_else(|| StorageError::NodeNotFound(origin.to_string()))
    }

    fn get_node(&self, origin: &str) -> StorageResult<Option<OriginCredential>> {
        let node = self
            .conn
            .query_row(
                &format!("SELECT {} FROM nodes WHERE origin = ?1", NODE_COLUMNS),
                params![origin],
                node_from_row,
            )
            .optional()?;
        Ok(node)
    }

    fn list_nodes(&self) -> StorageResult<Vec<OriginCredential>> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {} FROM nodes ORDER BY origin", NODE_COLUMNS))?;

        let nodes = stmt
            .query_map([], node_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(nodes)
    }

    fn update_node_details(
        &mut self,
        origin: &str,
        details: &NodeDetails,
        timestamp: DateTime<Utc>,
    ) -> StorageResult<OriginCredential> {
        let changed = self.conn.execute(
            "UPDATE nodes SET plugin = ?2, title = ?3, summary = ?4, note = ?5, updated = ?6
             WHERE origin = ?1",
            params![
                origin,
                details.plugin,
                details.title,
                details.summary,
                details.note,
                timestamp.to_rfc3339()
            ],
        )?;

        if changed == 0 {
            return Err(StorageError::NodeNotFound(origin.to_string()));
        }

        self.get_node(origin)?
            .ok_or_else(|| StorageError::NodeNotFound(origin.to_string()))
    }

    fn delete_node(&mut self, origin: &str) -> StorageResult<usize> {
        let tx = self.conn.transaction()?;

        let removed_nodes = tx.execute("DELETE FROM nodes WHERE origin = ?1", params![origin])?;
        if removed_nodes == 0 {
            return Err(StorageError::NodeNotFound(origin.to_string()));
        }

        let removed_snapshots =
            tx.execute("DELETE FROM snapshots WHERE origin = ?1", params![origin])?;

        tx.commit()?;
        Ok(removed_snapshots)
    }

    // ===== Error Log =====

    fn append_error(&mut self, error: &CrawlError) -> StorageResult<i64> {
        self.conn.execute(
            &format!(
                "INSERT INTO crawl_errors ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
                ERROR_COLUMNS
            ),
            params![
                error.created.to_rfc3339(),
                error.message,
                error.proxy_enabled,
                error.method,
                error.uri,
                error.parent_uri,
                error.request_headers,
                error.request_params,
                error.json_body,
                error.status_code,
                error.response_headers,
                error.content,
                error.is_json,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn list_errors(&self) -> StorageResult<Vec<CrawlError>> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {} FROM crawl_errors ORDER BY id", ERROR_COLUMNS))?;

        let errors = stmt
            .query_map([], error_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(errors)
    }

    fn clear_errors(&mut self) -> StorageResult<usize> {
        let removed = self.conn.execute("DELETE FROM crawl_errors", [])?;
        Ok(removed)
    }

    // ===== Statistics =====

    fn count_snapshots(&self) -> StorageResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM snapshots", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    fn count_changed_snapshots(&self) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM snapshots WHERE previous_content IS NOT NULL",
            [],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn count_snapshots_per_origin(&self) -> StorageResult<Vec<(String, u64)>> {
        let mut stmt = self.conn.prepare(
            "SELECT origin, COUNT(*) FROM snapshots GROUP BY origin ORDER BY origin",
        )?;

        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;

        let mut counts = Vec::new();
        for row in rows {
            let (origin, count) = row?;
            counts.push((origin, count as u64));
        }

        Ok(counts)
    }

    fn count_nodes(&self) -> StorageResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM nodes", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    fn count_errors(&self) -> StorageResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM crawl_errors", [], |row| row.get(0))?;
        Ok(count as u64)
    }
}
