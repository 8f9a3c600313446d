//! Action log.

use chrono::{DateTime, Utc};
use rusqlite::{Connection, params};
use serde::Serialize;

use crate::error::Result;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuditEntry {
    pub id: i64,
    pub actor: Option<String>,
    pub action: String,
    pub at: DateTime<Utc>,
}

/// Append one entry.
///
/// # Errors
///
/// Returns an error if the insert fails.
pub fn record(conn: &Connection, actor: Option<&str>, action: &str, at: DateTime<Utc>) -> Result<i64> {
    conn.execute(
        "INSERT INTO action_log (actor, action, at) VALUES (?1, ?2, ?3)",
        params![actor, action, at],
    )?;
    tracing::debug!(actor = actor.unwrap_or("-"), action, "audit");
    Ok(conn.last_insert_rowid())
}

/// The `limit` most recent entries, newest first.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn recent(conn: &Connection, limit: usize) -> Result<Vec<AuditEntry>> {
    let limit = i64::try_from(limit).unwrap_or(i64::MAX);
    let mut stmt = conn.prepare(
        "SELECT entry_id, actor, action, at FROM action_log \
         ORDER BY at DESC, entry_id DESC LIMIT ?1",
    )?;
    let rows = stmt.query_map(params![limit], |row| {
        Ok(AuditEntry {
            id: row.get(0)?,
            actor: row.get(1)?,
            action: row.get(2)?,
            at: row.get(3)?,
        })
    })?;
    let mut entries = Vec::new();
    for row in rows {
        entries.push(row?);
    }
    Ok(entries)
}

/// Stamp the last sanitizer run in `store_meta`.
///
/// # Errors
///
/// Returns an error if the update fails.
pub fn mark_sanitized(conn: &Connection, at: DateTime<Utc>) -> Result<()> {
    conn.execute(
        "UPDATE store_meta SET last_sanitized_at = ?1 WHERE id = 1",
        params![at],
    )?;
    Ok(())
}

/// # Errors
///
/// Returns an error if the query fails.
pub fn last_sanitized_at(conn: &Connection) -> Result<Option<DateTime<Utc>>> {
    Ok(conn.query_row(
        "SELECT last_sanitized_at FROM store_meta WHERE id = 1",
        [],
        |row| row.get(0),
    )?)
}
