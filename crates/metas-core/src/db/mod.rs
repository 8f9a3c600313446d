//! SQLite store utilities.
//!
//! Runtime defaults:
//! - `journal_mode = WAL` so readers proceed while a batch writes
//! - `busy_timeout = 5s` to absorb short lock contention between processes
//! - `foreign_keys = ON` so targets and submissions cascade with indicators

pub mod audit;
pub mod indicators;
pub mod migrations;
pub mod schema;
pub mod sectors;
pub mod submissions;
pub mod targets;

use anyhow::{Context, Result};
use rusqlite::{Connection, ToSql, params_from_iter};
use std::{path::Path, time::Duration};

/// Busy timeout used for store connections.
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Conservative bound on bound parameters per statement.
const MAX_BATCH: usize = 500;

/// Open (or create) the store database, apply runtime pragmas, and migrate
/// the schema to the latest version.
///
/// # Errors
///
/// Returns an error if opening/configuring/migrating the database fails.
pub fn open_store(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create store directory {}", parent.display()))?;
    }

    let mut conn =
        Connection::open(path).with_context(|| format!("open store database {}", path.display()))?;

    configure_connection(&conn).context("configure sqlite pragmas")?;
    migrations::migrate(&mut conn).context("apply store migrations")?;

    Ok(conn)
}

/// Open an existing store, returning `None` when the file does not exist.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be opened or migrated.
pub fn try_open_store(path: &Path) -> Result<Option<Connection>> {
    if !path.exists() {
        return Ok(None);
    }
    open_store(path).map(Some)
}

/// In-memory store with the full schema, for tests and dry experiments.
///
/// # Errors
///
/// Returns an error if migrations fail.
pub fn open_in_memory() -> rusqlite::Result<Connection> {
    let mut conn = Connection::open_in_memory()?;
    conn.pragma_update(None, "foreign_keys", "ON")?;
    migrations::migrate(&mut conn)?;
    Ok(conn)
}

fn configure_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.pragma_update(None, "foreign_keys", "ON")?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    let _journal_mode: String =
        conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))?;
    conn.busy_timeout(DEFAULT_BUSY_TIMEOUT)?;
    Ok(())
}

/// Run `DELETE FROM {table} WHERE {id_column} IN (...)` over `ids` in
/// batches, returning the number of rows removed.
pub(crate) fn delete_by_ids(
    conn: &Connection,
    table: &str,
    id_column: &str,
    ids: &[i64],
) -> rusqlite::Result<usize> {
    update_by_ids(conn, &format!("DELETE FROM {table}"), id_column, ids, &[])
}

/// Run `{head} WHERE {id_column} IN (...)` over `ids` in batches.
///
/// `leading` parameters bind before the id list (e.g. `SET value = ?1`).
pub(crate) fn update_by_ids(
    conn: &Connection,
    head: &str,
    id_column: &str,
    ids: &[i64],
    leading: &[&dyn ToSql],
) -> rusqlite::Result<usize> {
    let mut affected = 0;
    for chunk in ids.chunks(MAX_BATCH) {
        let placeholders = (0..chunk.len())
            .map(|i| format!("?{}", i + leading.len() + 1))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!("{head} WHERE {id_column} IN ({placeholders})");
        let params = leading
            .iter()
            .copied()
            .chain(chunk.iter().map(|id| id as &dyn ToSql));
        affected += conn.execute(&sql, params_from_iter(params))?;
    }
    Ok(affected)
}

#[cfg(test)]
mod tests {
    use super::{DEFAULT_BUSY_TIMEOUT, open_store, try_open_store};
    use crate::db::migrations;
    use tempfile::TempDir;

    fn temp_db_path() -> (TempDir, std::path::PathBuf) {
        let dir = tempfile::tempdir().expect("create temp dir");
        let path = dir.path().join(".metas/metas.db");
        (dir, path)
    }

    #[test]
    fn open_store_sets_wal_busy_timeout_and_fk() {
        let (_dir, path) = temp_db_path();
        let conn = open_store(&path).expect("open store db");

        let journal_mode: String = conn
            .pragma_query_value(None, "journal_mode", |row| row.get(0))
            .expect("query journal_mode");
        assert_eq!(journal_mode.to_ascii_lowercase(), "wal");

        let busy_timeout_ms: u64 = conn
            .pragma_query_value(None, "busy_timeout", |row| row.get(0))
            .expect("query busy_timeout");
        assert_eq!(
            u128::from(busy_timeout_ms),
            DEFAULT_BUSY_TIMEOUT.as_millis()
        );

        let foreign_keys: i64 = conn
            .pragma_query_value(None, "foreign_keys", |row| row.get(0))
            .expect("query foreign_keys");
        assert_eq!(foreign_keys, 1);
    }

    #[test]
    fn open_store_runs_migrations() {
        let (_dir, path) = temp_db_path();
        let conn = open_store(&path).expect("open store db");

        let version = migrations::current_schema_version(&conn).expect("schema version query");
        assert_eq!(version, migrations::LATEST_SCHEMA_VERSION);
    }

    #[test]
    fn try_open_store_missing_file_is_none() {
        let (_dir, path) = temp_db_path();
        assert!(try_open_store(&path).expect("no error").is_none());
        assert!(!path.exists());
    }
}
