use rusqlite::{Connection, OptionalExtension, params};

use crate::error::{MetasError, Result};
use crate::model::Sector;

/// Return the id of the sector named `name`, creating it when missing.
///
/// # Errors
///
/// Returns [`MetasError::InvalidInput`] for a blank name, or a storage error.
pub fn upsert_by_name(conn: &Connection, name: &str) -> Result<i64> {
    let name = name.trim();
    if name.is_empty() {
        return Err(MetasError::InvalidInput("sector name must not be blank".into()));
    }

    conn.execute(
        "INSERT INTO sectors (name) VALUES (?1) ON CONFLICT(name) DO NOTHING",
        params![name],
    )?;
    let id = conn.query_row(
        "SELECT sector_id FROM sectors WHERE name = ?1",
        params![name],
        |row| row.get(0),
    )?;
    Ok(id)
}

/// # Errors
///
/// Returns an error if the query fails.
pub fn get(conn: &Connection, sector_id: i64) -> Result<Option<Sector>> {
    let sector = conn
        .query_row(
            "SELECT sector_id, name, active FROM sectors WHERE sector_id = ?1",
            params![sector_id],
            row_to_sector,
        )
        .optional()?;
    Ok(sector)
}

/// # Errors
///
/// Returns an error if the query fails.
pub fn find_by_name(conn: &Connection, name: &str) -> Result<Option<Sector>> {
    let sector = conn
        .query_row(
            "SELECT sector_id, name, active FROM sectors WHERE name = ?1",
            params![name.trim()],
            row_to_sector,
        )
        .optional()?;
    Ok(sector)
}

/// All sectors ordered by name.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn list(conn: &Connection) -> Result<Vec<Sector>> {
    let mut stmt = conn.prepare("SELECT sector_id, name, active FROM sectors ORDER BY name")?;
    let rows = stmt.query_map([], row_to_sector)?;
    let mut sectors = Vec::new();
    for row in rows {
        sectors.push(row?);
    }
    Ok(sectors)
}

fn row_to_sector(row: &rusqlite::Row<'_>) -> rusqlite::Result<Sector> {
    Ok(Sector {
        id: row.get(0)?,
        name: row.get(1)?,
        active: row.get(2)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_in_memory;

    #[test]
    fn upsert_is_idempotent_by_name() {
        let conn = open_in_memory().expect("db");
        let first = upsert_by_name(&conn, "Finance").expect("insert");
        let again = upsert_by_name(&conn, "  Finance ").expect("reuse");
        assert_eq!(first, again);

        let other = upsert_by_name(&conn, "Sales").expect("insert");
        assert_ne!(first, other);

        let names: Vec<_> = list(&conn).expect("list").into_iter().map(|s| s.name).collect();
        assert_eq!(names, vec!["Finance", "Sales"]);
    }

    #[test]
    fn blank_names_are_rejected() {
        let conn = open_in_memory().expect("db");
        assert!(matches!(
            upsert_by_name(&conn, "   "),
            Err(MetasError::InvalidInput(_))
        ));
    }

    #[test]
    fn lookup_by_id_and_name() {
        let conn = open_in_memory().expect("db");
        let id = upsert_by_name(&conn, "Ops").expect("insert");
        assert_eq!(get(&conn, id).expect("get").map(|s| s.name), Some("Ops".into()));
        assert_eq!(find_by_name(&conn, "Ops").expect("find").map(|s| s.id), Some(id));
        assert!(get(&conn, id + 1).expect("get").is_none());
    }
}
