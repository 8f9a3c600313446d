//! Indicator rows.
//!
//! Stored periodicity is read through [`Periodicity::clamped`]; rows written
//! before the 1..=12 check existed still load and behave as in-range values.

use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, ToSql, params, params_from_iter};

use crate::error::Result;
use crate::model::{Indicator, Periodicity, TargetDirection, ValueKind};

const SELECT_COLUMNS: &str = "SELECT indicator_id, name, sector_id, direction, target_value, \
     value_kind, start_month, end_month, periodicity, active, visible, instructions, created_on \
     FROM indicators";

/// Filter for [`list`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IndicatorFilter {
    pub active_only: bool,
    pub id: Option<i64>,
    pub sector_id: Option<i64>,
}

impl IndicatorFilter {
    #[must_use]
    pub fn active() -> Self {
        Self {
            active_only: true,
            ..Self::default()
        }
    }
}

/// Insert `indicator` (its `id` is ignored) and return the new id.
///
/// # Errors
///
/// Returns an error if the insert fails, e.g. on an unknown sector.
pub fn insert(conn: &Connection, indicator: &Indicator) -> Result<i64> {
    conn.execute(
        "INSERT INTO indicators (name, sector_id, direction, target_value, value_kind, \
         start_month, end_month, periodicity, active, visible, instructions, created_on) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
        params![
            indicator.name,
            indicator.sector_id,
            indicator.direction.as_str(),
            indicator.target_value,
            indicator.value_kind.as_str(),
            indicator.start_month,
            indicator.end_month,
            i64::from(indicator.periodicity.months()),
            indicator.active,
            indicator.visible,
            indicator.instructions,
            indicator.created_on,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Overwrite every column of the row identified by `indicator.id`.
///
/// Returns `false` when no such row exists.
///
/// # Errors
///
/// Returns an error if the update fails.
pub fn update(conn: &Connection, indicator: &Indicator) -> Result<bool> {
    let changed = conn.execute(
        "UPDATE indicators SET name = ?1, sector_id = ?2, direction = ?3, target_value = ?4, \
         value_kind = ?5, start_month = ?6, end_month = ?7, periodicity = ?8, active = ?9, \
         visible = ?10, instructions = ?11 \
         WHERE indicator_id = ?12",
        params![
            indicator.name,
            indicator.sector_id,
            indicator.direction.as_str(),
            indicator.target_value,
            indicator.value_kind.as_str(),
            indicator.start_month,
            indicator.end_month,
            i64::from(indicator.periodicity.months()),
            indicator.active,
            indicator.visible,
            indicator.instructions,
            indicator.id,
        ],
    )?;
    Ok(changed > 0)
}

/// # Errors
///
/// Returns an error if the query fails or a stored enum value is unknown.
pub fn get(conn: &Connection, indicator_id: i64) -> Result<Option<Indicator>> {
    let sql = format!("{SELECT_COLUMNS} WHERE indicator_id = ?1");
    let indicator = conn
        .query_row(&sql, params![indicator_id], row_to_indicator)
        .optional()?;
    Ok(indicator)
}

fn select_sql(filter: IndicatorFilter) -> (String, Vec<Box<dyn ToSql>>) {
    let mut conditions: Vec<String> = Vec::new();
    let mut values: Vec<Box<dyn ToSql>> = Vec::new();

    if filter.active_only {
        conditions.push("active = 1".to_string());
    }
    if let Some(id) = filter.id {
        values.push(Box::new(id));
        conditions.push(format!("indicator_id = ?{}", values.len()));
    }
    if let Some(sector_id) = filter.sector_id {
        values.push(Box::new(sector_id));
        conditions.push(format!("sector_id = ?{}", values.len()));
    }

    let mut sql = SELECT_COLUMNS.to_string();
    if !conditions.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&conditions.join(" AND "));
    }
    sql.push_str(" ORDER BY indicator_id");
    (sql, values)
}

/// Indicators matching `filter`, ordered by id.
///
/// # Errors
///
/// Returns an error if the query fails or a stored enum value is unknown.
pub fn list(conn: &Connection, filter: IndicatorFilter) -> Result<Vec<Indicator>> {
    let (sql, values) = select_sql(filter);
    let params_ref: Vec<&dyn ToSql> = values.iter().map(AsRef::as_ref).collect();
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params_from_iter(params_ref), row_to_indicator)?;
    let mut indicators = Vec::new();
    for row in rows {
        indicators.push(row?);
    }
    Ok(indicators)
}

/// Rows loaded by [`list_decodable`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecodedIndicators {
    pub indicators: Vec<Indicator>,
    /// Ids of rows whose columns could not be decoded.
    pub undecodable: Vec<i64>,
}

/// Like [`list`], but a row that fails to decode (an impossible stored
/// month, an unknown enum value) is logged and reported by id instead of
/// failing the whole listing. Batch jobs use this.
///
/// # Errors
///
/// Returns an error if the query itself fails.
pub fn list_decodable(conn: &Connection, filter: IndicatorFilter) -> Result<DecodedIndicators> {
    let (sql, values) = select_sql(filter);
    let params_ref: Vec<&dyn ToSql> = values.iter().map(AsRef::as_ref).collect();
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params_from_iter(params_ref), |row| {
        Ok((row.get::<_, i64>(0)?, row_to_indicator(row)))
    })?;

    let mut decoded = DecodedIndicators::default();
    for row in rows {
        match row? {
            (_, Ok(indicator)) => decoded.indicators.push(indicator),
            (indicator_id, Err(err)) => {
                tracing::warn!(indicator_id, error = %err, "undecodable indicator row, skipping");
                decoded.undecodable.push(indicator_id);
            }
        }
    }
    Ok(decoded)
}

/// Delete one indicator. Targets and submissions cascade.
///
/// Returns `false` when no such row exists.
///
/// # Errors
///
/// Returns an error if the delete fails.
pub fn delete(conn: &Connection, indicator_id: i64) -> Result<bool> {
    let removed = conn.execute(
        "DELETE FROM indicators WHERE indicator_id = ?1",
        params![indicator_id],
    )?;
    Ok(removed > 0)
}

fn row_to_indicator(row: &rusqlite::Row<'_>) -> rusqlite::Result<Indicator> {
    let direction: String = row.get(3)?;
    let value_kind: String = row.get(5)?;
    let periodicity: i64 = row.get(8)?;

    Ok(Indicator {
        id: row.get(0)?,
        name: row.get(1)?,
        sector_id: row.get(2)?,
        direction: direction
            .parse::<TargetDirection>()
            .map_err(|err| rusqlite::Error::FromSqlConversionFailure(3, Type::Text, Box::new(err)))?,
        target_value: row.get(4)?,
        value_kind: value_kind
            .parse::<ValueKind>()
            .map_err(|err| rusqlite::Error::FromSqlConversionFailure(5, Type::Text, Box::new(err)))?,
        start_month: row.get(6)?,
        end_month: row.get(7)?,
        periodicity: Periodicity::clamped(periodicity),
        active: row.get(9)?,
        visible: row.get(10)?,
        instructions: row.get(11)?,
        created_on: row.get(12)?,
    })
}
