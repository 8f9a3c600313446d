//! `metas status`: target versus realized value per competence.

use anyhow::Result;
use clap::Args;
use metas_core::MetasError;
use metas_core::attainment::{self, StatusRow};
use metas_core::db::indicators;
use metas_core::model::Indicator;
use serde::Serialize;
use std::io::Write;

use super::Session;
use crate::output::{pretty_kv, pretty_section, render_mode};

#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Indicator id.
    pub id: i64,
}

#[derive(Debug, Serialize)]
struct StatusOutput {
    indicator: Indicator,
    met: usize,
    evaluated: usize,
    rows: Vec<StatusRow>,
}

fn attainment_cell(row: &StatusRow) -> String {
    row.attainment.map_or_else(
        || "-".to_string(),
        |a| format!("{} ({:+.1}%)", if a.met { "met" } else { "missed" }, a.variation_pct),
    )
}

/// # Errors
///
/// Returns an error if the indicator does not exist, the configured
/// tolerance is invalid, or a query fails.
pub fn run_status(args: &StatusArgs, session: &Session) -> Result<()> {
    let conn = session.open()?;
    let indicator = indicators::get(&conn, args.id)?.ok_or(MetasError::IndicatorNotFound(args.id))?;
    let tolerance = session.config.project.attainment.tolerance()?;
    let rows = attainment::status(&conn, &indicator, tolerance)?;

    let evaluated = rows.iter().filter(|r| r.attainment.is_some()).count();
    let met = rows
        .iter()
        .filter(|r| r.attainment.is_some_and(|a| a.met))
        .count();
    let output = StatusOutput {
        indicator,
        met,
        evaluated,
        rows,
    };

    render_mode(
        session.output,
        &output,
        |o, w| {
            for r in &o.rows {
                writeln!(
                    w,
                    "{}\t{}\t{}\t{}",
                    r.competence,
                    r.target,
                    r.realized.map_or_else(|| "-".to_string(), |v| v.to_string()),
                    attainment_cell(r)
                )?;
            }
            Ok(())
        },
        |o, w| {
            let ind = &o.indicator;
            pretty_section(w, &format!("Status {}: {} ({})", ind.id, ind.name, ind.direction.as_str()))?;
            pretty_kv(w, "Met", format!("{}/{}", o.met, o.evaluated))?;
            writeln!(w)?;
            writeln!(w, "  {:<8} {:>12} {:>12}  result", "month", "target", "realized")?;
            for r in &o.rows {
                writeln!(
                    w,
                    "  {:<8} {:>12} {:>12}  {}",
                    r.competence.to_string(),
                    r.target.to_string(),
                    r.realized.map_or_else(|| "-".to_string(), |v| v.to_string()),
                    attainment_cell(r)
                )?;
            }
            Ok(())
        },
    )
}
