//! Removal of targets and pending submissions for competences that have not
//! happened yet.

use rusqlite::Connection;
use serde::Serialize;

use crate::clock::Clock;
use crate::db::{submissions, targets};
use crate::error::Result;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PruneReport {
    pub dry_run: bool,
    pub targets: usize,
    pub pending_submissions: usize,
}

/// Delete target rows whose month is on or after the current month, and
/// pending submissions for those competences. Confirmed submissions are kept.
///
/// In dry-run mode only counts are returned.
///
/// # Errors
///
/// Returns an error if a query or delete fails; nothing is written then.
pub fn prune_future(
    conn: &mut Connection,
    clock: &dyn Clock,
    indicator_id: Option<i64>,
    dry_run: bool,
) -> Result<PruneReport> {
    let from = clock.current_month();
    let tx = conn.transaction()?;

    let report = if dry_run {
        PruneReport {
            dry_run,
            targets: targets::count_from(&tx, from, indicator_id)?,
            pending_submissions: submissions::count_pending_from(&tx, from, indicator_id)?,
        }
    } else {
        let report = PruneReport {
            dry_run,
            targets: targets::delete_from(&tx, from, indicator_id)?,
            pending_submissions: submissions::delete_pending_from(&tx, from, indicator_id)?,
        };
        tx.commit()?;
        report
    };

    tracing::info!(
        dry_run,
        %from,
        targets = report.targets,
        pending_submissions = report.pending_submissions,
        "pruned future competences"
    );
    Ok(report)
}
