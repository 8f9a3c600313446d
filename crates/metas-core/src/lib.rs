//! metas-core library.
//!
//! Competence calendar, schedule alignment, target reconciliation,
//! submission sanitizing and the SQLite store behind the `metas` CLI.

pub mod amount;
pub mod attainment;
pub mod calendar;
pub mod clock;
pub mod config;
pub mod db;
pub mod error;
pub mod lifecycle;
pub mod model;
pub mod pending;
pub mod prune;
pub mod reconcile;
pub mod sanitize;
pub mod schedule;

/// # Conventions
///
/// - **Errors**: engine operations return [`error::Result`]; config loading
///   uses `anyhow::Result`.
/// - **Logging**: Use `tracing` macros (`info!`, `warn!`, `debug!`).
/// - **Time**: engine code reads "now" only through [`clock::Clock`].
pub use error::{ErrorCode, MetasError};
