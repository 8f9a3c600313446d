pub mod completions;
pub mod indicator;
pub mod init;
pub mod log;
pub mod pending;
pub mod prune;
pub mod reconcile;
pub mod sanitize;
pub mod sector;
pub mod status;
pub mod submit;

use std::path::{Path, PathBuf};

use anyhow::Context as _;
use metas_core::MetasError;
use metas_core::clock::SystemClock;
use metas_core::config::{EffectiveConfig, PROJECT_DIR};
use metas_core::db;
use rusqlite::Connection;

use crate::output::OutputMode;

/// Store file name inside the project directory.
pub const DB_FILE: &str = "metas.db";

/// Default store location for a project rooted at `root`.
pub fn default_db_path(root: &Path) -> PathBuf {
    root.join(PROJECT_DIR).join(DB_FILE)
}

/// Everything a command handler needs besides its own arguments.
#[derive(Debug)]
pub struct Session {
    pub root: PathBuf,
    pub db_path: PathBuf,
    pub output: OutputMode,
    pub config: EffectiveConfig,
    pub clock: SystemClock,
    pub verbose: bool,
}

impl Session {
    /// Open the existing store. A missing file means `metas init` has not
    /// run yet.
    ///
    /// # Errors
    ///
    /// Returns [`MetasError::NotInitialized`] when the store file is absent,
    /// or an error if opening/migrating fails.
    pub fn open(&self) -> anyhow::Result<Connection> {
        db::try_open_store(&self.db_path)
            .with_context(|| format!("open store {}", self.db_path.display()))?
            .ok_or_else(|| MetasError::NotInitialized(self.db_path.clone()).into())
    }

    /// Acting user: the explicit flag, else the user config's `actor`.
    pub fn actor<'a>(&'a self, flag: Option<&'a str>) -> Option<&'a str> {
        flag.or(self.config.user.actor.as_deref())
    }
}
