//! Canonical SQLite schema for the metas store.
//!
//! - `sectors` and `indicators` hold configuration
//! - `monthly_targets` keeps one target per indicator and competence month,
//!   stored as a day-1 `YYYY-MM-DD` date
//! - `submissions` keeps realized values with the competence decomposed into
//!   `year` / `month`; `value IS NULL` means pending
//! - `action_log` is the audit trail
//! - `store_meta` tracks schema version and the last sanitizer run

/// Migration v1: core tables plus store metadata.
pub const MIGRATION_V1_SQL: &str = r"
CREATE TABLE IF NOT EXISTS sectors (
    sector_id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE CHECK (length(trim(name)) > 0),
    active INTEGER NOT NULL DEFAULT 1 CHECK (active IN (0, 1))
);

CREATE TABLE IF NOT EXISTS indicators (
    indicator_id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL CHECK (length(trim(name)) > 0),
    sector_id INTEGER NOT NULL REFERENCES sectors(sector_id),
    direction TEXT NOT NULL CHECK (direction IN ('increasing', 'decreasing', 'monitoring')),
    target_value INTEGER NOT NULL DEFAULT 0,
    value_kind TEXT NOT NULL DEFAULT 'numeric'
        CHECK (value_kind IN ('numeric', 'monetary', 'percentage')),
    start_month TEXT CHECK (start_month IS NULL OR start_month LIKE '____-__-01'),
    end_month TEXT CHECK (end_month IS NULL OR end_month LIKE '____-__-01'),
    periodicity INTEGER NOT NULL DEFAULT 1,
    active INTEGER NOT NULL DEFAULT 1 CHECK (active IN (0, 1)),
    visible INTEGER NOT NULL DEFAULT 1 CHECK (visible IN (0, 1)),
    instructions TEXT NOT NULL DEFAULT '',
    created_on TEXT
);

CREATE TABLE IF NOT EXISTS monthly_targets (
    target_id INTEGER PRIMARY KEY AUTOINCREMENT,
    indicator_id INTEGER NOT NULL REFERENCES indicators(indicator_id) ON DELETE CASCADE,
    month TEXT NOT NULL CHECK (month LIKE '____-__-01'),
    target_value INTEGER NOT NULL,
    UNIQUE (indicator_id, month)
);

CREATE TABLE IF NOT EXISTS submissions (
    submission_id INTEGER PRIMARY KEY AUTOINCREMENT,
    indicator_id INTEGER NOT NULL REFERENCES indicators(indicator_id) ON DELETE CASCADE,
    year INTEGER NOT NULL,
    month INTEGER NOT NULL CHECK (month BETWEEN 1 AND 12),
    value INTEGER,
    confirmed INTEGER NOT NULL DEFAULT 0 CHECK (confirmed IN (0, 1)),
    submitted_by TEXT,
    origin TEXT,
    evidence TEXT,
    comment TEXT,
    submitted_at TEXT,
    UNIQUE (indicator_id, year, month, submitted_by)
);

CREATE TABLE IF NOT EXISTS action_log (
    entry_id INTEGER PRIMARY KEY AUTOINCREMENT,
    actor TEXT,
    action TEXT NOT NULL,
    at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS store_meta (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    schema_version INTEGER NOT NULL,
    last_sanitized_at TEXT
);

INSERT OR IGNORE INTO store_meta (id, schema_version, last_sanitized_at)
VALUES (1, 1, NULL);
";

/// Migration v2: read-path indexes for reconciliation and reporting.
pub const MIGRATION_V2_SQL: &str = r"
CREATE INDEX IF NOT EXISTS idx_indicators_active_sector
    ON indicators(active, sector_id);

CREATE INDEX IF NOT EXISTS idx_submissions_competence
    ON submissions(indicator_id, year, month, confirmed);

CREATE INDEX IF NOT EXISTS idx_submissions_actor
    ON submissions(submitted_by, indicator_id);

CREATE INDEX IF NOT EXISTS idx_action_log_at
    ON action_log(at DESC);

UPDATE store_meta
SET schema_version = 2
WHERE id = 1;
";

/// Indexes expected by reconciliation and listing query paths.
pub const REQUIRED_INDEXES: &[&str] = &[
    "idx_indicators_active_sector",
    "idx_submissions_competence",
    "idx_submissions_actor",
    "idx_action_log_at",
];
