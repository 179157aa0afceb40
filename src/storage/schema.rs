//! Database schema definitions
//!
//! This module contains all SQL schema definitions for the pagecrawl database.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- Track crawl runs
CREATE TABLE IF NOT EXISTS runs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    started_at TEXT NOT NULL,
    finished_at TEXT,
    config_hash TEXT NOT NULL,
    status TEXT NOT NULL
);

-- One row per source and run, written as each source finishes
CREATE TABLE IF NOT EXISTS source_results (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    run_id INTEGER NOT NULL REFERENCES runs(id),
    source TEXT NOT NULL,
    items INTEGER NOT NULL,
    pages INTEGER NOT NULL,
    skipped_pages INTEGER NOT NULL,
    elapsed_ms INTEGER NOT NULL,
    completion TEXT NOT NULL,
    error TEXT,
    finished_at TEXT NOT NULL,
    UNIQUE(run_id, source)
);

CREATE INDEX IF NOT EXISTS idx_source_results_run ON source_results(run_id);

-- Next cursor per source (used when progress-backend = "sqlite")
CREATE TABLE IF NOT EXISTS progress (
    source TEXT PRIMARY KEY,
    cursor TEXT,
    status TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
"#;

/// Initializes the database schema
///
/// # Arguments
///
/// * `conn` - The database connection
///
/// # Returns
///
/// * `Ok(())` - Schema initialized successfully
/// * `Err(rusqlite::Error)` - Failed to initialize schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
