//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the `RunHistory`
//! and `ProgressStore` traits.

use crate::output::{Completion, SourceOutcome};
use crate::state::{Cursor, ProgressState};
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{ProgressStore, RunHistory, StorageError, StorageResult};
use crate::storage::{RunRecord, RunStatus};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

/// SQLite storage backend
///
/// The connection sits behind a mutex so one instance can be shared by every
/// driver through an `Arc`.
pub struct SqliteStorage {
    conn: Mutex<Connection>,
}

impl SqliteStorage {
    /// Creates a new SqliteStorage instance
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStorage)` - Successfully opened/created database
    /// * `Err(StorageError)` - Failed to open database
    pub fn new(path: &Path) -> StorageResult<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;

        // synchronous = FULL: a saved cursor must survive power loss
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = FULL;
            PRAGMA foreign_keys = ON;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Creates an in-memory database (for testing)
    pub fn new_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> StorageResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StorageError::LockPoisoned)
    }
}

fn run_from_row(row: &Row<'_>) -> rusqlite::Result<RunRecord> {
    Ok(RunRecord {
        id: row.get(0)?,
        started_at: row.get(1)?,
        finished_at: row.get(2)?,
        config_hash: row.get(3)?,
        status: RunStatus::from_db_string(&row.get::<_, String>(4)?)
            .unwrap_or(RunStatus::Interrupted),
    })
}

fn outcome_from_row(row: &Row<'_>) -> rusqlite::Result<SourceOutcome> {
    Ok(SourceOutcome {
        source: row.get(0)?,
        items: row.get::<_, i64>(1)? as u64,
        pages: row.get::<_, i64>(2)? as u64,
        skipped_pages: row.get::<_, i64>(3)? as u64,
        elapsed: Duration::from_millis(row.get::<_, i64>(4)? as u64),
        completion: Completion::from_db_string(&row.get::<_, String>(5)?)
            .unwrap_or(Completion::Failed),
        error: row.get(6)?,
    })
}

impl RunHistory for SqliteStorage {
    fn create_run(&self, config_hash: &str) -> StorageResult<i64> {
        let conn = self.conn()?;
        let now = Utc::now().to_rfc3339();
        conn.execute(
            "INSERT INTO runs (started_at, config_hash, status) VALUES (?1, ?2, ?3)",
            params![now, config_hash, RunStatus::Running.to_db_string()],
        )?;
        Ok(conn.last_insert_rowid())
    }

    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord> {
        let conn = self.conn()?;
        conn.query_row(
            "SELECT id, started_at, finished_at, config_hash, status FROM runs WHERE id = ?1",
            params![run_id],
            run_from_row,
        )
        .optional()?
        .ok_or(StorageError::RunNotFound(run_id))
    }

    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>> {
        let conn = self.conn()?;
        let run = conn
            .query_row(
                "SELECT id, started_at, finished_at, config_hash, status FROM runs ORDER BY id DESC LIMIT 1",
                [],
                run_from_row,
            )
            .optional()?;
        Ok(run)
    }

    fn mark_interrupted_runs(&self) -> StorageResult<Vec<i64>> {
        let conn = self.conn()?;
        let ids = {
            let mut stmt = conn.prepare("SELECT id FROM runs WHERE status = ?1 ORDER BY id")?;
            let ids = stmt
                .query_map(params![RunStatus::Running.to_db_string()], |row| row.get(0))?
                .collect::<Result<Vec<i64>, _>>()?;
            ids
        };

        conn.execute(
            "UPDATE runs SET status = ?1 WHERE status = ?2",
            params![
                RunStatus::Interrupted.to_db_string(),
                RunStatus::Running.to_db_string()
            ],
        )?;

        Ok(ids)
    }

    fn record_outcome(&self, run_id: i64, outcome: &SourceOutcome) -> StorageResult<()> {
        let conn = self.conn()?;
        let now = Utc::now().to_rfc3339();
        conn.execute(
            "INSERT INTO source_results
             (run_id, source, items, pages, skipped_pages, elapsed_ms, completion, error, finished_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
             ON CONFLICT(run_id, source) DO UPDATE SET
                items = excluded.items,
                pages = excluded.pages,
                skipped_pages = excluded.skipped_pages,
                elapsed_ms = excluded.elapsed_ms,
                completion = excluded.completion,
                error = excluded.error,
                finished_at = excluded.finished_at",
            params![
                run_id,
                outcome.source,
                outcome.items as i64,
                outcome.pages as i64,
                outcome.skipped_pages as i64,
                outcome.elapsed.as_millis() as i64,
                outcome.completion.to_db_string(),
                outcome.error,
                now
            ],
        )?;
        Ok(())
    }

    fn get_outcomes(&self, run_id: i64) -> StorageResult<Vec<SourceOutcome>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT source, items, pages, skipped_pages, elapsed_ms, completion, error
             FROM source_results WHERE run_id = ?1 ORDER BY source",
        )?;

        let outcomes = stmt
            .query_map(params![run_id], outcome_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(outcomes)
    }

    fn finish_run(&self, run_id: i64, status: RunStatus) -> StorageResult<()> {
        let conn = self.conn()?;
        let now = Utc::now().to_rfc3339();
        let updated = conn.execute(
            "UPDATE runs SET status = ?1, finished_at = ?2 WHERE id = ?3",
            params![status.to_db_string(), now, run_id],
        )?;

        if updated == 0 {
            return Err(StorageError::RunNotFound(run_id));
        }
        Ok(())
    }
}

impl ProgressStore for SqliteStorage {
    fn load(&self, source: &str) -> StorageResult<ProgressState> {
        let conn = self.conn()?;
        let row: Option<(Option<String>, String)> = conn
            .query_row(
                "SELECT cursor, status FROM progress WHERE source = ?1",
                params![source],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        match row {
            None => Ok(ProgressState::NeverRun),
            Some((Some(value), _)) if !value.is_empty() => Cursor::parse(&value)
                .map(ProgressState::InProgress)
                .map_err(|_| StorageError::InvalidCursor {
                    source_name: source.to_string(),
                    value,
                }),
            Some(_) => Ok(ProgressState::Completed),
        }
    }

    fn save(&self, source: &str, cursor: &Cursor) -> StorageResult<()> {
        let state = ProgressState::InProgress(cursor.clone());
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO progress (source, cursor, status, updated_at) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(source) DO UPDATE SET
                cursor = excluded.cursor, status = excluded.status, updated_at = excluded.updated_at",
            params![
                source,
                cursor.as_str(),
                state.to_db_string(),
                Utc::now().to_rfc3339()
            ],
        )?;
        Ok(())
    }

    fn clear(&self, source: &str) -> StorageResult<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO progress (source, cursor, status, updated_at) VALUES (?1, NULL, ?2, ?3)
             ON CONFLICT(source) DO UPDATE SET
                cursor = NULL, status = excluded.status, updated_at = excluded.updated_at",
            params![
                source,
                ProgressState::Completed.to_db_string(),
                Utc::now().to_rfc3339()
            ],
        )?;
        Ok(())
    }

    fn reset(&self, source: &str) -> StorageResult<()> {
        let conn = self.conn()?;
        conn.execute("DELETE FROM progress WHERE source = ?1", params![source])?;
        Ok(())
    }
}
