//! Storage traits and error types
//!
//! This module defines the trait interfaces for progress and run-history
//! backends and the associated error types.

use crate::output::SourceOutcome;
use crate::state::{Cursor, ProgressState};
use crate::storage::{RunRecord, RunStatus};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Stored cursor for '{source_name}' is not a URL: '{value}'")]
    InvalidCursor { source_name: String, value: String },

    #[error("Run not found: {0}")]
    RunNotFound(i64),

    #[error("Storage lock poisoned")]
    LockPoisoned,
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Durable per-source cursor persistence
///
/// Each source is written by exactly one driver at a time, so
/// implementations only need last-write-wins semantics per key. Writes must
/// be durable when the call returns.
pub trait ProgressStore: Send + Sync {
    /// Reads what is known about a source's pagination
    fn load(&self, source: &str) -> StorageResult<ProgressState>;

    /// Records the cursor of the next page to fetch
    fn save(&self, source: &str, cursor: &Cursor) -> StorageResult<()>;

    /// Marks the source's pagination as finished
    fn clear(&self, source: &str) -> StorageResult<()>;

    /// Forgets the source entirely, so it loads as `NeverRun`
    fn reset(&self, source: &str) -> StorageResult<()>;
}

/// Persistence of crawl runs and their per-source outcomes
pub trait RunHistory: Send + Sync {
    /// Creates a new run in the `running` state and returns its ID
    fn create_run(&self, config_hash: &str) -> StorageResult<i64>;

    /// Gets a run by ID
    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord>;

    /// Gets the most recent run
    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>>;

    /// Moves every run still marked `running` to `interrupted`
    ///
    /// Returns the affected run IDs.
    fn mark_interrupted_runs(&self) -> StorageResult<Vec<i64>>;

    /// Records the outcome of one source in a run
    fn record_outcome(&self, run_id: i64, outcome: &SourceOutcome) -> StorageResult<()>;

    /// Gets the outcomes recorded for a run, ordered by source name
    fn get_outcomes(&self, run_id: i64) -> StorageResult<Vec<SourceOutcome>>;

    /// Sets the final status and finish timestamp of a run
    fn finish_run(&self, run_id: i64, status: RunStatus) -> StorageResult<()>;
}
