//! Storage module for persisting crawl state
//!
//! This module handles everything the crawler writes besides records:
//! - Per-source progress (the cursor of the next page to fetch)
//! - SQLite run history (one row per run, one per source outcome)

mod file;
mod schema;
mod sqlite;
mod traits;

pub use file::FileProgressStore;
pub use sqlite::SqliteStorage;
pub use traits::{ProgressStore, RunHistory, StorageError, StorageResult};

use crate::config::{ProgressBackend, Settings};
use std::path::Path;
use std::sync::Arc;

/// Opens the progress store selected by the settings
///
/// With the SQLite backend the given run-history database is reused.
pub fn open_progress_store(
    settings: &Settings,
    database: &Arc<SqliteStorage>,
) -> StorageResult<Arc<dyn ProgressStore>> {
    let store: Arc<dyn ProgressStore> = match settings.progress_backend {
        ProgressBackend::File => Arc::new(FileProgressStore::new(Path::new(&settings.output_dir))?),
        ProgressBackend::Sqlite => database.clone(),
    };
    Ok(store)
}

/// Represents a crawl run
#[derive(Debug, Clone)]
pub struct RunRecord {
    pub id: i64,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub config_hash: String,
    pub status: RunStatus,
}

/// Status of a crawl run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Running,
    Completed,
    Interrupted,
    Failed,
}

impl RunStatus {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Interrupted => "interrupted",
            Self::Failed => "failed",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "interrupted" => Some(Self::Interrupted),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}
