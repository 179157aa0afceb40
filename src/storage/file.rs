//! File-backed progress store
//!
//! Each source gets `<dir>/<source>.progress` holding the next cursor on a
//! single line:
//!
//! | File | Meaning |
//! |------|---------|
//! | absent | never run |
//! | empty | last crawl completed |
//! | URL | resume from this URL |

use crate::state::{Cursor, ProgressState};
use crate::storage::traits::{ProgressStore, StorageError, StorageResult};
use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

/// Stores one progress file per source in a directory
#[derive(Debug, Clone)]
pub struct FileProgressStore {
    dir: PathBuf,
}

impl FileProgressStore {
    /// Opens a progress store in `dir`, creating the directory if needed
    pub fn new(dir: impl Into<PathBuf>) -> StorageResult<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    /// Path of the progress file for a source
    pub fn path_for(&self, source: &str) -> PathBuf {
        self.dir.join(format!("{}.progress", source))
    }

    /// Replaces the file content and syncs it before returning
    ///
    /// The content goes to a sibling temp file first and is renamed over the
    /// progress file, so a crash leaves either the old or the new cursor.
    fn write_durably(&self, source: &str, content: &str) -> StorageResult<()> {
        let path = self.path_for(source);
        let tmp = self.dir.join(format!("{}.progress.tmp", source));

        {
            let mut file = File::create(&tmp)?;
            file.write_all(content.as_bytes())?;
            file.sync_all()?;
        }
        fs::rename(&tmp, &path)?;
        sync_dir(&self.dir);

        Ok(())
    }
}

impl ProgressStore for FileProgressStore {
    fn load(&self, source: &str) -> StorageResult<ProgressState> {
        let content = match fs::read_to_string(self.path_for(source)) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(ProgressState::NeverRun),
            Err(e) => return Err(e.into()),
        };

        let value = content.trim();
        if value.is_empty() {
            return Ok(ProgressState::Completed);
        }

        Cursor::parse(value)
            .map(ProgressState::InProgress)
            .map_err(|_| StorageError::InvalidCursor {
                source_name: source.to_string(),
                value: value.to_string(),
            })
    }

    fn save(&self, source: &str, cursor: &Cursor) -> StorageResult<()> {
        self.write_durably(source, cursor.as_str())
    }

    fn clear(&self, source: &str) -> StorageResult<()> {
        self.write_durably(source, "")
    }

    fn reset(&self, source: &str) -> StorageResult<()> {
        match fs::remove_file(self.path_for(source)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Persists the rename itself; not supported on every platform
fn sync_dir(dir: &Path) {
    if let Ok(handle) = File::open(dir) {
        let _ = handle.sync_all();
    }
}
