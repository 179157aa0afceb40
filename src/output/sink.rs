//! Incremental record sinks

use crate::extract::Record;
use crate::output::OutputResult;
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// Durable destination for a source's records
///
/// A sink belongs to one driver, so implementations need no locking.
pub trait RecordSink: Send {
    /// Appends records; they must be on stable storage when this returns
    fn append(&mut self, records: &[Record]) -> OutputResult<()>;

    /// Drops everything written so far (used when a crawl starts over)
    fn truncate(&mut self) -> OutputResult<()>;

    /// Cuts a partially written last record so the next append starts on a
    /// record boundary; returns the number of bytes dropped
    fn repair_tail(&mut self) -> OutputResult<u64> {
        Ok(0)
    }
}

/// Appends one JSON object per line to `<dir>/<source>.jsonl`
///
/// Records of a page are written with a single `write_all` and synced, so
/// an interrupted run leaves a valid prefix of the complete output.
pub struct JsonlSink {
    path: PathBuf,
    file: File,
}

impl JsonlSink {
    /// Opens (or creates) the source's output file in append mode
    pub fn open(dir: &Path, source: &str) -> OutputResult<Self> {
        fs::create_dir_all(dir)?;
        let path = jsonl_path(dir, source);
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self { path, file })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl RecordSink for JsonlSink {
    fn append(&mut self, records: &[Record]) -> OutputResult<()> {
        if records.is_empty() {
            return Ok(());
        }

        let mut buf = Vec::new();
        for record in records {
            serde_json::to_writer(&mut buf, record)?;
            buf.push(b'\n');
        }

        self.file.write_all(&buf)?;
        self.file.sync_data()?;
        Ok(())
    }

    fn truncate(&mut self) -> OutputResult<()> {
        self.file.set_len(0)?;
        self.file.sync_all()?;
        Ok(())
    }

    fn repair_tail(&mut self) -> OutputResult<u64> {
        let len = self.file.metadata()?.len();
        let keep = complete_prefix_len(&self.path, len)?;
        if keep < len {
            self.file.set_len(keep)?;
            self.file.sync_all()?;
        }
        Ok(len - keep)
    }
}

/// Length of the file up to and including its last newline
fn complete_prefix_len(path: &Path, len: u64) -> std::io::Result<u64> {
    let mut reader = File::open(path)?;
    let mut buf = [0u8; 4096];
    let mut end = len;

    while end > 0 {
        let start = end.saturating_sub(buf.len() as u64);
        let chunk = &mut buf[..(end - start) as usize];
        reader.seek(SeekFrom::Start(start))?;
        reader.read_exact(chunk)?;
        if let Some(pos) = chunk.iter().rposition(|&b| b == b'\n') {
            return Ok(start + pos as u64 + 1);
        }
        end = start;
    }
    Ok(0)
}

/// Path of a source's line-delimited output
pub fn jsonl_path(dir: &Path, source: &str) -> PathBuf {
    dir.join(format!("{}.jsonl", source))
}
