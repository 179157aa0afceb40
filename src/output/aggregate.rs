//! Merging per-source output into a single JSON document

use crate::output::sink::jsonl_path;
use crate::output::OutputResult;
use serde_json::Value;
use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, ErrorKind, Write};
use std::path::Path;

/// Merges `<dir>/<source>.jsonl` for every listed source into one JSON array
///
/// Sources are merged in the given order. Missing files are skipped, as are
/// lines that do not parse (an interrupted write leaves at most one, at the
/// end of a file). Returns the number of records written.
pub fn aggregate_jsonl(dir: &Path, sources: &[&str], output: &Path) -> OutputResult<usize> {
    let mut records = Vec::new();

    for source in sources {
        let path = jsonl_path(dir, source);
        let file = match File::open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::debug!(source = %source, "No output file to aggregate");
                continue;
            }
            Err(e) => return Err(e.into()),
        };

        let before = records.len();
        for (index, line) in BufReader::new(file).lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<Value>(&line) {
                Ok(value) => records.push(value),
                Err(e) => {
                    tracing::warn!(
                        source = %source,
                        line = index + 1,
                        "Skipping unreadable record: {}",
                        e
                    );
                }
            }
        }
        tracing::debug!(source = %source, records = records.len() - before, "Aggregated");
    }

    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let mut writer = BufWriter::new(File::create(output)?);
    serde_json::to_writer_pretty(&mut writer, &records)?;
    writer.write_all(b"\n")?;
    writer.flush()?;

    Ok(records.len())
}
