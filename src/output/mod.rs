//! Output module for records and run reports
//!
//! This module handles:
//! - Appending extracted records to per-source JSONL files
//! - Building and printing the per-source run report
//! - Merging per-source output into one JSON document

mod aggregate;
mod report;
mod sink;

pub use aggregate::aggregate_jsonl;
pub use report::{print_report, Completion, RunReport, SourceOutcome};
pub use sink::{jsonl_path, JsonlSink, RecordSink};

use thiserror::Error;

/// Errors that can occur during output operations
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to serialize record: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;
