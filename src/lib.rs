//! pagecrawl: a resumable concurrent pagination crawler
//!
//! This crate walks paginated listings one page at a time, following the
//! "next" link each page exposes. Every configured source runs its own
//! pagination driver; drivers run concurrently under a bounded worker pool,
//! append their records to line-delimited output as they go, and persist the
//! cursor of the next page so an interrupted crawl resumes where it stopped.

pub mod config;
pub mod crawler;
pub mod extract;
pub mod output;
pub mod state;
pub mod storage;

use thiserror::Error;

/// Main error type for pagecrawl operations
#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Fetch(#[from] crawler::FetchError),

    #[error("Extraction error: {0}")]
    Extract(#[from] extract::ExtractError),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("Output error: {0}")]
    Output(#[from] output::OutputError),

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("Invalid cursor '{value}': {reason}")]
    InvalidCursor { value: String, reason: String },

    #[error("Unknown extractor '{key}' for source '{source_name}'")]
    UnknownExtractor { key: String, source_name: String },

    #[error("Invalid driver transition: {from:?} -> {to:?}")]
    InvalidTransition {
        from: state::DriverState,
        to: state::DriverState,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// Result type alias for pagecrawl operations
pub type Result<T> = std::result::Result<T, CrawlError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{Driver, Scheduler, SourceJob};
pub use output::{Completion, RunReport, SourceOutcome};
pub use state::{Cursor, DriverState, ProgressState};
