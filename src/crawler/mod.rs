//! Crawler module for paginated fetching
//!
//! This module contains the core crawling logic, including:
//! - HTTP fetching with an explicit retry policy
//! - The per-source pagination driver
//! - Bounded concurrent scheduling of sources

mod driver;
mod fetcher;
mod retry;
mod scheduler;

pub use driver::Driver;
pub use fetcher::{
    build_http_client, classify_status, format_user_agent, FetchError, HttpFetcher, Page,
    PageFetcher, StatusClass,
};
pub use retry::RetryPolicy;
pub use scheduler::{build_jobs, Scheduler, SourceJob};

/// How far a failure reaches once retries are spent
///
/// Transient failures never surface here: the fetcher retries them and
/// reports whatever is left as one of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// The page is given up on; other sources are unaffected
    Skippable,
    /// The source stops
    Fatal,
}
