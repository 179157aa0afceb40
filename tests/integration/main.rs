//! Integration tests for pagecrawl
//!
//! These tests use wiremock to serve paginated listings and run the real
//! fetcher, drivers and scheduler against them.

mod common;
mod crawl_tests;
mod scheduler_tests;
