//! State module for tracking crawl progress
//!
//! This module provides the state a pagination driver carries between pages.
//!
//! # Components
//!
//! - `Cursor`: The absolute URL of the next page to fetch
//! - `DriverState`: Tracks where a driver is in its fetch/extract/advance loop
//! - `ProgressState`: What the progress store knows about a source

mod cursor;
mod driver_state;
mod progress;

// Re-export main types
pub use cursor::Cursor;
pub use driver_state::DriverState;
pub use progress::ProgressState;
