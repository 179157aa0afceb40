//! Configuration module for pagecrawl
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//!
//! # Example
//!
//! ```no_run
//! use pagecrawl::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("pagecrawl.toml")).unwrap();
//! println!("Crawling with {} workers", config.settings.max_workers);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    Config, FetchConfig, ParseErrorPolicy, ProgressBackend, Settings, SourceConfig,
    UserAgentConfig,
};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};
pub use validation::validate;
