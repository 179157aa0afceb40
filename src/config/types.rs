use serde::Deserialize;

/// Main configuration structure for pagecrawl
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub settings: Settings,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(default, rename = "source")]
    pub sources: Vec<SourceConfig>,
}

impl Config {
    /// Looks up a source by name
    pub fn source(&self, name: &str) -> Option<&SourceConfig> {
        self.sources.iter().find(|s| s.name == name)
    }

    /// Iterates over the sources that are enabled
    pub fn enabled_sources(&self) -> impl Iterator<Item = &SourceConfig> {
        self.sources.iter().filter(|s| s.enabled)
    }
}

/// Global run settings
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Settings {
    /// Number of sources crawled at the same time
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,

    /// Directory holding per-source output and progress files
    #[serde(default = "default_output_dir")]
    pub output_dir: String,

    /// Path to the SQLite database holding run history
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// File written by `--aggregate` (JSON array of every record)
    #[serde(default = "default_aggregate_file")]
    pub aggregate_file: String,

    /// Where the next-page cursors are persisted
    #[serde(default)]
    pub progress_backend: ProgressBackend,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            max_workers: default_max_workers(),
            output_dir: default_output_dir(),
            database_path: default_database_path(),
            aggregate_file: default_aggregate_file(),
            progress_backend: ProgressBackend::default(),
        }
    }
}

/// Backend used for progress persistence
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProgressBackend {
    /// One `<source>.progress` file per source in the output directory
    #[default]
    File,
    /// A `progress` table in the run history database
    Sqlite,
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct UserAgentConfig {
    /// Name of the crawler
    pub crawler_name: String,

    /// Version of the crawler
    pub crawler_version: String,

    /// URL with information about the crawler
    #[serde(default)]
    pub contact_url: Option<String>,
}

/// HTTP behaviour shared by every source's fetcher
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct FetchConfig {
    /// Connect timeout (milliseconds)
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,

    /// Whole-request timeout, body included (milliseconds)
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    /// Retries after the first attempt for transient failures
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// First backoff delay; doubled on each further retry (milliseconds)
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,

    /// Upper bound for a single backoff delay (milliseconds)
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,

    /// Status codes treated as transient and retried
    #[serde(default = "default_retry_statuses")]
    pub retry_statuses: Vec<u16>,

    /// Status codes that mean the crawler is blocked; the source stops
    #[serde(default = "default_fatal_statuses")]
    pub fatal_statuses: Vec<u16>,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            connect_timeout_ms: default_connect_timeout_ms(),
            request_timeout_ms: default_request_timeout_ms(),
            max_retries: default_max_retries(),
            backoff_base_ms: default_backoff_base_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            retry_statuses: default_retry_statuses(),
            fatal_statuses: default_fatal_statuses(),
        }
    }
}

/// One crawl target
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SourceConfig {
    /// Unique name; used for output and progress file names
    pub name: String,

    /// Registry key of the extractor bound to this source
    pub extractor: String,

    /// Start cursor for a fresh crawl
    pub url: String,

    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Page budget for a single run
    #[serde(default)]
    pub max_pages: Option<u32>,

    /// Pause between two pages of this source (milliseconds)
    #[serde(default = "default_page_delay_ms")]
    pub page_delay_ms: u64,

    /// What a page without the expected structure does to the crawl
    #[serde(default)]
    pub on_parse_error: ParseErrorPolicy,

    /// Case-insensitive keyword filter understood by some extractors
    #[serde(default)]
    pub filter_keyword: Option<String>,
}

/// Severity given to extraction failures
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParseErrorPolicy {
    /// Log, count the page as skipped, keep paginating
    #[default]
    Skip,
    /// A page missing its expected structure stops the source
    Fail,
}

fn default_max_workers() -> usize {
    3
}

fn default_output_dir() -> String {
    "data".to_string()
}

fn default_database_path() -> String {
    "data/pagecrawl.db".to_string()
}

fn default_aggregate_file() -> String {
    "aggregated_data.json".to_string()
}

fn default_connect_timeout_ms() -> u64 {
    5_000
}

fn default_request_timeout_ms() -> u64 {
    30_000
}

fn default_max_retries() -> u32 {
    5
}

fn default_backoff_base_ms() -> u64 {
    1_000
}

fn default_max_backoff_ms() -> u64 {
    30_000
}

fn default_retry_statuses() -> Vec<u16> {
    vec![429, 500, 502, 503, 504]
}

fn default_fatal_statuses() -> Vec<u16> {
    vec![403]
}

fn default_page_delay_ms() -> u64 {
    100
}

fn default_true() -> bool {
    true
}
