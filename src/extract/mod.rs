//! Pluggable per-source extraction
//!
//! An [`Extractor`] turns one fetched page into records and tells the driver
//! where the next page is. Sources pick their extractor by key from an
//! [`ExtractorRegistry`]; the bundled ones cover the three demo sites:
//!
//! | Key | Site | Paginates |
//! |-----|------|-----------|
//! | `books` | books.toscrape.com | `li.next a` |
//! | `quotes` | quotes.toscrape.com | `li.next a` |
//! | `jobs` | realpython.github.io/fake-jobs | no |

mod books;
mod jobs;
mod quotes;

pub use books::BooksExtractor;
pub use jobs::JobsExtractor;
pub use quotes::QuotesExtractor;

use crate::config::SourceConfig;
use crate::crawler::Page;
use crate::state::Cursor;
use crate::CrawlError;
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

/// Named fields of one extracted item
pub type Fields = serde_json::Map<String, serde_json::Value>;

/// One extracted item, tagged with the source that produced it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub source: String,
    #[serde(flatten)]
    pub fields: Fields,
}

impl Record {
    pub fn new(source: impl Into<String>, fields: Fields) -> Self {
        Self {
            source: source.into(),
            fields,
        }
    }
}

/// Errors raised while extracting records from a page
#[derive(Debug, Error)]
pub enum ExtractError {
    /// The page lacks the element every listing page of this site has
    #[error("{url} is missing expected structure: {what}")]
    MissingStructure { url: String, what: String },

    /// Item containers were found but none of them could be read
    #[error("malformed content on {url}: {message}")]
    Malformed { url: String, message: String },

    #[error("invalid selector '{selector}': {message}")]
    Selector { selector: String, message: String },
}

impl ExtractError {
    /// True when the page does not look like a page of this source at all
    pub fn is_structural(&self) -> bool {
        matches!(self, Self::MissingStructure { .. })
    }
}

/// Per-source page parser
///
/// Implementations must be total over well-formed HTML: content they do not
/// understand yields an error or fewer records, never a panic. `next_cursor`
/// must not return the page's own URL.
pub trait Extractor: Send + Sync {
    /// Extracts the items listed on the page
    fn records(&self, page: &Page) -> Result<Vec<Fields>, ExtractError>;

    /// Resolves the page's "next" link, or None on the last page
    fn next_cursor(&self, page: &Page) -> Option<Cursor>;
}

/// Builds an extractor for a source
pub type ExtractorFactory = fn(&SourceConfig) -> Arc<dyn Extractor>;

/// Maps extractor keys to factories
pub struct ExtractorRegistry {
    factories: HashMap<String, ExtractorFactory>,
}

impl ExtractorRegistry {
    /// Creates an empty registry
    pub fn empty() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Creates a registry holding the bundled extractors
    pub fn with_builtin() -> Self {
        let mut registry = Self::empty();
        registry.register("books", |_| Arc::new(BooksExtractor));
        registry.register("quotes", |_| Arc::new(QuotesExtractor));
        registry.register("jobs", |source| {
            Arc::new(JobsExtractor::new(source.filter_keyword.as_deref()))
        });
        registry
    }

    /// Adds or replaces the factory for a key
    pub fn register(&mut self, key: impl Into<String>, factory: ExtractorFactory) {
        self.factories.insert(key.into(), factory);
    }

    pub fn contains(&self, key: &str) -> bool {
        self.factories.contains_key(key)
    }

    /// Sorted list of known keys
    pub fn keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        keys.sort_unstable();
        keys
    }

    /// Builds the extractor named by a source's `extractor` key
    pub fn build(&self, source: &SourceConfig) -> Result<Arc<dyn Extractor>, CrawlError> {
        let factory =
            self.factories
                .get(&source.extractor)
                .ok_or_else(|| CrawlError::UnknownExtractor {
                    key: source.extractor.clone(),
                    source_name: source.name.clone(),
                })?;
        Ok(factory(source))
    }
}

impl Default for ExtractorRegistry {
    fn default() -> Self {
        Self::with_builtin()
    }
}

// ===== Helpers shared by the bundled extractors =====

pub(crate) fn selector(css: &str) -> Result<Selector, ExtractError> {
    Selector::parse(css).map_err(|e| ExtractError::Selector {
        selector: css.to_string(),
        message: format!("{:?}", e),
    })
}

/// Trimmed text of the first match of `css` under `element`
pub(crate) fn first_text(element: ElementRef<'_>, css: &Selector) -> Option<String> {
    element
        .select(css)
        .next()
        .map(|e| e.text().collect::<String>().trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Resolves the `li.next a` link used by both toscrape sites
pub(crate) fn next_link(page: &Page) -> Option<Cursor> {
    let document = Html::parse_document(&page.body);
    let next = selector("li.next a[href]").ok()?;

    document
        .select(&next)
        .next()
        .and_then(|a| a.value().attr("href"))
        .and_then(|href| Cursor::resolve(&page.url, href))
}

/// Turns per-item results into the page result
///
/// Unreadable items are dropped; the page only fails when it had items and
/// none could be read.
pub(crate) fn collect_items(
    page: &Page,
    items: Vec<Result<Fields, String>>,
) -> Result<Vec<Fields>, ExtractError> {
    let total = items.len();
    let mut fields = Vec::with_capacity(total);
    let mut last_problem = None;

    for item in items {
        match item {
            Ok(f) => fields.push(f),
            Err(problem) => {
                tracing::debug!(url = %page.url, "Skipping unreadable item: {}", problem);
                last_problem = Some(problem);
            }
        }
    }

    match last_problem {
        Some(problem) if fields.is_empty() => Err(ExtractError::Malformed {
            url: page.url.to_string(),
            message: format!("none of {} item(s) readable, e.g. {}", total, problem),
        }),
        _ => Ok(fields),
    }
}
