//! Pagination cursor

use serde::{Deserialize, Serialize};
use std::fmt;
use url::Url;

/// Where to fetch next
///
/// A cursor is always an absolute http(s) URL; relative "next" links are
/// resolved against the page they were found on before becoming a cursor.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cursor(String);

impl Cursor {
    /// Parses an absolute URL into a cursor
    ///
    /// The URL is normalized by the `url` crate, so `https://Example.com`
    /// and `https://example.com/` produce equal cursors.
    pub fn parse(value: &str) -> Result<Self, url::ParseError> {
        Url::parse(value).map(Self::from)
    }

    /// Resolves an href found on the page at `base` into a cursor
    ///
    /// Returns None for hrefs that cannot be joined or that leave http(s).
    pub fn resolve(base: &Url, href: &str) -> Option<Self> {
        let href = href.trim();
        if href.is_empty() {
            return None;
        }

        let url = base.join(href).ok()?;
        match url.scheme() {
            "http" | "https" => Some(Self::from(url)),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Parses the cursor back into a URL
    pub fn to_url(&self) -> Result<Url, url::ParseError> {
        Url::parse(&self.0)
    }
}

impl From<Url> for Cursor {
    fn from(url: Url) -> Self {
        Self(url.into())
    }
}

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_normalizes() {
        let a = Cursor::parse("https://Quotes.toscrape.com").unwrap();
        let b = Cursor::parse("https://quotes.toscrape.com/").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.as_str(), "https://quotes.toscrape.com/");
    }

    #[test]
    fn test_parse_rejects_relative() {
        assert!(Cursor::parse("/page/2/").is_err());
    }

    #[test]
    fn test_resolve_relative_href() {
        let base = Url::parse("https://books.toscrape.com/").unwrap();
        let next = Cursor::resolve(&base, "catalogue/page-2.html").unwrap();
        assert_eq!(
            next.as_str(),
            "https://books.toscrape.com/catalogue/page-2.html"
        );

        let base = Url::parse("https://books.toscrape.com/catalogue/page-2.html").unwrap();
        let next = Cursor::resolve(&base, "page-3.html").unwrap();
        assert_eq!(
            next.as_str(),
            "https://books.toscrape.com/catalogue/page-3.html"
        );
    }

    #[test]
    fn test_resolve_rejects_other_schemes() {
        let base = Url::parse("https://quotes.toscrape.com/").unwrap();
        assert!(Cursor::resolve(&base, "javascript:void(0)").is_none());
        assert!(Cursor::resolve(&base, "mailto:a@b.c").is_none());
        assert!(Cursor::resolve(&base, "   ").is_none());
    }

    #[test]
    fn test_serializes_as_plain_string() {
        let cursor = Cursor::parse("https://quotes.toscrape.com/page/2/").unwrap();
        let json = serde_json::to_string(&cursor).unwrap();
        assert_eq!(json, "\"https://quotes.toscrape.com/page/2/\"");
    }
}
