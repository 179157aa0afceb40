//! quotes.toscrape.com listing pages

use super::{collect_items, first_text, next_link, selector, ExtractError, Extractor, Fields};
use crate::crawler::Page;
use crate::state::Cursor;
use scraper::Html;
use serde_json::{json, Value};

pub struct QuotesExtractor;

impl Extractor for QuotesExtractor {
    fn records(&self, page: &Page) -> Result<Vec<Fields>, ExtractError> {
        let document = Html::parse_document(&page.body);
        let quote = selector("div.quote")?;
        let text = selector("span.text")?;
        let author = selector("small.author")?;
        let about = selector("a[href]")?;
        let tag = selector("a.tag")?;

        let quotes: Vec<_> = document.select(&quote).collect();
        if quotes.is_empty() {
            return Err(ExtractError::MissingStructure {
                url: page.url.to_string(),
                what: "div.quote".to_string(),
            });
        }

        let items = quotes
            .into_iter()
            .map(|q| -> Result<Fields, String> {
                let content = first_text(q, &text).ok_or("no quote text")?;
                let author_name = first_text(q, &author).ok_or("no author")?;
                let author_url = q
                    .select(&about)
                    .next()
                    .and_then(|a| a.value().attr("href"))
                    .and_then(|href| Cursor::resolve(&page.url, href))
                    .ok_or("no author link")?;
                let tags: Vec<String> = q
                    .select(&tag)
                    .map(|t| t.text().collect::<String>().trim().to_string())
                    .filter(|t| !t.is_empty())
                    .collect();

                let mut fields = Fields::new();
                fields.insert(
                    "title".into(),
                    Value::String(format!("Quote by {}", author_name)),
                );
                fields.insert(
                    "url".into(),
                    Value::String(author_url.as_str().to_string()),
                );
                fields.insert("content".into(), Value::String(content));
                fields.insert(
                    "metadata".into(),
                    json!({ "author": author_name, "tags": tags }),
                );
                Ok(fields)
            })
            .collect();

        collect_items(page, items)
    }

    fn next_cursor(&self, page: &Page) -> Option<Cursor> {
        next_link(page)
    }
}
