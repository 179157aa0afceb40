//! books.toscrape.com catalogue pages

use super::{collect_items, first_text, next_link, selector, ExtractError, Extractor, Fields};
use crate::crawler::Page;
use crate::state::Cursor;
use scraper::Html;
use serde_json::{json, Value};

pub struct BooksExtractor;

impl Extractor for BooksExtractor {
    fn records(&self, page: &Page) -> Result<Vec<Fields>, ExtractError> {
        let document = Html::parse_document(&page.body);
        let pod = selector("article.product_pod")?;
        let link = selector("h3 a")?;
        let price = selector("p.price_color")?;

        let pods: Vec<_> = document.select(&pod).collect();
        if pods.is_empty() {
            return Err(ExtractError::MissingStructure {
                url: page.url.to_string(),
                what: "article.product_pod".to_string(),
            });
        }

        let items = pods
            .into_iter()
            .map(|pod| -> Result<Fields, String> {
                let a = pod.select(&link).next().ok_or("no title link")?;
                // Long titles are truncated in the link text but not in the attribute
                let title = a
                    .value()
                    .attr("title")
                    .map(|t| t.trim().to_string())
                    .filter(|t| !t.is_empty())
                    .or_else(|| Some(a.text().collect::<String>().trim().to_string()))
                    .filter(|t| !t.is_empty())
                    .ok_or("empty title")?;
                let url = a
                    .value()
                    .attr("href")
                    .and_then(|href| Cursor::resolve(&page.url, href))
                    .ok_or("no product link")?;
                let price_text = first_text(pod, &price).unwrap_or_default();

                let mut fields = Fields::new();
                fields.insert("title".into(), Value::String(title));
                fields.insert("url".into(), Value::String(url.as_str().to_string()));
                fields.insert(
                    "content".into(),
                    Value::String(format!("Price: {}", price_text)),
                );
                fields.insert(
                    "metadata".into(),
                    json!({ "price_gbp": parse_price(&price_text) }),
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

/// Parses "£51.77" (or "Â£51.77" from a mis-decoded page) into 51.77
fn parse_price(text: &str) -> Option<f64> {
    let number: String = text
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    number.parse().ok()
}
