//! Fake job board: a single listing page, optionally filtered by title

use super::{collect_items, first_text, selector, ExtractError, Extractor, Fields};
use crate::crawler::Page;
use crate::state::Cursor;
use scraper::{ElementRef, Html, Selector};
use serde_json::{json, Value};

pub struct JobsExtractor {
    /// Lower-cased keyword a title must contain
    keyword: Option<String>,
}

impl JobsExtractor {
    pub fn new(keyword: Option<&str>) -> Self {
        Self {
            keyword: keyword
                .map(|k| k.trim().to_lowercase())
                .filter(|k| !k.is_empty()),
        }
    }

    fn wanted(&self, title: &str) -> bool {
        match &self.keyword {
            Some(keyword) => title.to_lowercase().contains(keyword.as_str()),
            None => true,
        }
    }
}

impl Extractor for JobsExtractor {
    fn records(&self, page: &Page) -> Result<Vec<Fields>, ExtractError> {
        let document = Html::parse_document(&page.body);
        let content = selector("div.card-content")?;
        let title = selector("h2.title")?;
        let company = selector("h3.company")?;
        let location = selector("p.location")?;
        let posted = selector("time")?;
        let links = selector("a[href]")?;

        let cards: Vec<_> = document.select(&content).collect();
        if cards.is_empty() {
            return Err(ExtractError::MissingStructure {
                url: page.url.to_string(),
                what: "div.card-content".to_string(),
            });
        }

        let mut items = Vec::with_capacity(cards.len());
        for card in cards {
            let Some(job_title) = first_text(card, &title) else {
                items.push(Err("no job title".to_string()));
                continue;
            };
            if !self.wanted(&job_title) {
                continue;
            }

            let item = (|| -> Result<Fields, String> {
                let company_name = first_text(card, &company).ok_or("no company")?;
                let place = first_text(card, &location).ok_or("no location")?;
                let url = apply_link(card, &links)
                    .and_then(|href| Cursor::resolve(&page.url, href))
                    .ok_or("no apply link")?;

                let mut fields = Fields::new();
                fields.insert("title".into(), Value::String(job_title.clone()));
                fields.insert("url".into(), Value::String(url.as_str().to_string()));
                fields.insert(
                    "content".into(),
                    Value::String(format!("Company: {} | Location: {}", company_name, place)),
                );
                fields.insert(
                    "metadata".into(),
                    json!({
                        "company": company_name,
                        "location": place,
                        "posted": first_text(card, &posted),
                    }),
                );
                Ok(fields)
            })();
            items.push(item);
        }

        collect_items(page, items)
    }

    /// The board is a single page
    fn next_cursor(&self, _page: &Page) -> Option<Cursor> {
        None
    }
}

/// Finds the "Apply" or "Learn More" link of a job card
///
/// The links sit in the card footer, a sibling of `div.card-content`, so
/// the search widens to the enclosing `div.card` when there is one.
fn apply_link<'a>(content: ElementRef<'a>, links: &Selector) -> Option<&'a str> {
    let card = content
        .ancestors()
        .filter_map(ElementRef::wrap)
        .find(|e| e.value().classes().any(|c| c == "card"))
        .unwrap_or(content);

    card.select(links)
        .find(|a| {
            let text = a.text().collect::<String>();
            let text = text.trim();
            text == "Apply" || text.starts_with("Learn More")
        })
        .and_then(|a| a.value().attr("href"))
}
