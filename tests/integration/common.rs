//! Shared fixtures: quotes-style listing pages and test configurations

use pagecrawl::config::{parse_config, Config};
use pagecrawl::crawler::{build_jobs, SourceJob};
use pagecrawl::extract::ExtractorRegistry;
use std::path::Path;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const QUOTES_PER_PAGE: usize = 2;

/// Renders page `page` of a quotes-style listing under `/<prefix>/page/<n>/`
pub fn quotes_page(prefix: &str, page: u32, has_next: bool) -> String {
    let mut html = String::from("<html><body><div class=\"col-md-8\">");
    for i in 0..QUOTES_PER_PAGE {
        html.push_str(&format!(
            r#"<div class="quote">
                 <span class="text">“{prefix} quote {page}.{i}”</span>
                 <span>by <small class="author">Author {i}</small>
                   <a href="/author/{i}">(about)</a></span>
               </div>"#
        ));
    }
    if has_next {
        html.push_str(&format!(
            r#"<ul class="pager"><li class="next"><a href="/{prefix}/page/{}/">Next</a></li></ul>"#,
            page + 1
        ));
    }
    html.push_str("</div></body></html>");
    html
}

pub fn page_path(prefix: &str, page: u32) -> String {
    format!("/{}/page/{}/", prefix, page)
}

pub fn html(body: String) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .set_body_string(body)
        .insert_header("content-type", "text/html; charset=utf-8")
}

/// Mounts `pages` linked listing pages for a source
pub async fn mount_source(server: &MockServer, prefix: &str, pages: u32, delay: Duration) {
    for page in 1..=pages {
        Mock::given(method("GET"))
            .and(path(page_path(prefix, page)))
            .respond_with(html(quotes_page(prefix, page, page < pages)).set_delay(delay))
            .mount(server)
            .await;
    }
}

/// Builds a validated config with one quotes source per prefix
pub fn config(server: &MockServer, dir: &Path, workers: usize, prefixes: &[&str]) -> Config {
    let mut toml = format!(
        r#"
        [settings]
        max-workers = {workers}
        output-dir = '{dir}'
        database-path = '{dir}/pagecrawl.db'

        [user-agent]
        crawler-name = "TestBot"
        crawler-version = "1.0.0"
        contact-url = "https://example.com/contact"

        [fetch]
        connect-timeout-ms = 1000
        request-timeout-ms = 5000
        max-retries = 3
        backoff-base-ms = 10
        max-backoff-ms = 50
        "#,
        dir = dir.display()
    );

    for prefix in prefixes {
        toml.push_str(&format!(
            r#"
            [[source]]
            name = "{prefix}"
            extractor = "quotes"
            url = "{}{}"
            page-delay-ms = 0
            "#,
            server.uri(),
            page_path(prefix, 1)
        ));
    }

    parse_config(&toml).expect("test config must be valid")
}

pub fn jobs(config: &Config) -> Vec<SourceJob> {
    build_jobs(config, &ExtractorRegistry::with_builtin()).expect("extractors are registered")
}

/// Lines of a source's JSONL output
pub fn output_lines(dir: &Path, source: &str) -> Vec<String> {
    let path = pagecrawl::output::jsonl_path(dir, source);
    std::fs::read_to_string(path)
        .unwrap_or_default()
        .lines()
        .map(str::to_string)
        .collect()
}
