//! Single-source crawls through the real fetcher

use crate::common::{self, html, mount_source, page_path, quotes_page, QUOTES_PER_PAGE};
use pagecrawl::crawler::{FetchError, HttpFetcher, PageFetcher, Scheduler};
use pagecrawl::output::{aggregate_jsonl, jsonl_path, Completion};
use pagecrawl::state::{Cursor, ProgressState};
use pagecrawl::storage::{FileProgressStore, ProgressStore};
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn file_store(dir: &TempDir) -> Arc<dyn ProgressStore> {
    Arc::new(FileProgressStore::new(dir.path()).unwrap())
}

#[tokio::test]
async fn test_crawl_follows_next_links_to_the_end() {
    let server = MockServer::start().await;
    mount_source(&server, "quotes", 3, Duration::ZERO).await;

    let dir = TempDir::new().unwrap();
    let config = common::config(&server, dir.path(), 1, &["quotes"]);
    let store = file_store(&dir);
    let job = common::jobs(&config).remove(0);

    let outcome = Scheduler::new(&config, store.clone()).run_one(job).await;

    assert_eq!(outcome.completion, Completion::Exhausted);
    assert_eq!(outcome.pages, 3);
    assert_eq!(outcome.items, 3 * QUOTES_PER_PAGE as u64);

    let lines = common::output_lines(dir.path(), "quotes");
    assert_eq!(lines.len(), 3 * QUOTES_PER_PAGE);
    let first: serde_json::Value = serde_json::from_str(&lines[0]).unwrap();
    assert_eq!(first["source"], "quotes");
    assert_eq!(first["content"], "“quotes quote 1.0”");
    assert_eq!(first["url"], format!("{}/author/0", server.uri()));

    assert_eq!(store.load("quotes").unwrap(), ProgressState::Completed);
}

#[tokio::test]
async fn test_user_agent_is_sent() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(page_path("quotes", 1)))
        .and(header(
            "user-agent",
            "TestBot/1.0.0 (+https://example.com/contact)",
        ))
        .respond_with(html(quotes_page("quotes", 1, false)))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let config = common::config(&server, dir.path(), 1, &["quotes"]);
    let job = common::jobs(&config).remove(0);

    let outcome = Scheduler::new(&config, file_store(&dir)).run_one(job).await;
    assert_eq!(outcome.completion, Completion::Exhausted);
}

#[tokio::test]
async fn test_transient_failures_are_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(page_path("quotes", 1)))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(page_path("quotes", 1)))
        .respond_with(html(quotes_page("quotes", 1, false)))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let config = common::config(&server, dir.path(), 1, &["quotes"]);
    let job = common::jobs(&config).remove(0);

    let outcome = Scheduler::new(&config, file_store(&dir)).run_one(job).await;

    assert_eq!(outcome.completion, Completion::Exhausted);
    assert_eq!(outcome.items, QUOTES_PER_PAGE as u64);
    assert_eq!(outcome.skipped_pages, 0);
}

#[tokio::test]
async fn test_exhausted_retries_stall_the_source() {
    let server = MockServer::start().await;
    // Page 2 fails on every attempt: 1 try + 3 retries
    Mock::given(method("GET"))
        .and(path(page_path("stuck", 1)))
        .respond_with(html(quotes_page("stuck", 1, true)))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(page_path("stuck", 2)))
        .respond_with(ResponseTemplate::new(502))
        .expect(4)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let config = common::config(&server, dir.path(), 1, &["stuck"]);
    let store = file_store(&dir);
    let job = common::jobs(&config).remove(0);

    let outcome = Scheduler::new(&config, store.clone()).run_one(job).await;

    assert_eq!(outcome.completion, Completion::Stalled);
    assert!(!outcome.is_fatal());
    assert_eq!(outcome.items, QUOTES_PER_PAGE as u64);
    assert_eq!(outcome.skipped_pages, 1);

    let expected = Cursor::parse(&format!("{}{}", server.uri(), page_path("stuck", 2))).unwrap();
    assert_eq!(
        store.load("stuck").unwrap(),
        ProgressState::InProgress(expected)
    );
}

#[tokio::test]
async fn test_forbidden_is_fatal_and_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(page_path("quotes", 1)))
        .respond_with(ResponseTemplate::new(403))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let config = common::config(&server, dir.path(), 1, &["quotes"]);
    let job = common::jobs(&config).remove(0);

    let outcome = Scheduler::new(&config, file_store(&dir)).run_one(job).await;

    assert!(outcome.is_fatal());
    assert_eq!(outcome.items, 0);
    assert!(outcome.error.unwrap().contains("403"));
}

#[tokio::test]
async fn test_not_found_is_skipped_without_retry() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(page_path("quotes", 1)))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let config = common::config(&server, dir.path(), 1, &["quotes"]);
    let job = common::jobs(&config).remove(0);

    let outcome = Scheduler::new(&config, file_store(&dir)).run_one(job).await;

    assert_eq!(outcome.completion, Completion::Stalled);
    assert_eq!(outcome.skipped_pages, 1);
}

#[tokio::test]
async fn test_resume_after_interruption_matches_full_run() {
    let server = MockServer::start().await;
    mount_source(&server, "quotes", 4, Duration::ZERO).await;

    // Uninterrupted reference run
    let full_dir = TempDir::new().unwrap();
    let full_config = common::config(&server, full_dir.path(), 1, &["quotes"]);
    let job = common::jobs(&full_config).remove(0);
    Scheduler::new(&full_config, file_store(&full_dir))
        .run_one(job)
        .await;
    let full = common::output_lines(full_dir.path(), "quotes");
    assert_eq!(full.len(), 4 * QUOTES_PER_PAGE);

    // Interrupted run: stops after two pages with the third page saved
    let dir = TempDir::new().unwrap();
    let store = file_store(&dir);
    let mut config = common::config(&server, dir.path(), 1, &["quotes"]);
    config.sources[0].max_pages = Some(2);
    let job = common::jobs(&config).remove(0);
    let outcome = Scheduler::new(&config, store.clone()).run_one(job).await;
    assert_eq!(outcome.completion, Completion::PageBudget);
    assert!(matches!(
        store.load("quotes").unwrap(),
        ProgressState::InProgress(_)
    ));

    // Resumed run picks up the saved cursor and appends the rest
    config.sources[0].max_pages = None;
    let job = common::jobs(&config).remove(0);
    let outcome = Scheduler::new(&config, store.clone()).run_one(job).await;
    assert_eq!(outcome.completion, Completion::Exhausted);
    assert_eq!(outcome.pages, 2);

    assert_eq!(common::output_lines(dir.path(), "quotes"), full);
}

#[tokio::test]
async fn test_resume_from_hand_written_progress() {
    let server = MockServer::start().await;
    mount_source(&server, "quotes", 3, Duration::ZERO).await;

    let dir = TempDir::new().unwrap();
    let store = file_store(&dir);
    let resume_at = Cursor::parse(&format!("{}{}", server.uri(), page_path("quotes", 3))).unwrap();
    store.save("quotes", &resume_at).unwrap();

    let config = common::config(&server, dir.path(), 1, &["quotes"]);
    let job = common::jobs(&config).remove(0);
    let outcome = Scheduler::new(&config, store.clone()).run_one(job).await;

    assert_eq!(outcome.pages, 1);
    assert_eq!(outcome.items, QUOTES_PER_PAGE as u64);
    let requests = server.received_requests().await.unwrap();
    assert!(requests
        .iter()
        .all(|r| r.url.path() == page_path("quotes", 3)));
}

#[tokio::test]
async fn test_self_linking_page_stops() {
    let server = MockServer::start().await;
    // Page 1 claims page 1 is next
    Mock::given(method("GET"))
        .and(path(page_path("loop", 1)))
        .respond_with(html(quotes_page("loop", 0, true)))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let config = common::config(&server, dir.path(), 1, &["loop"]);
    let store = file_store(&dir);
    let job = common::jobs(&config).remove(0);

    let outcome = Scheduler::new(&config, store.clone()).run_one(job).await;

    assert_eq!(outcome.completion, Completion::LoopDetected);
    assert_eq!(outcome.items, QUOTES_PER_PAGE as u64);
    assert_eq!(store.load("loop").unwrap(), ProgressState::Completed);
}

#[tokio::test]
async fn test_slow_response_times_out_and_stalls() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(page_path("slow", 1)))
        .respond_with(html(quotes_page("slow", 1, false)).set_delay(Duration::from_secs(2)))
        .expect(4)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let mut config = common::config(&server, dir.path(), 1, &["slow"]);
    config.fetch.request_timeout_ms = 100;
    config.fetch.max_retries = 1;

    // One attempt plus one retry, both cut off by the request timeout
    let fetcher = HttpFetcher::new(&config.fetch, &config.user_agent).unwrap();
    let cursor = Cursor::parse(&config.sources[0].url).unwrap();
    match fetcher.fetch(&cursor).await {
        Err(FetchError::Timeout { attempts, .. }) => assert_eq!(attempts, 2),
        other => panic!("expected a timeout, got {:?}", other.map(|p| p.status)),
    }

    let store = file_store(&dir);
    let job = common::jobs(&config).remove(0);
    let outcome = Scheduler::new(&config, store.clone()).run_one(job).await;

    assert_eq!(outcome.completion, Completion::Stalled);
    assert_eq!(outcome.items, 0);
    assert_eq!(outcome.skipped_pages, 1);
    assert_eq!(store.load("slow").unwrap(), ProgressState::NeverRun);
}

#[tokio::test]
async fn test_resume_cuts_torn_last_line() {
    let server = MockServer::start().await;
    mount_source(&server, "quotes", 3, Duration::ZERO).await;

    let full_dir = TempDir::new().unwrap();
    let full_config = common::config(&server, full_dir.path(), 1, &["quotes"]);
    let job = common::jobs(&full_config).remove(0);
    Scheduler::new(&full_config, file_store(&full_dir))
        .run_one(job)
        .await;
    let full = common::output_lines(full_dir.path(), "quotes");

    // First page written and page 2 saved, then a crash inside the next write
    let dir = TempDir::new().unwrap();
    let store = file_store(&dir);
    let mut config = common::config(&server, dir.path(), 1, &["quotes"]);
    config.sources[0].max_pages = Some(1);
    let job = common::jobs(&config).remove(0);
    Scheduler::new(&config, store.clone()).run_one(job).await;

    let output = jsonl_path(dir.path(), "quotes");
    let mut file = std::fs::OpenOptions::new()
        .append(true)
        .open(&output)
        .unwrap();
    file.write_all(br#"{"source":"quo"#).unwrap();
    drop(file);

    config.sources[0].max_pages = None;
    let job = common::jobs(&config).remove(0);
    let outcome = Scheduler::new(&config, store).run_one(job).await;
    assert_eq!(outcome.completion, Completion::Exhausted);
    assert_eq!(outcome.items, 2 * QUOTES_PER_PAGE as u64);

    assert_eq!(common::output_lines(dir.path(), "quotes"), full);
    let merged = aggregate_jsonl(dir.path(), &["quotes"], &dir.path().join("all.json")).unwrap();
    assert_eq!(merged, 3 * QUOTES_PER_PAGE);
}

#[tokio::test]
async fn test_unreadable_progress_keeps_existing_output() {
    let server = MockServer::start().await;
    mount_source(&server, "quotes", 3, Duration::ZERO).await;

    let dir = TempDir::new().unwrap();
    let store = FileProgressStore::new(dir.path()).unwrap();
    std::fs::write(store.path_for("quotes"), "not a cursor").unwrap();
    let output = jsonl_path(dir.path(), "quotes");
    std::fs::write(&output, "{\"source\":\"quotes\",\"title\":\"earlier\"}\n").unwrap();

    let config = common::config(&server, dir.path(), 1, &["quotes"]);
    let job = common::jobs(&config).remove(0);
    let outcome = Scheduler::new(&config, Arc::new(store)).run_one(job).await;

    assert!(outcome.is_fatal());
    let lines = common::output_lines(dir.path(), "quotes");
    assert_eq!(lines.len(), 1);
    assert!(lines[0].contains("earlier"));
    assert!(server.received_requests().await.unwrap().is_empty());
}
