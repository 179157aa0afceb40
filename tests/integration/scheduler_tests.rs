//! Several sources under the worker pool

use crate::common::{self, mount_source, page_path, QUOTES_PER_PAGE};
use pagecrawl::crawler::Scheduler;
use pagecrawl::output::Completion;
use pagecrawl::storage::{FileProgressStore, ProgressStore, RunHistory, RunStatus, SqliteStorage};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn file_store(dir: &TempDir) -> Arc<dyn ProgressStore> {
    Arc::new(FileProgressStore::new(dir.path()).unwrap())
}

#[tokio::test]
async fn test_two_sources_survive_transient_503s() {
    let server = MockServer::start().await;

    // Source a: page 3 answers 503 three times before succeeding
    Mock::given(method("GET"))
        .and(path(page_path("a", 3)))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(3)
        .mount(&server)
        .await;
    mount_source(&server, "a", 3, Duration::ZERO).await;
    mount_source(&server, "b", 3, Duration::ZERO).await;

    let dir = TempDir::new().unwrap();
    let config = common::config(&server, dir.path(), 2, &["a", "b"]);

    let report = Scheduler::new(&config, file_store(&dir))
        .run(common::jobs(&config))
        .await;

    assert_eq!(report.len(), 2);
    for name in ["a", "b"] {
        let outcome = report.get(name).unwrap();
        assert_eq!(outcome.completion, Completion::Exhausted, "{}", name);
        assert_eq!(outcome.items, 3 * QUOTES_PER_PAGE as u64, "{}", name);
        assert_eq!(outcome.skipped_pages, 0);
        assert_eq!(
            common::output_lines(dir.path(), name).len(),
            3 * QUOTES_PER_PAGE
        );
    }
    assert!(report.failed_sources().is_empty());
}

#[tokio::test]
async fn test_blocked_source_does_not_affect_the_other() {
    let server = MockServer::start().await;
    mount_source(&server, "a", 3, Duration::from_millis(50)).await;
    Mock::given(method("GET"))
        .and(path(page_path("b", 1)))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let config = common::config(&server, dir.path(), 2, &["a", "b"]);

    let report = Scheduler::new(&config, file_store(&dir))
        .run(common::jobs(&config))
        .await;

    assert_eq!(report.len(), 2);

    let b = report.get("b").unwrap();
    assert!(b.is_fatal());
    assert_eq!(b.items, 0);
    assert!(b.error.as_deref().unwrap().contains("403"));

    let a = report.get("a").unwrap();
    assert_eq!(a.completion, Completion::Exhausted);
    assert_eq!(a.items, 3 * QUOTES_PER_PAGE as u64);
    assert!(a.error.is_none());

    assert_eq!(report.failed_sources(), vec!["b"]);
}

#[tokio::test]
async fn test_single_worker_runs_sources_one_after_another() {
    let delay = Duration::from_millis(400);
    let server = MockServer::start().await;
    mount_source(&server, "a", 1, delay).await;
    mount_source(&server, "b", 1, delay).await;

    let dir = TempDir::new().unwrap();
    let config = common::config(&server, dir.path(), 1, &["a", "b"]);

    let report = Scheduler::new(&config, file_store(&dir))
        .run(common::jobs(&config))
        .await;

    assert_eq!(report.len(), 2);
    assert!(
        report.elapsed >= delay * 2,
        "expected roughly the sum of both sources, took {:?}",
        report.elapsed
    );
}

#[tokio::test]
async fn test_enough_workers_run_sources_together() {
    let delay = Duration::from_millis(400);
    let server = MockServer::start().await;
    mount_source(&server, "a", 1, delay).await;
    mount_source(&server, "b", 1, delay).await;

    let dir = TempDir::new().unwrap();
    let config = common::config(&server, dir.path(), 2, &["a", "b"]);

    let report = Scheduler::new(&config, file_store(&dir))
        .run(common::jobs(&config))
        .await;

    assert_eq!(report.len(), 2);
    assert!(report.elapsed >= delay);
    assert!(
        report.elapsed < delay * 2 - Duration::from_millis(50),
        "expected roughly the slowest source, took {:?}",
        report.elapsed
    );
}

#[tokio::test]
async fn test_duplicate_jobs_run_once() {
    let server = MockServer::start().await;
    mount_source(&server, "a", 1, Duration::ZERO).await;

    let dir = TempDir::new().unwrap();
    let config = common::config(&server, dir.path(), 2, &["a"]);
    let mut jobs = common::jobs(&config);
    jobs.push(jobs[0].clone());

    let report = Scheduler::new(&config, file_store(&dir)).run(jobs).await;

    assert_eq!(report.len(), 1);
    assert_eq!(
        common::output_lines(dir.path(), "a").len(),
        QUOTES_PER_PAGE
    );
}

#[tokio::test]
async fn test_outcomes_are_recorded_in_run_history() {
    let server = MockServer::start().await;
    mount_source(&server, "a", 2, Duration::ZERO).await;
    Mock::given(method("GET"))
        .and(path(page_path("b", 1)))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let config = common::config(&server, dir.path(), 2, &["a", "b"]);
    let database = Arc::new(SqliteStorage::new(&dir.path().join("pagecrawl.db")).unwrap());
    let run_id = database.create_run("hash").unwrap();

    let report = Scheduler::new(&config, database.clone())
        .with_history(database.clone(), run_id)
        .run(common::jobs(&config))
        .await;
    database.finish_run(run_id, RunStatus::Completed).unwrap();

    let recorded = database.get_outcomes(run_id).unwrap();
    assert_eq!(recorded.len(), 2);
    assert_eq!(recorded[0].source, "a");
    assert_eq!(recorded[0].items, report.get("a").unwrap().items);
    assert_eq!(recorded[1].completion, Completion::Failed);

    let run = database.get_run(run_id).unwrap();
    assert_eq!(run.status, RunStatus::Completed);
}
