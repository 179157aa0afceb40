//! Source scheduler: runs one driver per source under a worker limit
//!
//! This module handles:
//! - Binding configured sources to their extractors
//! - Global concurrency limiting via a semaphore
//! - Isolating sources from each other's failures and panics
//! - Collecting per-source outcomes into the run report

use crate::config::{Config, FetchConfig, SourceConfig, UserAgentConfig};
use crate::crawler::driver::Driver;
use crate::crawler::fetcher::HttpFetcher;
use crate::extract::{Extractor, ExtractorRegistry};
use crate::output::{JsonlSink, RunReport, SourceOutcome};
use crate::storage::{ProgressStore, RunHistory};
use crate::CrawlError;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::Instrument;

/// One configured source bound to its extractor
#[derive(Clone)]
pub struct SourceJob {
    pub config: SourceConfig,
    pub extractor: Arc<dyn Extractor>,
}

impl SourceJob {
    pub fn new(config: SourceConfig, extractor: Arc<dyn Extractor>) -> Self {
        Self { config, extractor }
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }
}

/// Builds a job for every enabled source
///
/// # Arguments
///
/// * `config` - The crawler configuration
/// * `registry` - Extractors available by key
///
/// # Returns
///
/// * `Ok(Vec<SourceJob>)` - One job per enabled source, in config order
/// * `Err(CrawlError::UnknownExtractor)` - A source names an unregistered extractor
pub fn build_jobs(config: &Config, registry: &ExtractorRegistry) -> Result<Vec<SourceJob>, CrawlError> {
    config
        .enabled_sources()
        .map(|source| {
            let extractor = registry.build(source)?;
            Ok(SourceJob::new(source.clone(), extractor))
        })
        .collect()
}

/// Everything a spawned job needs, cloned per task
#[derive(Clone)]
struct JobContext {
    output_dir: PathBuf,
    fetch: FetchConfig,
    user_agent: UserAgentConfig,
    progress: Arc<dyn ProgressStore>,
}

/// Runs source jobs concurrently with at most `max_workers` active at once
pub struct Scheduler {
    max_workers: usize,
    context: JobContext,
    history: Option<(Arc<dyn RunHistory>, i64)>,
}

impl Scheduler {
    pub fn new(config: &Config, progress: Arc<dyn ProgressStore>) -> Self {
        Self {
            max_workers: config.settings.max_workers.max(1),
            context: JobContext {
                output_dir: PathBuf::from(&config.settings.output_dir),
                fetch: config.fetch.clone(),
                user_agent: config.user_agent.clone(),
                progress,
            },
            history: None,
        }
    }

    pub fn with_max_workers(mut self, max_workers: usize) -> Self {
        self.max_workers = max_workers.max(1);
        self
    }

    /// Records each outcome in the run history as soon as its source ends
    pub fn with_history(mut self, history: Arc<dyn RunHistory>, run_id: i64) -> Self {
        self.history = Some((history, run_id));
        self
    }

    pub fn max_workers(&self) -> usize {
        self.max_workers
    }

    /// Runs every job and waits for all of them
    ///
    /// A job that fails or panics only affects its own report entry. Jobs
    /// repeating an already scheduled source name are skipped.
    pub async fn run(&self, jobs: Vec<SourceJob>) -> RunReport {
        let started = Instant::now();
        let semaphore = Arc::new(Semaphore::new(self.max_workers));
        let mut seen = HashSet::new();
        let mut tasks = JoinSet::new();

        tracing::info!(
            "Scheduling {} source(s) with {} worker(s)",
            jobs.len(),
            self.max_workers
        );

        for job in jobs {
            if !seen.insert(job.config.name.clone()) {
                tracing::warn!(source = %job.name(), "Duplicate source skipped");
                continue;
            }

            let semaphore = semaphore.clone();
            let context = self.context.clone();

            tasks.spawn(async move {
                let name = job.config.name.clone();
                let _permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(e) => {
                        return SourceOutcome::failed(name, Default::default(), e.to_string())
                    }
                };

                // Inner task so a panicking driver still yields a named outcome
                let job_started = Instant::now();
                match tokio::spawn(run_job(context, job)).await {
                    Ok(outcome) => outcome,
                    Err(e) => {
                        tracing::error!(source = %name, "Source task died: {}", e);
                        SourceOutcome::failed(
                            name,
                            job_started.elapsed(),
                            format!("source task died: {}", e),
                        )
                    }
                }
            });
        }

        let mut report = RunReport::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(outcome) => {
                    self.record(&outcome);
                    report.insert(outcome);
                }
                Err(e) => tracing::error!("Scheduler task failed: {}", e),
            }
        }
        report.elapsed = started.elapsed();

        tracing::info!(
            "Run finished in {:.2}s: {} item(s), {} failed source(s)",
            report.elapsed.as_secs_f64(),
            report.total_items(),
            report.failed_sources().len()
        );
        report
    }

    /// Runs a single job without the worker pool
    pub async fn run_one(&self, job: SourceJob) -> SourceOutcome {
        let outcome = run_job(self.context.clone(), job).await;
        self.record(&outcome);
        outcome
    }

    fn record(&self, outcome: &SourceOutcome) {
        if let Some((history, run_id)) = &self.history {
            if let Err(e) = history.record_outcome(*run_id, outcome) {
                tracing::warn!(source = %outcome.source, "Failed to record outcome: {}", e);
            }
        }
    }
}

/// Builds the job's fetcher and sink, then drives it to the end
///
/// The fetcher lives exactly as long as the job.
async fn run_job(context: JobContext, job: SourceJob) -> SourceOutcome {
    let started = Instant::now();
    let name = job.config.name.clone();
    let span = tracing::info_span!("source", source = %name);

    let fetcher = match HttpFetcher::new(&context.fetch, &context.user_agent) {
        Ok(fetcher) => fetcher,
        Err(e) => {
            let _enter = span.enter();
            tracing::error!("Cannot build HTTP client: {}", e);
            return SourceOutcome::failed(name, started.elapsed(), CrawlError::from(e).to_string());
        }
    };

    let sink = match JsonlSink::open(&context.output_dir, &name) {
        Ok(sink) => sink,
        Err(e) => {
            let _enter = span.enter();
            tracing::error!("Cannot open output: {}", e);
            return SourceOutcome::failed(name, started.elapsed(), CrawlError::from(e).to_string());
        }
    };

    Driver::new(
        job.config,
        job.extractor,
        fetcher,
        context.progress,
        Box::new(sink),
    )
    .run()
    .instrument(span)
    .await
}
