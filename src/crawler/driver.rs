//! Per-source pagination driver
//!
//! A driver walks one source page by page:
//!
//! ```text
//! Idle -> Fetching -> Extracting -> Advancing -> {Fetching | Done | Failed}
//! ```
//!
//! Records of a page are appended to the sink before the next cursor is
//! saved, so after a crash the saved cursor never points past records that
//! were lost.

use crate::config::{ParseErrorPolicy, SourceConfig};
use crate::crawler::fetcher::{FetchError, PageFetcher};
use crate::crawler::Severity;
use crate::extract::{Extractor, Record};
use crate::output::{Completion, RecordSink, SourceOutcome};
use crate::state::{Cursor, DriverState, ProgressState};
use crate::storage::ProgressStore;
use crate::CrawlError;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Counters kept while a driver runs
#[derive(Debug, Default)]
struct Tally {
    items: u64,
    pages: u64,
    skipped_pages: u64,
}

/// Drives one source job from its starting cursor to a terminal state
pub struct Driver<F: PageFetcher> {
    source: SourceConfig,
    extractor: Arc<dyn Extractor>,
    fetcher: F,
    progress: Arc<dyn ProgressStore>,
    sink: Box<dyn RecordSink>,
    state: DriverState,
}

impl<F: PageFetcher> Driver<F> {
    pub fn new(
        source: SourceConfig,
        extractor: Arc<dyn Extractor>,
        fetcher: F,
        progress: Arc<dyn ProgressStore>,
        sink: Box<dyn RecordSink>,
    ) -> Self {
        Self {
            source,
            extractor,
            fetcher,
            progress,
            sink,
            state: DriverState::Idle,
        }
    }

    pub fn state(&self) -> DriverState {
        self.state
    }

    /// Runs the source to completion
    ///
    /// Never returns an error: fatal failures are reported in the outcome.
    pub async fn run(mut self) -> SourceOutcome {
        let started = Instant::now();
        let mut tally = Tally::default();

        let result = self.drive(&mut tally).await;
        let elapsed = started.elapsed();

        let (completion, error) = match result {
            Ok(completion) => {
                tracing::info!(
                    items = tally.items,
                    pages = tally.pages,
                    "Source finished: {}",
                    completion
                );
                (completion, None)
            }
            Err(e) => {
                self.state = DriverState::Failed;
                tracing::error!(items = tally.items, "Source failed: {}", e);
                (Completion::Failed, Some(e.to_string()))
            }
        };

        SourceOutcome {
            source: self.source.name.clone(),
            items: tally.items,
            pages: tally.pages,
            skipped_pages: tally.skipped_pages,
            elapsed,
            completion,
            error,
        }
    }

    async fn drive(&mut self, tally: &mut Tally) -> Result<Completion, CrawlError> {
        let mut cursor = self.starting_cursor()?;
        let mut visited: HashSet<Cursor> = HashSet::new();
        let mut fetched_this_run: u32 = 0;

        loop {
            self.transition(DriverState::Fetching)?;
            visited.insert(cursor.clone());
            tracing::debug!(cursor = %cursor, "Fetching page");

            let page = match self.fetcher.fetch(&cursor).await {
                Ok(page) => page,
                Err(e) => return self.fetch_failed(e, &cursor, tally),
            };
            tally.pages += 1;
            fetched_this_run += 1;

            self.transition(DriverState::Extracting)?;
            let records: Vec<Record> = match self.extractor.records(&page) {
                Ok(fields) => fields
                    .into_iter()
                    .map(|f| Record::new(self.source.name.as_str(), f))
                    .collect(),
                Err(e)
                    if e.is_structural()
                        && self.source.on_parse_error == ParseErrorPolicy::Fail =>
                {
                    return Err(e.into());
                }
                Err(e) => {
                    tracing::warn!(cursor = %cursor, "Skipping page: {}", e);
                    tally.skipped_pages += 1;
                    Vec::new()
                }
            };
            let next = self.extractor.next_cursor(&page);
            drop(page);

            self.transition(DriverState::Advancing)?;
            self.sink.append(&records)?;
            tally.items += records.len() as u64;
            tracing::debug!(cursor = %cursor, records = records.len(), "Page written");

            let next = match next {
                None => {
                    self.progress.clear(&self.source.name)?;
                    self.transition(DriverState::Done)?;
                    return Ok(Completion::Exhausted);
                }
                Some(next) if visited.contains(&next) => {
                    tracing::warn!(
                        cursor = %cursor,
                        next = %next,
                        "Next page was already visited, stopping"
                    );
                    self.progress.clear(&self.source.name)?;
                    self.transition(DriverState::Done)?;
                    return Ok(Completion::LoopDetected);
                }
                Some(next) => next,
            };

            self.progress.save(&self.source.name, &next)?;

            if let Some(max) = self.source.max_pages {
                if fetched_this_run >= max {
                    tracing::info!(next = %next, "Page budget of {} reached", max);
                    self.transition(DriverState::Done)?;
                    return Ok(Completion::PageBudget);
                }
            }

            if self.source.page_delay_ms > 0 {
                tokio::time::sleep(Duration::from_millis(self.source.page_delay_ms)).await;
            }
            cursor = next;
        }
    }

    /// Picks the cursor to start from and prepares the sink
    ///
    /// Only an in-progress crawl resumes; anything else starts over from the
    /// configured url with an emptied output file. Progress that cannot be
    /// read fails the source before the output is touched.
    fn starting_cursor(&mut self) -> Result<Cursor, CrawlError> {
        let state = self.progress.load(&self.source.name)?;

        if let Some(cursor) = state.resume_cursor() {
            tracing::info!(cursor = %cursor, "Resuming");
            let dropped = self.sink.repair_tail()?;
            if dropped > 0 {
                tracing::warn!("Dropped {} byte(s) of a partially written record", dropped);
            }
            return Ok(cursor.clone());
        }

        if state == ProgressState::Completed {
            tracing::info!("Previous crawl completed, starting over");
        } else {
            tracing::info!("Starting fresh crawl");
        }
        self.sink.truncate()?;
        Cursor::parse(&self.source.url).map_err(|e| CrawlError::InvalidCursor {
            value: self.source.url.clone(),
            reason: e.to_string(),
        })
    }

    /// Ends the source after a fetch failure that survived retries
    fn fetch_failed(
        &mut self,
        error: FetchError,
        cursor: &Cursor,
        tally: &mut Tally,
    ) -> Result<Completion, CrawlError> {
        match error.severity() {
            Severity::Fatal => Err(error.into()),
            Severity::Skippable => {
                // Without the page there is no next link; the saved cursor
                // still points here so the next run retries it.
                tracing::warn!(cursor = %cursor, "Page skipped, source stalled: {}", error);
                tally.skipped_pages += 1;
                self.transition(DriverState::Advancing)?;
                self.transition(DriverState::Done)?;
                Ok(Completion::Stalled)
            }
        }
    }

    fn transition(&mut self, next: DriverState) -> Result<(), CrawlError> {
        if !self.state.can_transition_to(next) {
            return Err(CrawlError::InvalidTransition {
                from: self.state,
                to: next,
            });
        }
        tracing::trace!("{} -> {}", self.state, next);
        self.state = next;
        Ok(())
    }
}
