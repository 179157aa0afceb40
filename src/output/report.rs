//! Run report: one outcome per source

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

/// How a source's pagination ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Completion {
    /// A page had no next link; progress cleared
    Exhausted,
    /// The per-run page budget was used up; progress kept
    PageBudget,
    /// A page could not be fetched, so no next link is known; progress kept
    Stalled,
    /// A next link pointed back at an already visited page; progress cleared
    LoopDetected,
    /// A fatal error stopped the source
    Failed,
}

impl Completion {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Exhausted => "exhausted",
            Self::PageBudget => "page_budget",
            Self::Stalled => "stalled",
            Self::LoopDetected => "loop_detected",
            Self::Failed => "failed",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "exhausted" => Some(Self::Exhausted),
            "page_budget" => Some(Self::PageBudget),
            "stalled" => Some(Self::Stalled),
            "loop_detected" => Some(Self::LoopDetected),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

impl fmt::Display for Completion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_db_string())
    }
}

/// Terminal outcome of one source's driver
#[derive(Debug, Clone, PartialEq)]
pub struct SourceOutcome {
    pub source: String,

    /// Records written to the sink during this run
    pub items: u64,

    /// Pages fetched successfully during this run
    pub pages: u64,

    /// Pages whose fetch or extraction failed without stopping the source
    pub skipped_pages: u64,

    pub elapsed: Duration,

    pub completion: Completion,

    /// First fatal error, if the source failed
    pub error: Option<String>,
}

impl SourceOutcome {
    /// Outcome of a source that failed before its driver produced anything
    pub fn failed(source: impl Into<String>, elapsed: Duration, error: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            items: 0,
            pages: 0,
            skipped_pages: 0,
            elapsed,
            completion: Completion::Failed,
            error: Some(error.into()),
        }
    }

    pub fn is_fatal(&self) -> bool {
        self.completion == Completion::Failed
    }
}

/// Outcomes of every source launched in one run
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    outcomes: BTreeMap<String, SourceOutcome>,

    /// Wall time of the whole run
    pub elapsed: Duration,
}

impl RunReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a finished source; a later outcome for the same name replaces it
    pub fn insert(&mut self, outcome: SourceOutcome) {
        self.outcomes.insert(outcome.source.clone(), outcome);
    }

    pub fn get(&self, source: &str) -> Option<&SourceOutcome> {
        self.outcomes.get(source)
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    /// Outcomes ordered by source name
    pub fn iter(&self) -> impl Iterator<Item = &SourceOutcome> {
        self.outcomes.values()
    }

    pub fn total_items(&self) -> u64 {
        self.outcomes.values().map(|o| o.items).sum()
    }

    /// Names of the sources that ended in a fatal failure
    pub fn failed_sources(&self) -> Vec<&str> {
        self.outcomes
            .values()
            .filter(|o| o.is_fatal())
            .map(|o| o.source.as_str())
            .collect()
    }

    /// Formats the report as a plain-text table
    pub fn format_table(&self) -> String {
        let mut out = String::new();

        out.push_str("--- Run Report ---\n");
        out.push_str(&format!(
            "{:<20} {:>8} {:>6} {:>8} {:>9}  {}\n",
            "source", "items", "pages", "skipped", "time (s)", "status"
        ));

        for outcome in self.outcomes.values() {
            let status = match &outcome.error {
                Some(error) => format!("{}: {}", outcome.completion, error),
                None => outcome.completion.to_string(),
            };
            out.push_str(&format!(
                "{:<20} {:>8} {:>6} {:>8} {:>9.2}  {}\n",
                outcome.source,
                outcome.items,
                outcome.pages,
                outcome.skipped_pages,
                outcome.elapsed.as_secs_f64(),
                status
            ));
        }

        out.push_str(&format!(
            "{} source(s), {} item(s), {:.2}s total\n",
            self.outcomes.len(),
            self.total_items(),
            self.elapsed.as_secs_f64()
        ));
        out.push_str("------------------\n");

        out
    }
}

/// Prints the report table to stdout
pub fn print_report(report: &RunReport) {
    print!("{}", report.format_table());
}
