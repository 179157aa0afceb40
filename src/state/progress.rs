use crate::state::Cursor;

/// Persisted pagination progress of one source
///
/// Distinguishes a source that was never crawled from one whose last crawl
/// reached the end of its pagination. Both start over from the configured
/// start cursor; only `InProgress` resumes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressState {
    /// Nothing was ever saved for this source
    NeverRun,

    /// A crawl stopped before the end; this is the next page to fetch
    InProgress(Cursor),

    /// The last crawl reached a page without a next link
    Completed,
}

impl ProgressState {
    /// The cursor to resume from, if any
    pub fn resume_cursor(&self) -> Option<&Cursor> {
        match self {
            Self::InProgress(cursor) => Some(cursor),
            Self::NeverRun | Self::Completed => None,
        }
    }

    /// Converts the status part to a database string representation
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::NeverRun => "never_run",
            Self::InProgress(_) => "in_progress",
            Self::Completed => "completed",
        }
    }
}
