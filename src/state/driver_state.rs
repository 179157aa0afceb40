/// Driver state definitions for tracking pagination progress
///
/// This module defines the states a pagination driver moves through while it
/// walks one source.
use std::fmt;

/// Represents the current state of a pagination driver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DriverState {
    // ===== Active States =====
    /// Driver created, starting cursor not fetched yet
    Idle,

    /// Waiting on the page fetcher
    Fetching,

    /// Running the extractor over a fetched page
    Extracting,

    /// Writing records and persisting the next cursor
    Advancing,

    // ===== Terminal States =====
    /// Pagination finished (exhausted, page budget, loop or stall)
    Done,

    /// A fatal failure stopped the source
    Failed,
}

impl DriverState {
    /// Returns true if this is a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }

    /// Returns true if the driver may move from this state to `next`
    ///
    /// ```text
    /// Idle -> Fetching -> Extracting -> Advancing -> {Fetching | Done | Failed}
    /// ```
    ///
    /// A fetch that fails without being fatal goes straight to `Advancing`
    /// with nothing to write. `Failed` is reachable from every active state.
    pub fn can_transition_to(&self, next: DriverState) -> bool {
        use DriverState::*;

        match (self, next) {
            (Done | Failed, _) => false,
            (_, Failed) => true,
            (Idle, Fetching | Done) => true,
            (Fetching, Extracting | Advancing) => true,
            (Extracting, Advancing) => true,
            (Advancing, Fetching | Done) => true,
            _ => false,
        }
    }

    /// Lowercase name used in logs
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Fetching => "fetching",
            Self::Extracting => "extracting",
            Self::Advancing => "advancing",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for DriverState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
