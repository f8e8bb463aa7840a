/// Crawl phase definitions
///
/// One scope (a county during discovery, a road list during detail crawls)
/// moves through these phases. Every target is fully fetched, extracted and
/// accumulated before the next begins.
use crate::ScoutError;
use std::fmt;

/// Represents the current phase of a crawl scope
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CrawlPhase {
    /// No scope has started
    Idle,

    /// Building the list of targets (county index, stored roads)
    ListingTargets,

    /// Navigating to the current target
    Fetching,

    /// Running extraction against the loaded page
    Extracting,

    /// Handing extracted records to the batch accumulator
    Accumulating,

    /// Waiting before the next target; abandoned targets land here too
    Delaying,

    /// Scope finished or cancelled; the partial batch has been flushed
    Done,
}

impl CrawlPhase {
    /// Returns true if moving from `self` to `next` is allowed
    pub fn can_transition_to(&self, next: CrawlPhase) -> bool {
        use CrawlPhase::*;

        matches!(
            (self, next),
            (Idle, ListingTargets)
                | (ListingTargets, Fetching)
                | (ListingTargets, Done)
                | (Fetching, Extracting)
                | (Fetching, Delaying)
                | (Extracting, Accumulating)
                | (Accumulating, Delaying)
                | (Delaying, Fetching)
                | (Delaying, Done)
                | (Done, Idle)
        )
    }

    /// Returns true once the scope has finished
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::ListingTargets => "listing_targets",
            Self::Fetching => "fetching",
            Self::Extracting => "extracting",
            Self::Accumulating => "accumulating",
            Self::Delaying => "delaying",
            Self::Done => "done",
        }
    }
}

impl fmt::Display for CrawlPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tracks the phase of one crawl scope
#[derive(Debug)]
pub struct PhaseTracker {
    current: CrawlPhase,
}

impl PhaseTracker {
    pub fn new() -> Self {
        Self {
            current: CrawlPhase::Idle,
        }
    }

    pub fn current(&self) -> CrawlPhase {
        self.current
    }

    /// Moves to `next`, failing on a transition the state machine does not allow
    pub fn advance(&mut self, next: CrawlPhase) -> Result<(), ScoutError> {
        if !self.current.can_transition_to(next) {
            return Err(ScoutError::InvalidTransition {
                from: self.current,
                to: next,
            });
        }

        tracing::trace!("Phase {} -> {}", self.current, next);
        self.current = next;
        Ok(())
    }
}

impl Default for PhaseTracker {
    fn default() -> Self {
        Self::new()
    }
}
