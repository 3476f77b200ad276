use std::fmt;
use std::time::Duration;

use harvester_core::{Item, ProgressSnapshot, Termination};

use crate::persist::PersistError;

/// Failure of the extraction collaborator. Never fatal to a harvest.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExtractError {
    #[error("rendered content unavailable: {0}")]
    Unavailable(String),
    #[error("rate limited (retry after {retry_after:?})")]
    RateLimited { retry_after: Option<Duration> },
    #[error("invalid selector {selector:?}: {message}")]
    InvalidSelector { selector: String, message: String },
}

/// Failure of the viewport-advance collaborator. Logged and absorbed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("viewport advance failed: {0}")]
pub struct AdvanceError(pub String);

/// Failure of the progress-measurement collaborator. Counts as "no change".
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("progress measurement failed: {0}")]
pub struct MeasureError(pub String);

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("persistence failed: {0}")]
    Persist(#[from] PersistError),
    #[error("store backend returned without running the locked section")]
    LockSkipped,
}

/// Result of merging a batch into the bounded store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MergeOutcome {
    /// Items from the batch that were not already stored.
    pub added: usize,
    /// Store size after eviction.
    pub total: usize,
    /// Oldest items dropped to respect the capacity.
    pub evicted: usize,
}

impl fmt::Display for MergeOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "added {} (total {}", self.added, self.total)?;
        if self.evicted > 0 {
            write!(f, ", evicted {}", self.evicted)?;
        }
        write!(f, ")")
    }
}

/// What a finished pagination run hands back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarvestOutcome {
    pub items: Vec<Item>,
    pub termination: Termination,
    pub iterations: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HarvestEvent {
    IterationCompleted(ProgressSnapshot),
    Finished {
        termination: Termination,
        iterations: u32,
        items: usize,
    },
}
