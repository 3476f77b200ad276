use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    AdvanceViewport,
    Settle(Duration),
    Extract,
    MeasureProgress,
    Cooldown(Duration),
    Finish(Termination),
}

/// Why a run stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// Patience ran out: the feed stopped growing.
    Converged,
    /// The iteration ceiling was hit first.
    Exhausted,
    /// The caller cancelled; the working set so far is kept.
    Cancelled,
}
