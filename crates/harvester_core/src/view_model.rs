use crate::Phase;

/// Read-only view of a run's bookkeeping, for progress reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ProgressSnapshot {
    pub phase: Phase,
    pub iteration: u32,
    pub patience: u32,
    pub previous_height: u64,
    pub items: usize,
}
