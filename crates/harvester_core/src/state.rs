use crate::view_model::ProgressSnapshot;
use crate::{Item, PaginationConfig, WorkingSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Idle,
    Scrolling,
    Extracting,
    EvaluatingProgress,
    Converged,
    Exhausted,
    Cancelled,
}

impl Phase {
    pub fn is_terminal(self) -> bool {
        matches!(self, Phase::Converged | Phase::Exhausted | Phase::Cancelled)
    }
}

/// Sub-steps of `Phase::Scrolling`, in the order they happen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) enum ScrollStep {
    CoolingDown,
    #[default]
    Advancing,
    Settling,
}

/// State of one pagination run. Owned by exactly one driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaginationState {
    config: PaginationConfig,
    phase: Phase,
    scroll_step: ScrollStep,
    previous_height: u64,
    patience: u32,
    iteration: u32,
    working_set: WorkingSet,
}

impl PaginationState {
    pub fn new(config: PaginationConfig) -> Self {
        Self {
            config,
            phase: Phase::Idle,
            scroll_step: ScrollStep::default(),
            previous_height: 0,
            patience: 0,
            iteration: 0,
            working_set: WorkingSet::new(),
        }
    }

    pub fn config(&self) -> &PaginationConfig {
        &self.config
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn iteration(&self) -> u32 {
        self.iteration
    }

    pub fn patience(&self) -> u32 {
        self.patience
    }

    pub fn previous_height(&self) -> u64 {
        self.previous_height
    }

    pub fn working_set(&self) -> &WorkingSet {
        &self.working_set
    }

    /// Consumes the state, handing over the accumulated items.
    pub fn into_items(self) -> Vec<Item> {
        self.working_set.into_items()
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            phase: self.phase,
            iteration: self.iteration,
            patience: self.patience,
            previous_height: self.previous_height,
            items: self.working_set.len(),
        }
    }

    pub(crate) fn scroll_step(&self) -> ScrollStep {
        self.scroll_step
    }

    pub(crate) fn begin(&mut self) {
        self.previous_height = 0;
        self.patience = 0;
        self.iteration = 0;
        self.working_set = WorkingSet::new();
        self.enter_scrolling(ScrollStep::Advancing);
    }

    pub(crate) fn enter_scrolling(&mut self, step: ScrollStep) {
        self.phase = Phase::Scrolling;
        self.scroll_step = step;
    }

    pub(crate) fn set_scroll_step(&mut self, step: ScrollStep) {
        self.scroll_step = step;
    }

    pub(crate) fn set_phase(&mut self, phase: Phase) {
        self.phase = phase;
    }

    pub(crate) fn absorb(&mut self, items: Vec<Item>) -> usize {
        self.working_set.absorb(items)
    }

    /// Applies one progress reading and advances the iteration counter.
    /// A failed reading counts as "no change".
    pub(crate) fn record_progress(&mut self, height: Option<u64>) {
        match height {
            Some(current) if current != self.previous_height => {
                self.patience = 0;
                self.previous_height = current;
            }
            _ => self.patience += 1,
        }
        self.iteration += 1;
    }
}
