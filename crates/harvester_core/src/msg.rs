use crate::Item;

/// Inputs to the pagination state machine. Each one reports the completion of
/// the effect the machine last asked for, except `Start` and `Cancel`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Msg {
    /// Begin a run from `Idle`.
    Start,
    /// The viewport-advance side effect returned (successfully or not).
    ViewportAdvanced,
    /// The post-advance settle delay elapsed.
    Settled,
    /// Items visible after settling. A failed extraction is reported as empty.
    Extracted(Vec<Item>),
    /// Content extent after the iteration; `None` when measurement failed.
    Measured(Option<u64>),
    /// The periodic cooldown pause elapsed.
    CooledDown,
    /// Caller-issued cancellation.
    Cancel,
}
