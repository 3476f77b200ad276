//! Harvester core: item model, deduplication and the pure pagination state machine.
mod config;
mod effect;
mod item;
mod merge;
mod msg;
mod retry;
mod state;
mod update;
mod view_model;

pub use config::{ConfigError, PaginationConfig};
pub use effect::{Effect, Termination};
pub use item::{Item, QuotedItem};
pub use merge::{merge, merge_counted, WorkingSet};
pub use msg::Msg;
pub use retry::RetryPolicy;
pub use state::{PaginationState, Phase};
pub use update::update;
pub use view_model::ProgressSnapshot;

/// Default capacity of the persistent item store.
pub const STORE_CAPACITY: usize = 500;
