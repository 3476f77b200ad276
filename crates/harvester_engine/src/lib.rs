//! Harvester engine: collaborator boundaries, the async pagination driver and
//! the bounded persistent store.
mod backend;
mod collab;
mod decode;
mod driver;
mod export;
mod extract;
mod persist;
mod replay;
mod selection;
mod store;
mod types;

pub use backend::{JsonFileBackend, MemoryBackend, StoreBackend, StoreDocument};
pub use collab::{
    ChannelProgressSink, Extractor, NullSink, ProgressGauge, ProgressSink, RenderedContent,
    ViewportAdvancer,
};
pub use decode::{decode_snapshot, DecodeError};
pub use driver::{harvest_into, PaginationDriver, UnpersistedHarvest};
pub use export::{export_items, items_to_csv, ExportError, ExportFormat, ExportSummary};
pub use extract::{Clock, FeedSelectors, HtmlFeedExtractor};
pub use persist::{ensure_dir, AtomicFileWriter, PersistError};
pub use replay::{SnapshotError, SnapshotFeed};
pub use selection::{Selection, SelectionState};
pub use store::BoundedStore;
pub use types::{
    AdvanceError, ExtractError, HarvestEvent, HarvestOutcome, MeasureError, MergeOutcome,
    StoreError,
};
