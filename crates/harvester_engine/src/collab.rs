//! Boundaries to the browser-automation layer that renders the feed.

use harvester_core::Item;

use crate::types::{AdvanceError, ExtractError, HarvestEvent, MeasureError};

/// Produces the items visible right now, in page order.
///
/// Calling it twice without an intervening advance returns the same items.
/// Entries with neither text nor link are filtered out; missing optional
/// fields are `None`, not errors.
#[async_trait::async_trait]
pub trait Extractor: Send + Sync {
    async fn extract(&self) -> Result<Vec<Item>, ExtractError>;
}

/// Moves the viewport further down the feed.
#[async_trait::async_trait]
pub trait ViewportAdvancer: Send + Sync {
    async fn advance(&self) -> Result<(), AdvanceError>;
}

/// Reports a monotonic measure of how much content has been rendered.
#[async_trait::async_trait]
pub trait ProgressGauge: Send + Sync {
    async fn measure(&self) -> Result<u64, MeasureError>;
}

/// Read-only handle onto the currently rendered page markup.
#[async_trait::async_trait]
pub trait RenderedContent: Send + Sync {
    async fn snapshot(&self) -> Result<String, ExtractError>;
}

#[async_trait::async_trait]
impl<T: RenderedContent + ?Sized> RenderedContent for std::sync::Arc<T> {
    async fn snapshot(&self) -> Result<String, ExtractError> {
        (**self).snapshot().await
    }
}

pub trait ProgressSink: Send + Sync {
    fn emit(&self, event: HarvestEvent);
}

/// Sink that drops every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl ProgressSink for NullSink {
    fn emit(&self, _event: HarvestEvent) {}
}

/// Forwards events over a channel, e.g. to a UI thread.
pub struct ChannelProgressSink {
    tx: std::sync::mpsc::Sender<HarvestEvent>,
}

impl ChannelProgressSink {
    pub fn new(tx: std::sync::mpsc::Sender<HarvestEvent>) -> Self {
        Self { tx }
    }
}

impl ProgressSink for ChannelProgressSink {
    fn emit(&self, event: HarvestEvent) {
        let _ = self.tx.send(event);
    }
}
