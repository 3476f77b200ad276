use std::sync::Arc;
use std::time::Duration;

use engine_logging::{engine_debug, engine_error, engine_info, engine_warn};
use harvester_core::{update, Effect, Item, Msg, PaginationConfig, PaginationState, Termination};
use tokio_util::sync::CancellationToken;

use crate::collab::{Extractor, NullSink, ProgressGauge, ProgressSink, ViewportAdvancer};
use crate::store::BoundedStore;
use crate::types::{ExtractError, HarvestEvent, HarvestOutcome, MergeOutcome, StoreError};

/// Runs the pagination state machine against live collaborators.
///
/// One driver run is a single-shot batch: callers must not start two runs
/// against the same feed session at once.
pub struct PaginationDriver {
    config: PaginationConfig,
    extractor: Arc<dyn Extractor>,
    advancer: Arc<dyn ViewportAdvancer>,
    gauge: Arc<dyn ProgressGauge>,
    sink: Arc<dyn ProgressSink>,
}

impl PaginationDriver {
    pub fn new(
        config: PaginationConfig,
        extractor: Arc<dyn Extractor>,
        advancer: Arc<dyn ViewportAdvancer>,
        gauge: Arc<dyn ProgressGauge>,
    ) -> Self {
        Self {
            config,
            extractor,
            advancer,
            gauge,
            sink: Arc::new(NullSink),
        }
    }

    pub fn with_sink(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn config(&self) -> &PaginationConfig {
        &self.config
    }

    /// Drives the feed until it converges, hits the iteration ceiling or is
    /// cancelled. Collaborator failures never abort the run.
    pub async fn run(&self, cancel: &CancellationToken) -> HarvestOutcome {
        engine_info!(
            "Harvest started (patience {}, max iterations {})",
            self.config.patience_threshold,
            self.config.max_iterations
        );
        let (mut state, mut effect) = update(PaginationState::new(self.config), Msg::Start);

        loop {
            let Some(current) = effect else {
                engine_error!("Pagination stalled in phase {:?}", state.phase());
                return self.finish(state, Termination::Cancelled);
            };
            if let Effect::Finish(termination) = current {
                return self.finish(state, termination);
            }

            let msg = if cancel.is_cancelled() {
                Msg::Cancel
            } else {
                self.execute(current, &state, cancel).await
            };
            let measured = matches!(msg, Msg::Measured(_));
            (state, effect) = update(state, msg);

            if measured {
                let snapshot = state.snapshot();
                engine_debug!(
                    "Iteration {}: height {} patience {} items {}",
                    snapshot.iteration,
                    snapshot.previous_height,
                    snapshot.patience,
                    snapshot.items
                );
                self.sink.emit(HarvestEvent::IterationCompleted(snapshot));
            }
        }
    }

    async fn execute(
        &self,
        effect: Effect,
        state: &PaginationState,
        cancel: &CancellationToken,
    ) -> Msg {
        match effect {
            Effect::AdvanceViewport => {
                if let Err(err) = self.advancer.advance().await {
                    engine_warn!("Iteration {}: {}", state.iteration() + 1, err);
                }
                Msg::ViewportAdvanced
            }
            Effect::Settle(delay) => {
                if pause(delay, cancel).await {
                    Msg::Settled
                } else {
                    Msg::Cancel
                }
            }
            Effect::Extract => match self.extract_with_retry(cancel).await {
                Some(items) => Msg::Extracted(items),
                None => Msg::Cancel,
            },
            Effect::MeasureProgress => match self.gauge.measure().await {
                Ok(height) => Msg::Measured(Some(height)),
                Err(err) => {
                    engine_warn!("Iteration {}: {}", state.iteration() + 1, err);
                    Msg::Measured(None)
                }
            },
            Effect::Cooldown(delay) => {
                engine_info!("Cooling down for {:?} to avoid rate limiting", delay);
                if pause(delay, cancel).await {
                    Msg::CooledDown
                } else {
                    Msg::Cancel
                }
            }
            Effect::Finish(_) => Msg::Cancel,
        }
    }

    /// Extracts, retrying rate-limited attempts per the retry policy.
    /// Returns `None` only when cancelled while waiting.
    async fn extract_with_retry(&self, cancel: &CancellationToken) -> Option<Vec<Item>> {
        let policy = self.config.retry;
        let mut attempt = 1;
        loop {
            match self.extractor.extract().await {
                Ok(mut items) => {
                    let before = items.len();
                    items.retain(Item::is_admissible);
                    if items.len() < before {
                        engine_debug!("Dropped {} empty entries", before - items.len());
                    }
                    return Some(items);
                }
                Err(ExtractError::RateLimited { retry_after }) => {
                    match policy.next_delay(attempt, retry_after) {
                        Some(delay) => {
                            engine_warn!(
                                "Extraction rate limited (attempt {}/{}); retrying in {:?}",
                                attempt,
                                policy.max_attempts,
                                delay
                            );
                            if !pause(delay, cancel).await {
                                return None;
                            }
                            attempt += 1;
                        }
                        None => {
                            engine_warn!(
                                "Extraction still rate limited after {} attempts; skipping iteration",
                                attempt
                            );
                            return Some(Vec::new());
                        }
                    }
                }
                Err(err) => {
                    engine_warn!("Extraction failed: {}; treating as empty", err);
                    return Some(Vec::new());
                }
            }
        }
    }

    fn finish(&self, state: PaginationState, termination: Termination) -> HarvestOutcome {
        let iterations = state.iteration();
        let items = state.into_items();
        engine_info!(
            "Harvest {:?} after {} iterations with {} items",
            termination,
            iterations,
            items.len()
        );
        self.sink.emit(HarvestEvent::Finished {
            termination,
            iterations,
            items: items.len(),
        });
        HarvestOutcome {
            items,
            termination,
            iterations,
        }
    }
}

/// Sleeps unless cancelled first. Returns `false` on cancellation.
async fn pause(duration: Duration, cancel: &CancellationToken) -> bool {
    tokio::select! {
        _ = cancel.cancelled() => false,
        _ = tokio::time::sleep(duration) => true,
    }
}

/// A harvest whose items could not be persisted. The items are handed back
/// so the caller can retry.
#[derive(Debug, thiserror::Error)]
#[error("harvested {} items but could not persist them: {source}", .outcome.items.len())]
pub struct UnpersistedHarvest {
    pub outcome: HarvestOutcome,
    #[source]
    pub source: StoreError,
}

/// Runs `driver` to completion (or cancellation) and merges whatever it
/// collected into `store`.
pub async fn harvest_into(
    driver: &PaginationDriver,
    store: &BoundedStore,
    cancel: &CancellationToken,
) -> Result<(HarvestOutcome, MergeOutcome), UnpersistedHarvest> {
    let outcome = driver.run(cancel).await;
    match store.merge_and_persist(&outcome.items) {
        Ok(merged) => Ok((outcome, merged)),
        Err(source) => Err(UnpersistedHarvest { outcome, source }),
    }
}
