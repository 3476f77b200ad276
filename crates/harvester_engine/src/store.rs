use std::mem;
use std::num::NonZeroUsize;
use std::sync::{Mutex, PoisonError};

use chrono::Utc;
use engine_logging::{engine_error, engine_info, engine_warn};
use harvester_core::{merge_counted, Item, STORE_CAPACITY};
use rand::Rng;

use crate::backend::StoreBackend;
use crate::selection::{Selection, SelectionState};
use crate::types::{MergeOutcome, StoreError};

/// Capacity-capped, durable collection of every item merged across runs.
///
/// Invariants: identities are unique, `len <= capacity`, and overflow evicts
/// the oldest-inserted items first.
pub struct BoundedStore {
    backend: Box<dyn StoreBackend>,
    capacity: usize,
    write_lock: Mutex<()>,
    selection: SelectionState,
}

impl BoundedStore {
    pub fn new(backend: impl StoreBackend + 'static) -> Self {
        Self::with_capacity(backend, default_capacity())
    }

    pub fn with_capacity(backend: impl StoreBackend + 'static, capacity: NonZeroUsize) -> Self {
        Self {
            backend: Box::new(backend),
            capacity: capacity.get(),
            write_lock: Mutex::new(()),
            selection: SelectionState::new(),
        }
    }

    /// Shares an existing selection slot, e.g. one the display side already holds.
    pub fn with_selection(mut self, selection: SelectionState) -> Self {
        self.selection = selection;
        self
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn selection(&self) -> &SelectionState {
        &self.selection
    }

    pub fn items(&self) -> Result<Vec<Item>, StoreError> {
        Ok(self.backend.load()?.items)
    }

    pub fn len(&self) -> Result<usize, StoreError> {
        Ok(self.backend.load()?.items.len())
    }

    pub fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.len()? == 0)
    }

    /// Reads the persisted selection, which may have been made by another
    /// process, and mirrors it into the local slot.
    pub fn current_selection(&self) -> Result<Option<Selection>, StoreError> {
        let current = self.backend.load()?.current;
        self.selection.set(current.clone());
        Ok(current)
    }

    /// Loads the collection, appends unseen items, evicts from the front down
    /// to capacity, picks a fresh selection and writes the result back.
    ///
    /// Callers on the same backend, in this process or another, are
    /// serialized so no merge is lost. On failure the persisted document is
    /// unchanged and `incoming` may be retried.
    pub fn merge_and_persist(&self, incoming: &[Item]) -> Result<MergeOutcome, StoreError> {
        self.merge_and_persist_with(incoming, &mut rand::rng())
    }

    pub fn merge_and_persist_with<R: Rng + ?Sized>(
        &self,
        incoming: &[Item],
        rng: &mut R,
    ) -> Result<MergeOutcome, StoreError> {
        let (outcome, current) = self.locked(|| {
            let mut document = self.backend.load()?;
            let loaded = document.items.len();
            let (mut merged, added) =
                merge_counted(mem::take(&mut document.items), incoming.iter().cloned());

            let repaired = (loaded + added).saturating_sub(merged.len());
            if repaired > 0 {
                engine_warn!("Dropped {} duplicate items from the stored document", repaired);
            }

            let evicted = merged.len().saturating_sub(self.capacity);
            if evicted > 0 {
                merged.drain(..evicted);
            }
            debug_assert!(
                merged.len() <= self.capacity,
                "store holds {} items, capacity {}",
                merged.len(),
                self.capacity
            );

            document.current = pick(&merged, rng).cloned().map(Selection::new);
            document.items = merged;
            document.last_updated = Some(Utc::now());

            if let Err(err) = self.backend.store(&document) {
                engine_error!("Failed to persist {} items: {}", document.items.len(), err);
                return Err(err.into());
            }

            let outcome = MergeOutcome {
                added,
                total: document.items.len(),
                evicted,
            };
            Ok((outcome, document.current))
        })?;

        self.selection.set(current);
        engine_info!("Store merge: {}", outcome);
        Ok(outcome)
    }

    /// Picks one stored item with probability `1/len` and persists it as the
    /// current selection. An empty store yields `Ok(None)`.
    pub fn sample_uniform(&self) -> Result<Option<Item>, StoreError> {
        self.sample_with(&mut rand::rng())
    }

    pub fn sample_with<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<Option<Item>, StoreError> {
        let picked = self.locked(|| {
            let mut document = self.backend.load()?;
            let Some(item) = pick(&document.items, rng).cloned() else {
                return Ok(None);
            };
            let selection = Selection::new(item);
            document.current = Some(selection.clone());
            self.backend.store(&document)?;
            Ok(Some(selection))
        })?;

        match picked {
            Some(selection) => {
                let item = selection.item.clone();
                self.selection.set(Some(selection));
                Ok(Some(item))
            }
            None => {
                engine_info!("No items in store to sample");
                Ok(None)
            }
        }
    }

    /// Runs `op` holding both the in-process writer mutex and the backend's
    /// exclusive section.
    fn locked<T>(
        &self,
        mut op: impl FnMut() -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut result = None;
        self.backend.exclusive(&mut || -> Result<(), StoreError> {
            result = Some(op()?);
            Ok(())
        })?;
        result.ok_or(StoreError::LockSkipped)
    }
}

fn pick<'a, R: Rng + ?Sized>(items: &'a [Item], rng: &mut R) -> Option<&'a Item> {
    if items.is_empty() {
        return None;
    }
    items.get(rng.random_range(0..items.len()))
}

fn default_capacity() -> NonZeroUsize {
    NonZeroUsize::new(STORE_CAPACITY).unwrap_or(NonZeroUsize::MIN)
}
