use std::sync::{Arc, PoisonError, RwLock};

use chrono::{DateTime, Utc};
use harvester_core::Item;
use serde::{Deserialize, Serialize};

/// The item most recently picked at random. Persisted with the store so a
/// display running in another process can read it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    pub item: Item,
    pub selected_at: DateTime<Utc>,
}

impl Selection {
    pub fn new(item: Item) -> Self {
        Self {
            item,
            selected_at: Utc::now(),
        }
    }
}

/// In-process mirror of the persisted selection, for a display living in the
/// same process as the store.
///
/// Clones observe the same slot. Pagination never consults it.
#[derive(Debug, Clone, Default)]
pub struct SelectionState {
    inner: Arc<RwLock<Option<Selection>>>,
}

impl SelectionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<Selection> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn set(&self, selection: Option<Selection>) {
        *self.inner.write().unwrap_or_else(PoisonError::into_inner) = selection;
    }
}
