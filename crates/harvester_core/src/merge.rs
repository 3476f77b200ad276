use std::collections::HashSet;

use crate::Item;

/// Returns `base` followed by every item of `incoming` whose url is not
/// already present. The first occurrence of a url wins, including repeats
/// inside `incoming` itself.
///
/// A well-formed `base` comes back unchanged. A `base` that already holds
/// duplicate urls (a damaged store document) is repaired: later copies are
/// dropped.
pub fn merge(base: Vec<Item>, incoming: impl IntoIterator<Item = Item>) -> Vec<Item> {
    merge_counted(base, incoming).0
}

/// Same as [`merge`], also reporting how many items were appended.
pub fn merge_counted(
    base: Vec<Item>,
    incoming: impl IntoIterator<Item = Item>,
) -> (Vec<Item>, usize) {
    let mut set = WorkingSet::from_items(base);
    let added = set.absorb(incoming);
    (set.into_items(), added)
}

/// Ordered, duplicate-free item accumulator. Insertion order is discovery order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkingSet {
    items: Vec<Item>,
    seen: HashSet<String>,
}

impl WorkingSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a set from `items`. Later duplicates are dropped, which only
    /// happens when `items` did not come from a merge.
    pub fn from_items(items: Vec<Item>) -> Self {
        let mut set = Self {
            items: Vec::with_capacity(items.len()),
            seen: HashSet::with_capacity(items.len()),
        };
        set.absorb(items);
        set
    }

    /// Appends unseen items in order and returns how many were added.
    pub fn absorb(&mut self, incoming: impl IntoIterator<Item = Item>) -> usize {
        let before = self.items.len();
        for item in incoming {
            if !self.seen.contains(item.identity()) {
                self.seen.insert(item.identity().to_string());
                self.items.push(item);
            }
        }
        self.items.len() - before
    }

    pub fn contains(&self, url: &str) -> bool {
        self.seen.contains(url)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn items(&self) -> &[Item] {
        &self.items
    }

    pub fn into_items(self) -> Vec<Item> {
        self.items
    }
}
