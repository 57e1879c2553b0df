//! Time-ordered index over a flat listing of media items.

use std::cmp::Reverse;
use std::collections::HashMap;

use crate::media::{MediaId, MediaItem};

/// Items sorted newest first, duplicates removed.
#[derive(Debug, Clone, Default)]
pub struct OrderedIndex {
    items: Vec<MediaItem>,
    positions: HashMap<MediaId, usize>,
}

impl OrderedIndex {
    /// Builds the index from a raw listing.
    ///
    /// A later entry with the same id replaces an earlier one and takes its
    /// place in the input order. Items without a capture time go last, in
    /// the order they were given.
    pub fn build<I>(items: I) -> Self
    where
        I: IntoIterator<Item = MediaItem>,
    {
        let items: Vec<MediaItem> = items.into_iter().collect();

        let mut last_seen: HashMap<MediaId, usize> = HashMap::with_capacity(items.len());
        for (i, item) in items.iter().enumerate() {
            last_seen.insert(item.id, i);
        }

        let mut items: Vec<MediaItem> = items
            .into_iter()
            .enumerate()
            .filter(|(i, item)| last_seen.get(&item.id) == Some(i))
            .map(|(_, item)| item)
            .collect();

        // sort_by_key is stable, equal keys keep input order
        items.sort_by_key(|item| match item.capture_millis() {
            Some(ts) => (false, Reverse(ts)),
            None => (true, Reverse(0)),
        });

        let positions = items
            .iter()
            .enumerate()
            .map(|(i, item)| (item.id, i))
            .collect();

        tracing::debug!(items = items.len(), "built time index");
        OrderedIndex { items, positions }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn items(&self) -> &[MediaItem] {
        &self.items
    }

    pub fn iter(&self) -> std::slice::Iter<'_, MediaItem> {
        self.items.iter()
    }

    pub fn ids(&self) -> impl Iterator<Item = MediaId> + '_ {
        self.items.iter().map(|item| item.id)
    }

    pub fn contains(&self, id: MediaId) -> bool {
        self.positions.contains_key(&id)
    }

    pub fn position(&self, id: MediaId) -> Option<usize> {
        self.positions.get(&id).copied()
    }

    pub fn get(&self, id: MediaId) -> Option<&MediaItem> {
        self.position(id).map(|pos| &self.items[pos])
    }

    pub fn at(&self, position: usize) -> Option<&MediaItem> {
        self.items.get(position)
    }
}

impl<'a> IntoIterator for &'a OrderedIndex {
    type Item = &'a MediaItem;
    type IntoIter = std::slice::Iter<'a, MediaItem>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}
