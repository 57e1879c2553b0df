//! Identifier-based multi-select state.

use std::collections::HashSet;
use tokio::sync::mpsc;

use crate::events::Signal;
use crate::media::MediaId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelectionChange {
    pub count: usize,
    pub active: bool,
}

/// Set of selected ids, restricted to the ids of the current listing.
///
/// Ids that are not part of the listing are ignored by every mutation.
#[derive(Debug, Default)]
pub struct SelectionTracker {
    selected: HashSet<MediaId>,
    known: HashSet<MediaId>,
    changes: Signal<SelectionChange>,
}

impl SelectionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<SelectionChange> {
        self.changes.subscribe()
    }

    /// Replaces the set of valid ids and drops selected ids that are gone.
    /// Returns how many selected ids were dropped.
    pub fn set_known<I>(&mut self, ids: I) -> usize
    where
        I: IntoIterator<Item = MediaId>,
    {
        self.known = ids.into_iter().collect();
        let before = self.selected.len();
        let known = &self.known;
        self.selected.retain(|id| known.contains(id));
        let dropped = before - self.selected.len();
        if dropped > 0 {
            tracing::debug!(dropped, "dropped stale selection");
            self.notify();
        }
        dropped
    }

    /// Flips the selection of `id`. Returns the new state, or `None` when
    /// the id is not in the listing.
    pub fn toggle(&mut self, id: MediaId) -> Option<bool> {
        if !self.known.contains(&id) {
            tracing::debug!(%id, "ignoring toggle of unknown id");
            return None;
        }
        let selected = if self.selected.remove(&id) {
            false
        } else {
            self.selected.insert(id);
            true
        };
        self.notify();
        Some(selected)
    }

    /// Replaces the selection with `ids`. Returns whether anything changed.
    pub fn select_all<I>(&mut self, ids: I) -> bool
    where
        I: IntoIterator<Item = MediaId>,
    {
        let known = &self.known;
        let next: HashSet<MediaId> = ids.into_iter().filter(|id| known.contains(id)).collect();
        if next.is_empty() || next == self.selected {
            return false;
        }
        self.selected = next;
        self.notify();
        true
    }

    /// Returns whether anything was selected before.
    pub fn clear(&mut self) -> bool {
        if self.selected.is_empty() {
            return false;
        }
        self.selected.clear();
        self.notify();
        true
    }

    pub fn is_selected(&self, id: MediaId) -> bool {
        self.selected.contains(&id)
    }

    pub fn is_selecting(&self) -> bool {
        !self.selected.is_empty()
    }

    pub fn count(&self) -> usize {
        self.selected.len()
    }

    /// Selected ids in ascending order.
    pub fn selected(&self) -> Vec<MediaId> {
        let mut ids: Vec<MediaId> = self.selected.iter().copied().collect();
        ids.sort_unstable();
        ids
    }

    fn notify(&mut self) {
        let change = SelectionChange {
            count: self.selected.len(),
            active: !self.selected.is_empty(),
        };
        self.changes.emit(change);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tracker(ids: &[u64]) -> SelectionTracker {
        let mut t = SelectionTracker::new();
        t.set_known(ids.iter().copied().map(MediaId));
        t
    }

    #[test]
    fn toggle_is_its_own_inverse() {
        let mut t = tracker(&[1, 2, 3]);
        t.toggle(MediaId(2));
        let before = t.selected();
        assert_eq!(t.toggle(MediaId(3)), Some(true));
        assert_eq!(t.toggle(MediaId(3)), Some(false));
        assert_eq!(t.selected(), before);
    }

    #[test]
    fn unknown_ids_are_ignored() {
        let mut t = tracker(&[1]);
        let mut rx = t.subscribe();
        assert_eq!(t.toggle(MediaId(42)), None);
        assert!(!t.is_selecting());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn select_all_then_clear() {
        let mut t = tracker(&[1, 2, 3]);
        assert!(t.select_all([MediaId(1), MediaId(2), MediaId(3), MediaId(9)]));
        assert_eq!(t.count(), 3);
        assert!(t.is_selecting());
        assert!(!t.select_all([MediaId(1), MediaId(2), MediaId(3)]));
        assert!(t.clear());
        assert_eq!(t.count(), 0);
        assert!(!t.is_selecting());
        assert!(!t.clear());
    }

    #[test]
    fn select_all_with_nothing_known_is_noop() {
        let mut t = SelectionTracker::new();
        assert!(!t.select_all([MediaId(1)]));
        assert!(!t.is_selecting());
    }

    #[test]
    fn set_known_drops_stale_ids() {
        let mut t = tracker(&[1, 2]);
        t.toggle(MediaId(1));
        t.toggle(MediaId(2));
        let dropped = t.set_known([MediaId(2), MediaId(3)]);
        assert_eq!(dropped, 1);
        assert_eq!(t.selected(), vec![MediaId(2)]);
    }

    #[test]
    fn every_mutation_notifies() {
        let mut t = tracker(&[1, 2]);
        let mut rx = t.subscribe();
        t.toggle(MediaId(1));
        t.toggle(MediaId(2));
        t.clear();
        let seen: Vec<SelectionChange> = std::iter::from_fn(|| rx.try_recv().ok()).collect();
        assert_eq!(
            seen,
            vec![
                SelectionChange { count: 1, active: true },
                SelectionChange { count: 2, active: true },
                SelectionChange { count: 0, active: false },
            ]
        );
    }
}
