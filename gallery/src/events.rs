//! Typed outbound event streams.
//!
//! Each derived output of the gallery gets its own [`Signal`]. Subscribers
//! receive values over unbounded channels, so emitting never blocks the
//! owner; dropped receivers are pruned on the next emit.

use tokio::sync::mpsc;

use crate::media::{MediaItem, ViewMode};
use crate::view_model::Card;

#[derive(Debug)]
pub struct Signal<T> {
    subscribers: Vec<mpsc::UnboundedSender<T>>,
}

impl<T> Default for Signal<T> {
    fn default() -> Self {
        Signal {
            subscribers: Vec::new(),
        }
    }
}

impl<T: Clone> Signal<T> {
    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<T> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.push(tx);
        rx
    }

    pub fn emit(&mut self, value: T) {
        self.subscribers.retain(|tx| tx.send(value.clone()).is_ok());
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }
}

/// Request to show an item in the full-screen viewer.
#[derive(Debug, Clone, PartialEq)]
pub struct OpenItem {
    /// Position in the time-ordered list, also the viewer's paging index.
    pub position: usize,
    pub item: MediaItem,
}

/// One-shot hint for the selection pulse of a single tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnimateItem {
    pub position: usize,
    pub selected: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActionMode {
    pub active: bool,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CardsChanged {
    pub mode: ViewMode,
    pub cards: Vec<Card>,
}

/// All outbound streams of a gallery view model.
#[derive(Debug, Default)]
pub struct GalleryEvents {
    pub nodes: Signal<Vec<crate::view_model::GalleryNode>>,
    pub cards: Signal<CardsChanged>,
    pub mode: Signal<ViewMode>,
    pub open_item: Signal<OpenItem>,
    pub animate_item: Signal<AnimateItem>,
    pub action_mode: Signal<ActionMode>,
    pub title: Signal<String>,
    pub scroll_to: Signal<usize>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emit_reaches_every_subscriber() {
        let mut signal: Signal<u32> = Signal::default();
        let mut a = signal.subscribe();
        let mut b = signal.subscribe();
        signal.emit(3);
        assert_eq!(a.try_recv().unwrap(), 3);
        assert_eq!(b.try_recv().unwrap(), 3);
    }

    #[test]
    fn dropped_receivers_are_pruned() {
        let mut signal: Signal<&'static str> = Signal::default();
        let keep = signal.subscribe();
        drop(signal.subscribe());
        signal.emit("x");
        assert_eq!(signal.subscriber_count(), 1);
        drop(keep);
        signal.emit("y");
        assert_eq!(signal.subscriber_count(), 0);
    }
}
