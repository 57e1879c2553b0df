//! Orchestration of browsing mode and selection for the camera-upload
//! gallery.
//!
//! All state lives in one [`GalleryViewModel`]; every mutation recomputes the
//! derived outputs and publishes them on the signals of [`GalleryEvents`].
//! The model is not shared between threads. Wrap it in a single-writer queue
//! when the item listing is fetched elsewhere.

use crate::bucket::{Bucket, BucketCache, BucketKey, Granularity, ReferenceZone, TemporalBucketizer};
use crate::events::{ActionMode, AnimateItem, CardsChanged, GalleryEvents, OpenItem};
use crate::index::OrderedIndex;
use crate::media::{MediaId, MediaItem, ViewMode};
use crate::selection::SelectionTracker;

/// An item of the flat list, carrying its selection flag.
#[derive(Debug, Clone, PartialEq)]
pub struct GalleryNode {
    pub position: usize,
    pub item: MediaItem,
}

/// A day, month or year card: a bucket plus its cover item.
#[derive(Debug, Clone, PartialEq)]
pub struct Card {
    pub label: String,
    pub bucket: Bucket,
    pub cover: MediaItem,
}

impl Card {
    pub fn key(&self) -> BucketKey {
        self.bucket.key
    }

    pub fn count(&self) -> usize {
        self.bucket.len()
    }
}

/// Read-only copy of the whole gallery state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GallerySnapshot {
    pub mode: ViewMode,
    pub nodes: Vec<GalleryNode>,
    pub selected: Vec<MediaId>,
    pub selecting: bool,
    pub count: usize,
    pub title: String,
    pub reloads: u64,
}

fn title_for(mode: ViewMode, count: usize) -> String {
    if count > 0 {
        format!("{} selected", count)
    } else {
        mode.to_string()
    }
}

#[derive(Debug)]
pub struct GalleryViewModel {
    index: OrderedIndex,
    bucketizer: TemporalBucketizer,
    buckets: BucketCache,
    selection: SelectionTracker,
    mode: ViewMode,
    title: String,
    action_mode: ActionMode,
    reloads: u64,
    events: GalleryEvents,
}

impl Default for GalleryViewModel {
    fn default() -> Self {
        Self::new(ReferenceZone::default())
    }
}

impl GalleryViewModel {
    pub fn new(zone: ReferenceZone) -> Self {
        GalleryViewModel {
            index: OrderedIndex::default(),
            bucketizer: TemporalBucketizer::new(zone),
            buckets: BucketCache::default(),
            selection: SelectionTracker::new(),
            mode: ViewMode::All,
            title: title_for(ViewMode::All, 0),
            action_mode: ActionMode {
                active: false,
                count: 0,
            },
            reloads: 0,
            events: GalleryEvents::default(),
        }
    }

    pub fn events_mut(&mut self) -> &mut GalleryEvents {
        &mut self.events
    }

    /// Read-only; selection changes go through the gesture methods so the
    /// title and action mode follow.
    pub fn selection(&self) -> &SelectionTracker {
        &self.selection
    }

    /// Replaces the whole listing. Cached buckets are dropped and selected
    /// ids missing from the new listing are forgotten.
    #[cfg_attr(feature = "trace-spans", tracing::instrument(skip(self, items)))]
    pub fn reload(&mut self, items: Vec<MediaItem>) {
        self.index = OrderedIndex::build(items);
        self.buckets.invalidate();
        let dropped = self.selection.set_known(self.index.ids());
        self.reloads += 1;
        tracing::info!(
            items = self.index.len(),
            dropped_selection = dropped,
            reloads = self.reloads,
            "gallery reloaded"
        );

        self.publish_nodes();
        if let Some(granularity) = self.mode.granularity() {
            self.publish_cards(granularity);
        }
        self.sync_derived();
    }

    pub fn switch_mode(&mut self, mode: ViewMode) {
        if mode == self.mode {
            return;
        }
        tracing::debug!(from = ?self.mode, to = ?mode, "switching view mode");
        self.mode = mode;
        match mode.granularity() {
            Some(granularity) => self.publish_cards(granularity),
            None => self.publish_nodes(),
        }
        self.events.mode.emit(mode);
        self.sync_derived();
    }

    pub fn on_item_click(&mut self, id: MediaId) {
        let Some(position) = self.index.position(id) else {
            tracing::debug!(%id, "click on unknown item ignored");
            return;
        };
        if self.selection.is_selecting() {
            self.toggle(id);
            return;
        }
        if let Some(item) = self.index.at(position) {
            tracing::debug!(%id, position, "opening item");
            self.events.open_item.emit(OpenItem {
                position,
                item: item.clone(),
            });
        }
    }

    pub fn on_item_long_click(&mut self, id: MediaId) {
        self.toggle(id);
    }

    /// Drills down from a card into the next finer mode and scrolls to the
    /// card's cover there.
    pub fn on_card_click(&mut self, card_index: usize) {
        let Some(granularity) = self.mode.granularity() else {
            return;
        };
        let Some(finer) = self.mode.finer() else {
            return;
        };
        let cover = match self
            .buckets
            .get_or_build(granularity, &self.bucketizer, &self.index)
            .get(card_index)
        {
            Some(bucket) => bucket.cover(),
            None => {
                tracing::debug!(card_index, "click on unknown card ignored");
                return;
            }
        };

        self.switch_mode(finer);

        let target = match finer.granularity() {
            Some(g) => self
                .buckets
                .get_or_build(g, &self.bucketizer, &self.index)
                .iter()
                .position(|bucket| bucket.contains(cover)),
            None => self.index.position(cover),
        };
        if let Some(position) = target {
            self.events.scroll_to.emit(position);
        }
    }

    /// Selects every loaded item. Does nothing while the listing is empty.
    pub fn select_all(&mut self) {
        if self.index.is_empty() {
            return;
        }
        if self.selection.select_all(self.index.ids()) {
            self.publish_nodes();
            self.sync_derived();
        }
    }

    pub fn clear_selection(&mut self) {
        if self.selection.clear() {
            self.publish_nodes();
            self.sync_derived();
        }
    }

    pub fn mode(&self) -> ViewMode {
        self.mode
    }

    pub fn index(&self) -> &OrderedIndex {
        &self.index
    }

    pub fn is_selecting(&self) -> bool {
        self.selection.is_selecting()
    }

    pub fn selected_count(&self) -> usize {
        self.selection.count()
    }

    pub fn is_selected(&self, id: MediaId) -> bool {
        self.selection.is_selected(id)
    }

    pub fn selected_ids(&self) -> Vec<MediaId> {
        self.selection.selected()
    }

    /// Selected items in time order.
    pub fn selected_items(&self) -> Vec<MediaItem> {
        self.index
            .iter()
            .filter(|item| self.selection.is_selected(item.id))
            .cloned()
            .collect()
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn action_mode(&self) -> ActionMode {
        self.action_mode
    }

    pub fn reloads(&self) -> u64 {
        self.reloads
    }

    pub fn nodes(&self) -> Vec<GalleryNode> {
        self.index
            .iter()
            .enumerate()
            .map(|(position, item)| {
                let mut item = item.clone();
                item.selected = self.selection.is_selected(item.id);
                GalleryNode { position, item }
            })
            .collect()
    }

    pub fn cards(&mut self, granularity: Granularity) -> Vec<Card> {
        let buckets = self
            .buckets
            .get_or_build(granularity, &self.bucketizer, &self.index);
        buckets
            .iter()
            .filter_map(|bucket| {
                self.index.get(bucket.cover()).map(|cover| Card {
                    label: bucket.label(),
                    bucket: bucket.clone(),
                    cover: cover.clone(),
                })
            })
            .collect()
    }

    pub fn snapshot(&self) -> GallerySnapshot {
        GallerySnapshot {
            mode: self.mode,
            nodes: self.nodes(),
            selected: self.selection.selected(),
            selecting: self.selection.is_selecting(),
            count: self.selection.count(),
            title: self.title.clone(),
            reloads: self.reloads,
        }
    }

    fn toggle(&mut self, id: MediaId) {
        let Some(selected) = self.selection.toggle(id) else {
            return;
        };
        tracing::debug!(%id, selected, "toggled selection");
        self.publish_nodes();
        self.sync_derived();
        if let Some(position) = self.index.position(id) {
            self.events.animate_item.emit(AnimateItem { position, selected });
        }
    }

    fn publish_nodes(&mut self) {
        if self.events.nodes.subscriber_count() == 0 {
            return;
        }
        let nodes = self.nodes();
        self.events.nodes.emit(nodes);
    }

    fn publish_cards(&mut self, granularity: Granularity) {
        if self.events.cards.subscriber_count() == 0 {
            return;
        }
        let cards = self.cards(granularity);
        let mode = self.mode;
        self.events.cards.emit(CardsChanged { mode, cards });
    }

    fn sync_derived(&mut self) {
        let action_mode = ActionMode {
            active: self.selection.is_selecting(),
            count: self.selection.count(),
        };
        if action_mode != self.action_mode {
            self.action_mode = action_mode;
            self.events.action_mode.emit(action_mode);
        }

        let title = title_for(self.mode, action_mode.count);
        if title != self.title {
            self.title = title.clone();
            self.events.title.emit(title);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn items(n: u64) -> Vec<MediaItem> {
        (1..=n)
            .map(|i| MediaItem::new(i, format!("{}.jpg", i), Some(i as i64 * 86_400_000)))
            .collect()
    }

    #[test]
    fn initial_state() {
        let vm = GalleryViewModel::new(ReferenceZone::Utc);
        assert_eq!(vm.mode(), ViewMode::All);
        assert!(!vm.is_selecting());
        assert_eq!(vm.title(), "Camera uploads");
        assert_eq!(vm.reloads(), 0);
    }

    #[test]
    fn click_while_idle_opens_item() {
        let mut vm = GalleryViewModel::new(ReferenceZone::Utc);
        vm.reload(items(3));
        let mut open = vm.events_mut().open_item.subscribe();
        vm.on_item_click(MediaId(3));
        let event = open.try_recv().unwrap();
        assert_eq!(event.position, 0);
        assert_eq!(event.item.id, MediaId(3));
        assert!(!vm.is_selecting());
    }

    #[test]
    fn click_while_selecting_toggles() {
        let mut vm = GalleryViewModel::new(ReferenceZone::Utc);
        vm.reload(items(3));
        let mut open = vm.events_mut().open_item.subscribe();
        vm.on_item_long_click(MediaId(1));
        vm.on_item_click(MediaId(2));
        assert!(open.try_recv().is_err());
        assert_eq!(vm.selected_ids(), vec![MediaId(1), MediaId(2)]);
        assert_eq!(vm.title(), "2 selected");
    }

    #[test]
    fn card_click_drills_down() {
        let mut vm = GalleryViewModel::new(ReferenceZone::Utc);
        vm.reload(items(40));
        vm.switch_mode(ViewMode::Years);
        let mut scroll = vm.events_mut().scroll_to.subscribe();
        vm.on_card_click(0);
        assert_eq!(vm.mode(), ViewMode::Months);
        assert_eq!(scroll.try_recv().unwrap(), 0);

        // February 1970 is the newest month, January the second card
        vm.on_card_click(1);
        assert_eq!(vm.mode(), ViewMode::Days);
        let days = vm.cards(Granularity::Day);
        let target = scroll.try_recv().unwrap();
        assert_eq!(days[target].cover.id, MediaId(30));

        vm.on_card_click(target);
        assert_eq!(vm.mode(), ViewMode::All);
        assert_eq!(scroll.try_recv().unwrap(), vm.index().position(MediaId(30)).unwrap());
    }

    #[test]
    fn card_click_out_of_range_is_noop() {
        let mut vm = GalleryViewModel::new(ReferenceZone::Utc);
        vm.reload(items(2));
        vm.switch_mode(ViewMode::Days);
        vm.on_card_click(99);
        assert_eq!(vm.mode(), ViewMode::Days);
        vm.switch_mode(ViewMode::All);
        vm.on_card_click(0);
        assert_eq!(vm.mode(), ViewMode::All);
    }

    #[test]
    fn nodes_carry_selection_flags() {
        let mut vm = GalleryViewModel::new(ReferenceZone::Utc);
        vm.reload(items(2));
        vm.on_item_long_click(MediaId(1));
        let nodes = vm.nodes();
        assert_eq!(nodes.len(), 2);
        assert!(!nodes[0].item.selected);
        assert!(nodes[1].item.selected);
        assert_eq!(vm.selected_items()[0].id, MediaId(1));
    }

    #[test]
    fn cards_are_built_lazily_without_subscribers() {
        let mut vm = GalleryViewModel::new(ReferenceZone::Utc);
        vm.reload(items(3));
        vm.switch_mode(ViewMode::Months);
        assert!(!vm.buckets.is_cached(Granularity::Month));

        let mut cards = vm.events_mut().cards.subscribe();
        vm.switch_mode(ViewMode::Years);
        assert!(vm.buckets.is_cached(Granularity::Year));
        assert_eq!(cards.try_recv().unwrap().mode, ViewMode::Years);

        assert_eq!(vm.cards(Granularity::Month).len(), 1);
    }
}
