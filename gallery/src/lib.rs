//! Temporal grouping and selection core of the camera-upload gallery.

mod bucket;
mod events;
mod index;
mod media;
mod selection;
mod view_model;

pub use bucket::{Bucket, BucketCache, BucketKey, Granularity, ReferenceZone, TemporalBucketizer};
pub use events::{ActionMode, AnimateItem, CardsChanged, GalleryEvents, OpenItem, Signal};
pub use index::OrderedIndex;
pub use media::{MediaId, MediaItem, ViewMode};
pub use selection::{SelectionChange, SelectionTracker};
pub use view_model::{Card, GalleryNode, GallerySnapshot, GalleryViewModel};

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GalleryError {
    #[error("Invalid time zone: {0}")]
    InvalidTimeZone(String),
    #[error("Invalid view mode: {0}")]
    InvalidViewMode(String),
}
