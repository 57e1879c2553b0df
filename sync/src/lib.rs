//! Serialized access to the gallery and reloading of its listing.

mod reloader;
mod service;

pub use reloader::{MediaSource, ReloadProgress, Reloader};
pub use service::{spawn_gallery, GalleryCommand, GalleryHandle, ServiceSnapshot};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Source Error: {0}")]
    SourceError(String),
    #[error("Cache Error: {0}")]
    CacheError(String),
    #[error("Gallery service stopped")]
    ServiceStopped,
    #[error("Other Error: {0}")]
    Other(String),
}

#[derive(Debug, Clone, Error)]
pub enum SyncTaskError {
    #[error("Periodic reload failed: {0}")]
    PeriodicReloadFailed(String),
    #[error("Other task error: {0}")]
    Other(String),
}
