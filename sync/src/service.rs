//! Single-writer command queue around a [`GalleryViewModel`].
//!
//! Every mutation is sent as a [`GalleryCommand`] and applied in order by
//! one task that owns the model. After each command the task publishes an
//! immutable [`ServiceSnapshot`] that any thread can read.

use gallery::{GalleryEvents, GallerySnapshot, GalleryViewModel, MediaId, MediaItem, ViewMode};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;

use crate::SyncError;

type Inspect = Box<dyn FnOnce(&mut GalleryViewModel) + Send>;

pub enum GalleryCommand {
    Reload { generation: u64, items: Vec<MediaItem> },
    SwitchMode(ViewMode),
    ItemClick(MediaId),
    ItemLongClick(MediaId),
    CardClick(usize),
    SelectAll,
    ClearSelection,
    With(Inspect),
}

impl fmt::Debug for GalleryCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GalleryCommand::Reload { generation, items } => f
                .debug_struct("Reload")
                .field("generation", generation)
                .field("items", &items.len())
                .finish(),
            GalleryCommand::SwitchMode(mode) => write!(f, "SwitchMode({:?})", mode),
            GalleryCommand::ItemClick(id) => write!(f, "ItemClick({})", id),
            GalleryCommand::ItemLongClick(id) => write!(f, "ItemLongClick({})", id),
            GalleryCommand::CardClick(index) => write!(f, "CardClick({})", index),
            GalleryCommand::SelectAll => write!(f, "SelectAll"),
            GalleryCommand::ClearSelection => write!(f, "ClearSelection"),
            GalleryCommand::With(_) => write!(f, "With(..)"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ServiceSnapshot {
    /// Generation of the last applied reload, 0 before the first one.
    pub generation: u64,
    pub gallery: GallerySnapshot,
}

struct GalleryService {
    view_model: GalleryViewModel,
    applied_generation: u64,
    snapshot: watch::Sender<Arc<ServiceSnapshot>>,
}

impl GalleryService {
    fn apply(&mut self, command: GalleryCommand) {
        tracing::trace!(?command, "applying gallery command");
        match command {
            GalleryCommand::Reload { generation, items } => {
                if generation <= self.applied_generation {
                    tracing::warn!(
                        generation,
                        applied = self.applied_generation,
                        "dropping superseded reload"
                    );
                    return;
                }
                self.applied_generation = generation;
                self.view_model.reload(items);
            }
            GalleryCommand::SwitchMode(mode) => self.view_model.switch_mode(mode),
            GalleryCommand::ItemClick(id) => self.view_model.on_item_click(id),
            GalleryCommand::ItemLongClick(id) => self.view_model.on_item_long_click(id),
            GalleryCommand::CardClick(index) => self.view_model.on_card_click(index),
            GalleryCommand::SelectAll => self.view_model.select_all(),
            GalleryCommand::ClearSelection => self.view_model.clear_selection(),
            GalleryCommand::With(f) => {
                f(&mut self.view_model);
                return;
            }
        }
        self.publish();
    }

    fn publish(&self) {
        let snapshot = ServiceSnapshot {
            generation: self.applied_generation,
            gallery: self.view_model.snapshot(),
        };
        self.snapshot.send_replace(Arc::new(snapshot));
    }
}

/// Cloneable entry point to a running gallery service.
#[derive(Clone)]
pub struct GalleryHandle {
    commands: mpsc::UnboundedSender<GalleryCommand>,
    snapshot: watch::Receiver<Arc<ServiceSnapshot>>,
    generation: Arc<AtomicU64>,
}

/// Moves `view_model` onto its own task. The task ends when the last
/// handle is dropped and hands the model back.
#[cfg_attr(feature = "trace-spans", tracing::instrument(skip(view_model)))]
pub fn spawn_gallery(view_model: GalleryViewModel) -> (GalleryHandle, JoinHandle<GalleryViewModel>) {
    let (commands, mut rx) = mpsc::unbounded_channel();
    let initial = Arc::new(ServiceSnapshot {
        generation: 0,
        gallery: view_model.snapshot(),
    });
    let (snapshot_tx, snapshot_rx) = watch::channel(initial);

    let task = tokio::spawn(async move {
        let mut service = GalleryService {
            view_model,
            applied_generation: 0,
            snapshot: snapshot_tx,
        };
        while let Some(command) = rx.recv().await {
            service.apply(command);
        }
        tracing::debug!("gallery service stopped");
        service.view_model
    });

    let handle = GalleryHandle {
        commands,
        snapshot: snapshot_rx,
        generation: Arc::new(AtomicU64::new(0)),
    };
    (handle, task)
}

impl GalleryHandle {
    pub fn send(&self, command: GalleryCommand) -> Result<(), SyncError> {
        self.commands
            .send(command)
            .map_err(|_| SyncError::ServiceStopped)
    }

    /// Reserves the generation number for a fetch that is about to start.
    pub fn next_generation(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn reload(&self, items: Vec<MediaItem>) -> Result<u64, SyncError> {
        let generation = self.next_generation();
        self.send(GalleryCommand::Reload { generation, items })?;
        Ok(generation)
    }

    pub fn switch_mode(&self, mode: ViewMode) -> Result<(), SyncError> {
        self.send(GalleryCommand::SwitchMode(mode))
    }

    pub fn click(&self, id: MediaId) -> Result<(), SyncError> {
        self.send(GalleryCommand::ItemClick(id))
    }

    pub fn long_click(&self, id: MediaId) -> Result<(), SyncError> {
        self.send(GalleryCommand::ItemLongClick(id))
    }

    pub fn card_click(&self, index: usize) -> Result<(), SyncError> {
        self.send(GalleryCommand::CardClick(index))
    }

    pub fn select_all(&self) -> Result<(), SyncError> {
        self.send(GalleryCommand::SelectAll)
    }

    pub fn clear_selection(&self) -> Result<(), SyncError> {
        self.send(GalleryCommand::ClearSelection)
    }

    /// Runs `f` on the service task, after every command sent before it.
    pub async fn with<T, F>(&self, f: F) -> Result<T, SyncError>
    where
        F: FnOnce(&mut GalleryViewModel) -> T + Send + 'static,
        T: Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        self.send(GalleryCommand::With(Box::new(move |view_model| {
            let _ = tx.send(f(view_model));
        })))?;
        rx.await.map_err(|_| SyncError::ServiceStopped)
    }

    pub async fn subscribe<T, F>(&self, f: F) -> Result<T, SyncError>
    where
        F: FnOnce(&mut GalleryEvents) -> T + Send + 'static,
        T: Send + 'static,
    {
        self.with(move |view_model| f(view_model.events_mut())).await
    }

    /// Waits until every command sent so far has been applied.
    pub async fn flush(&self) -> Result<(), SyncError> {
        self.with(|_| ()).await
    }

    pub fn snapshot(&self) -> Arc<ServiceSnapshot> {
        self.snapshot.borrow().clone()
    }

    pub fn watch(&self) -> watch::Receiver<Arc<ServiceSnapshot>> {
        self.snapshot.clone()
    }
}
