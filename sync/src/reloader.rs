use cache::CacheManager;
use chrono::{DateTime, Utc};
use gallery::MediaItem;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{sleep, Duration};

use crate::service::{GalleryCommand, GalleryHandle};
use crate::{SyncError, SyncTaskError};

/// Blocking source of the full item listing.
pub trait MediaSource: Send + Sync + 'static {
    fn load_items(&self) -> Result<Vec<MediaItem>, SyncError>;
}

impl MediaSource for CacheManager {
    fn load_items(&self) -> Result<Vec<MediaItem>, SyncError> {
        self.get_all_media_items()
            .map_err(|e| SyncError::CacheError(format!("Failed to load media items: {}", e)))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReloadProgress {
    Started(u64),
    Applied { generation: u64, items: usize },
    Retrying(u64),
}

pub struct Reloader<S: MediaSource> {
    source: Arc<S>,
    handle: GalleryHandle,
}

impl<S: MediaSource> Reloader<S> {
    pub fn new(source: S, handle: GalleryHandle) -> Self {
        Reloader {
            source: Arc::new(source),
            handle,
        }
    }

    pub fn handle(&self) -> &GalleryHandle {
        &self.handle
    }

    /// Fetches the listing off the async threads and queues it for the
    /// gallery. A fetch that finishes after a newer one is discarded by the
    /// service. On failure the gallery keeps its current state.
    #[cfg_attr(feature = "trace-spans", tracing::instrument(skip(self, progress)))]
    pub async fn reload_once(
        &self,
        progress: Option<&mpsc::UnboundedSender<ReloadProgress>>,
    ) -> Result<usize, SyncError> {
        let generation = self.handle.next_generation();
        tracing::info!(generation, "reloading media items");
        if let Some(tx) = progress {
            let _ = tx.send(ReloadProgress::Started(generation));
        }

        let source = Arc::clone(&self.source);
        let items = tokio::task::spawn_blocking(move || source.load_items())
            .await
            .map_err(|e| SyncError::Other(format!("Reload task failed: {}", e)))?
            .map_err(|e| {
                tracing::warn!(generation, error = %e, "media item fetch failed");
                e
            })?;

        let count = items.len();
        self.handle
            .send(GalleryCommand::Reload { generation, items })?;
        if let Some(tx) = progress {
            let _ = tx.send(ReloadProgress::Applied {
                generation,
                items: count,
            });
        }
        Ok(count)
    }

    /// Reloads every `interval` until the returned sender fires. Failures
    /// are reported on `error_tx` and retried with exponential backoff
    /// capped at five minutes.
    #[cfg_attr(feature = "trace-spans", tracing::instrument(skip(self, progress_tx, error_tx)))]
    pub fn start_periodic_reload(
        self,
        interval: Duration,
        progress_tx: mpsc::UnboundedSender<ReloadProgress>,
        error_tx: mpsc::UnboundedSender<SyncTaskError>,
    ) -> (JoinHandle<()>, oneshot::Sender<()>) {
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel();
        let handle = tokio::spawn(async move {
            let reloader = self;
            let mut backoff = 1u64;
            let mut last_success: Option<DateTime<Utc>> = None;
            loop {
                let keep_going = tokio::select! {
                    _ = &mut shutdown_rx => false,
                    keep = async {
                        match reloader.reload_once(Some(&progress_tx)).await {
                            Ok(_) => {
                                last_success = Some(Utc::now());
                                backoff = 1;
                                sleep(interval).await;
                                true
                            }
                            Err(SyncError::ServiceStopped) => {
                                tracing::debug!("gallery gone, stopping periodic reload");
                                let _ = error_tx.send(SyncTaskError::Other("gallery service stopped".into()));
                                false
                            }
                            Err(e) => {
                                let wait = backoff.min(300);
                                let last = last_success
                                    .map(|ts| ts.to_rfc3339())
                                    .unwrap_or_else(|| "never".to_string());
                                let msg = format!("{} | last_success: {}", e, last);
                                if let Err(send_err) = error_tx.send(SyncTaskError::PeriodicReloadFailed(msg)) {
                                    tracing::error!(error = ?send_err, "Failed to forward periodic reload error");
                                }
                                tracing::error!(?e, backoff = wait, "Periodic reload failed");
                                backoff = (backoff * 2).min(300);
                                let _ = progress_tx.send(ReloadProgress::Retrying(wait));
                                sleep(Duration::from_secs(wait)).await;
                                true
                            }
                        }
                    } => keep,
                };
                if !keep_going {
                    break;
                }
            }
        });
        (handle, shutdown_tx)
    }
}
