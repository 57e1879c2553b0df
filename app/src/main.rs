//! Gallery daemon: keeps the camera-upload gallery loaded from the local
//! cache, reloads it periodically and logs every outbound event.

use cache::{CacheFolders, CacheManager};
use chrono::Utc;
use clap::Parser;
use gallery::{GalleryViewModel, ReferenceZone, ViewMode};
use std::path::PathBuf;
use sync::{spawn_gallery, ReloadProgress, Reloader};
use tokio::sync::mpsc;
use tracing_appender::rolling;
use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::EnvFilter;

mod config;

#[derive(Parser)]
#[command(
    name = "cu_gallery",
    author,
    version,
    about = "Camera uploads gallery daemon"
)]
struct Cli {
    /// Override log level (e.g. info, debug)
    #[arg(long)]
    log_level: Option<String>,
    /// Override the cache directory
    #[arg(long)]
    cache_path: Option<PathBuf>,
    /// Override the reference time zone (local, utc or +HH:MM)
    #[arg(long)]
    time_zone: Option<String>,
    /// Override reload interval in minutes
    #[arg(long)]
    reload_interval_minutes: Option<u64>,
    /// Override the view the gallery opens in
    #[arg(long)]
    default_view: Option<String>,
    /// Path to config file
    #[arg(long)]
    config: Option<PathBuf>,
    /// Enable tracing spans instrumentation
    #[arg(long)]
    trace_spans: bool,
    /// Load the cache once, print the gallery state and exit
    #[arg(long)]
    once: bool,
}

#[cfg_attr(feature = "trace-spans", tracing::instrument)]
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let overrides = config::AppConfigOverrides {
        log_level: cli.log_level.clone(),
        cache_path: cli.cache_path.clone(),
        time_zone: cli.time_zone.clone(),
        reload_interval_minutes: cli.reload_interval_minutes,
        default_view: cli.default_view.clone(),
        trace_spans: cli.trace_spans,
    };
    let loaded = config::AppConfig::load_from(cli.config.clone());
    let cfg = loaded.clone().apply_overrides(&overrides);
    let base_dir = cfg.cache_path.clone();
    std::fs::create_dir_all(&base_dir)?;
    let file_appender = rolling::daily(&base_dir, "cu_gallery.log");
    let (file_writer, _guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(cfg.log_level.clone()))
        .with_writer(std::io::stdout.and(file_writer))
        .init();

    let config_file = cli
        .config
        .clone()
        .unwrap_or_else(config::AppConfig::default_path);
    if !config_file.exists() {
        if let Err(e) = loaded.save_to(Some(config_file.clone())) {
            tracing::warn!(error = %e, path = %config_file.display(), "could not write default config");
        }
    }

    let zone: ReferenceZone = cfg.time_zone.parse()?;
    let view: ViewMode = cfg.default_view.parse()?;

    CacheFolders::new(&base_dir).create_all()?;
    let cache = CacheManager::new(&cfg.db_path())?;
    tracing::info!(db = %cfg.db_path().display(), zone = %zone, "starting gallery");

    let mut view_model = GalleryViewModel::new(zone);
    view_model.switch_mode(view);
    let (handle, service) = spawn_gallery(view_model);
    spawn_event_loggers(&handle).await?;

    let reloader = Reloader::new(cache.clone(), handle.clone());
    if cli.once {
        let count = reloader.reload_once(None).await?;
        handle.flush().await?;
        cache.update_last_reload_async(Utc::now()).await?;
        let snap = handle.snapshot();
        println!("{}", snap.gallery.title);
        println!("Items: {}", count);
        drop(reloader);
        drop(handle);
        service.await?;
        return Ok(());
    }

    let interval = cfg.reload_interval();
    let (progress_tx, mut progress_rx) = mpsc::unbounded_channel();
    let (error_tx, mut error_rx) = mpsc::unbounded_channel();
    let (reload_task, shutdown) = reloader.start_periodic_reload(interval, progress_tx, error_tx);

    let progress_cache = cache.clone();
    tokio::spawn(async move {
        while let Some(p) = progress_rx.recv().await {
            match p {
                ReloadProgress::Started(generation) => {
                    tracing::debug!(generation, "reload started")
                }
                ReloadProgress::Applied { generation, items } => {
                    tracing::info!(generation, items, "reload applied");
                    if let Err(e) = progress_cache.update_last_reload_async(Utc::now()).await {
                        tracing::error!(error = %e, "failed to record reload time");
                    }
                }
                ReloadProgress::Retrying(wait) => tracing::info!(wait, "retrying reload"),
            }
        }
    });
    tokio::spawn(async move {
        while let Some(e) = error_rx.recv().await {
            tracing::error!(error = %e, "reload task error");
        }
    });

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutting down");
    let _ = shutdown.send(());
    if let Err(e) = reload_task.await {
        tracing::error!(error = %e, "reload task panicked");
    }
    drop(handle);
    service.await?;
    Ok(())
}

async fn spawn_event_loggers(handle: &sync::GalleryHandle) -> Result<(), sync::SyncError> {
    let (mut title, mut action, mut open, mut cards) = handle
        .subscribe(|events| {
            (
                events.title.subscribe(),
                events.action_mode.subscribe(),
                events.open_item.subscribe(),
                events.cards.subscribe(),
            )
        })
        .await?;
    tokio::spawn(async move {
        loop {
            tokio::select! {
                Some(t) = title.recv() => tracing::info!(title = %t, "title changed"),
                Some(a) = action.recv() => tracing::info!(active = a.active, count = a.count, "action mode"),
                Some(o) = open.recv() => tracing::info!(position = o.position, id = %o.item.id, "open item"),
                Some(c) = cards.recv() => tracing::debug!(mode = ?c.mode, cards = c.cards.len(), "cards changed"),
                else => break,
            }
        }
    });
    Ok(())
}
