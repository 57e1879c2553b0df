use cache::{format_size, CacheFolders, CacheManager, PREVIEW_FOLDER, TEMPORAL_FOLDER, THUMBNAIL_FOLDER};
use clap::{Parser, Subcommand};
use gallery::{GalleryViewModel, MediaId, ReferenceZone, ViewMode};
use std::path::PathBuf;
use sync::spawn_gallery;
use tracing_appender::rolling;
use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::EnvFilter;

#[path = "../config.rs"]
mod config;

#[derive(Parser)]
#[command(
    name = "gallery_cli",
    author,
    version,
    about = "Camera uploads gallery CLI"
)]
struct Cli {
    /// Override log level (e.g. info, debug)
    #[arg(long)]
    log_level: Option<String>,
    /// Override the reference time zone (local, utc or +HH:MM)
    #[arg(long)]
    time_zone: Option<String>,
    /// Path to config file
    #[arg(long)]
    config: Option<PathBuf>,
    /// Enable tracing spans instrumentation
    #[arg(long)]
    trace_spans: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show last reload time and cached item count
    Status,
    /// Delete all cached media items
    ClearCache,
    /// Import media items from a JSON file
    ImportItems {
        /// Path to the JSON file
        #[arg(long)]
        file: PathBuf,
    },
    /// Export all cached media items to a JSON file
    ExportItems {
        /// Path to the export file
        #[arg(long)]
        file: PathBuf,
    },
    /// List cached media items, newest first
    ListItems {
        /// Maximum number of items to display
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Show metadata for a cached media item
    ShowItem {
        /// Handle of the media item
        id: MediaId,
    },
    /// Print the day, month or year cards of the cached items
    Cards {
        /// days, months or years
        #[arg(long)]
        mode: ViewMode,
    },
    /// Select the given items and print the resulting action bar state
    Select {
        /// Handles of the items to select
        #[arg(required = true)]
        ids: Vec<MediaId>,
    },
    /// Create the cache folders and print their size
    Folders,
}

#[cfg_attr(feature = "trace-spans", tracing::instrument)]
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let overrides = config::AppConfigOverrides {
        log_level: cli.log_level.clone(),
        time_zone: cli.time_zone.clone(),
        trace_spans: cli.trace_spans,
        ..Default::default()
    };
    let cfg = config::AppConfig::load_from(cli.config.clone()).apply_overrides(&overrides);
    let base_dir = cfg.cache_path.clone();
    std::fs::create_dir_all(&base_dir)?;
    let file_appender = rolling::daily(&base_dir, "cu_gallery.log");
    let (file_writer, _guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(cfg.log_level.clone()))
        .with_writer(std::io::stdout.and(file_writer))
        .init();

    let db_path = cfg.db_path();

    match cli.command {
        Commands::Status => {
            if !db_path.exists() {
                println!("No cache found at {:?}", db_path);
                return Ok(());
            }
            let cache = CacheManager::new(&db_path)?;
            let last = cache.get_last_reload()?;
            println!("Last reload: {}", last.to_rfc3339());
            println!("Cached items: {}", cache.count()?);
        }
        Commands::ClearCache => {
            if !db_path.exists() {
                println!("No cache found at {:?}", db_path);
                return Ok(());
            }
            let cache = CacheManager::new(&db_path)?;
            cache.clear_cache()?;
            println!("Cache cleared");
        }
        Commands::ImportItems { file } => {
            let cache = CacheManager::new(&db_path)?;
            let count = cache.import_media_items(&file)?;
            println!("Imported {} items from {:?}", count, file);
        }
        Commands::ExportItems { file } => {
            if !db_path.exists() {
                println!("No cache found at {:?}", db_path);
                return Ok(());
            }
            let cache = CacheManager::new(&db_path)?;
            cache.export_media_items(&file)?;
            println!("Exported to {:?}", file);
        }
        Commands::ListItems { limit } => {
            if !db_path.exists() {
                println!("No cache found at {:?}", db_path);
                return Ok(());
            }
            let cache = CacheManager::new(&db_path)?;
            let items = cache.get_all_media_items()?;
            let max = limit.unwrap_or(10);
            for item in items.iter().take(max) {
                let when = item
                    .captured_at()
                    .map(|ts| ts.to_rfc3339())
                    .unwrap_or_else(|| "undated".to_string());
                println!("{} - {} ({})", item.id, item.name, when);
            }
        }
        Commands::ShowItem { id } => {
            if !db_path.exists() {
                println!("No cache found at {:?}", db_path);
                return Ok(());
            }
            let cache = CacheManager::new(&db_path)?;
            match cache.get_media_item(id)? {
                Some(item) => println!("{}", serde_json::to_string_pretty(&item)?),
                None => println!("Item not found: {}", id),
            }
        }
        Commands::Cards { mode } => {
            let Some(granularity) = mode.granularity() else {
                return Err("cards need --mode days, months or years".into());
            };
            if !db_path.exists() {
                println!("No cache found at {:?}", db_path);
                return Ok(());
            }
            let zone: ReferenceZone = cfg.time_zone.parse()?;
            let cache = CacheManager::new(&db_path)?;
            let mut view_model = GalleryViewModel::new(zone);
            view_model.reload(cache.get_all_media_items()?);
            let cards = view_model.cards(granularity);
            println!("{}: {} cards", mode, cards.len());
            for card in cards {
                println!("{} - {} items (cover {})", card.label, card.count(), card.cover.id);
            }
        }
        Commands::Select { ids } => {
            if !db_path.exists() {
                println!("No cache found at {:?}", db_path);
                return Ok(());
            }
            let zone: ReferenceZone = cfg.time_zone.parse()?;
            let cache = CacheManager::new(&db_path)?;
            let (handle, service) = spawn_gallery(GalleryViewModel::new(zone));
            handle.reload(cache.get_all_media_items_async().await?)?;
            for id in ids {
                handle.long_click(id)?;
            }
            handle.flush().await?;
            let snap = handle.snapshot();
            println!("{}", snap.gallery.title);
            println!("Selected: {}", snap.gallery.count);
            for id in &snap.gallery.selected {
                println!("  {}", id);
            }
            drop(handle);
            service.await?;
        }
        Commands::Folders => {
            let folders = CacheFolders::new(&base_dir);
            folders.create_all()?;
            for name in [THUMBNAIL_FOLDER, PREVIEW_FOLDER, TEMPORAL_FOLDER] {
                println!("{}", folders.folder(name)?.display());
            }
            println!("Cache size: {}", format_size(folders.size_bytes()?));
        }
    }

    Ok(())
}
