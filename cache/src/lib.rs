//! Local cache of the camera-upload listing.

mod folders;

pub use folders::{format_size, CacheFolders, PREVIEW_FOLDER, TEMPORAL_FOLDER, THUMBNAIL_FOLDER};

use chrono::{DateTime, TimeZone, Utc};
use gallery::{MediaId, MediaItem};
use rusqlite::{params, Connection, Row};
use rusqlite_migration::{Migrations, M};
use std::path::Path;
use std::sync::{Arc, Mutex};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Database Error: {0}")]
    DatabaseError(String),
    #[error("Serialization Error: {0}")]
    SerializationError(String),
    #[error("Deserialization Error: {0}")]
    DeserializationError(String),
    #[error("IO Error: {0}")]
    IoError(String),
    #[error("Other Error: {0}")]
    Other(String),
}

#[derive(Clone)]
pub struct CacheManager {
    conn: Arc<Mutex<Connection>>,
}

fn apply_migrations(conn: &mut Connection) -> Result<(), CacheError> {
    let migrations = Migrations::new(vec![
        M::up(
            "CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);\
             INSERT INTO schema_version (version) VALUES (1);\
             CREATE TABLE IF NOT EXISTS media_items (\
                 id INTEGER PRIMARY KEY,\
                 name TEXT NOT NULL,\
                 mime_type TEXT NOT NULL DEFAULT '',\
                 timestamp_ms INTEGER,\
                 thumbnail TEXT,\
                 parent INTEGER\
             );",
        ),
        M::up(
            "CREATE TABLE IF NOT EXISTS last_reload (id INTEGER PRIMARY KEY, timestamp TEXT NOT NULL);\
             INSERT OR IGNORE INTO last_reload (id, timestamp) VALUES (1, '1970-01-01T00:00:00Z');\
             UPDATE schema_version SET version = 2;",
        ),
        M::up(
            "CREATE INDEX IF NOT EXISTS idx_media_items_timestamp ON media_items (timestamp_ms);\
             UPDATE schema_version SET version = 3;",
        ),
    ]);
    migrations
        .to_latest(conn)
        .map_err(|e| CacheError::DatabaseError(format!("Failed to apply migrations: {}", e)))?;
    Ok(())
}

// Handles are stored as i64, SQLite has no unsigned integers.
fn handle_to_sql(id: MediaId) -> i64 {
    id.0 as i64
}

fn handle_from_sql(raw: i64) -> MediaId {
    MediaId(raw as u64)
}

fn row_to_item(row: &Row<'_>) -> rusqlite::Result<MediaItem> {
    let parent: Option<i64> = row.get(5)?;
    Ok(MediaItem {
        id: handle_from_sql(row.get(0)?),
        name: row.get(1)?,
        mime_type: row.get(2)?,
        timestamp: row.get(3)?,
        thumbnail: row.get(4)?,
        parent: parent.map(handle_from_sql),
        selected: false,
    })
}

const SELECT_ITEMS: &str =
    "SELECT id, name, mime_type, timestamp_ms, thumbnail, parent FROM media_items";

impl CacheManager {
    pub fn lock_conn(&self) -> Result<std::sync::MutexGuard<'_, Connection>, CacheError> {
        self.conn
            .lock()
            .map_err(|_| CacheError::Other("Poisoned lock".into()))
    }

    pub fn new(db_path: &Path) -> Result<Self, CacheError> {
        let mut conn = Connection::open(db_path)
            .map_err(|e| CacheError::DatabaseError(format!("Failed to open database: {}", e)))?;
        apply_migrations(&mut conn)?;

        Ok(CacheManager {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn insert_media_item(&self, item: &MediaItem) -> Result<(), CacheError> {
        let conn = self.lock_conn()?;
        Self::insert_with(&conn, item)
    }

    /// Inserts a batch in a single transaction.
    #[cfg_attr(feature = "trace-spans", tracing::instrument(skip(self, items)))]
    pub fn insert_media_items(&self, items: &[MediaItem]) -> Result<(), CacheError> {
        let mut conn = self.lock_conn()?;
        let tx = conn
            .transaction()
            .map_err(|e| CacheError::DatabaseError(format!("Failed to start transaction: {}", e)))?;
        for item in items {
            Self::insert_with(&tx, item)?;
        }
        tx.commit()
            .map_err(|e| CacheError::DatabaseError(format!("Failed to commit media items: {}", e)))?;
        tracing::info!(items = items.len(), "cached media items");
        Ok(())
    }

    fn insert_with(conn: &Connection, item: &MediaItem) -> Result<(), CacheError> {
        conn.execute(
            "INSERT OR REPLACE INTO media_items (
                id, name, mime_type, timestamp_ms, thumbnail, parent
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                handle_to_sql(item.id),
                item.name,
                item.mime_type,
                item.timestamp,
                item.thumbnail,
                item.parent.map(handle_to_sql)
            ],
        )
        .map_err(|e| CacheError::DatabaseError(format!("Failed to insert media item: {}", e)))?;
        Ok(())
    }

    pub fn get_media_item(&self, id: MediaId) -> Result<Option<MediaItem>, CacheError> {
        let conn = self.lock_conn()?;
        let mut stmt = conn
            .prepare(&format!("{} WHERE id = ?1", SELECT_ITEMS))
            .map_err(|e| CacheError::DatabaseError(format!("Failed to prepare statement: {}", e)))?;

        let mut rows = stmt
            .query(params![handle_to_sql(id)])
            .map_err(|e| CacheError::DatabaseError(format!("Failed to query media item: {}", e)))?;

        match rows
            .next()
            .map_err(|e| CacheError::DatabaseError(format!("Failed to get row: {}", e)))?
        {
            Some(row) => row_to_item(row)
                .map(Some)
                .map_err(|e| CacheError::DatabaseError(e.to_string())),
            None => Ok(None),
        }
    }

    /// All cached items, newest first.
    pub fn get_all_media_items(&self) -> Result<Vec<MediaItem>, CacheError> {
        let start = std::time::Instant::now();
        let conn = self.lock_conn()?;
        let mut stmt = conn
            .prepare(&format!(
                "{} ORDER BY timestamp_ms IS NULL, timestamp_ms DESC",
                SELECT_ITEMS
            ))
            .map_err(|e| CacheError::DatabaseError(format!("Failed to prepare statement: {}", e)))?;

        let iter = stmt
            .query_map([], row_to_item)
            .map_err(|e| {
                CacheError::DatabaseError(format!("Failed to query all media items: {}", e))
            })?;

        let mut items = Vec::new();
        for item in iter {
            items.push(item.map_err(|e| {
                CacheError::DatabaseError(format!(
                    "Failed to retrieve media item from iterator: {}",
                    e
                ))
            })?);
        }
        tracing::info!("cache_load_time_ms" = %start.elapsed().as_millis(), "items" = items.len());
        Ok(items)
    }

    pub fn count(&self) -> Result<usize, CacheError> {
        let conn = self.lock_conn()?;
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM media_items", [], |row| row.get(0))
            .map_err(|e| CacheError::DatabaseError(format!("Failed to count media items: {}", e)))?;
        Ok(count as usize)
    }

    pub fn delete_media_item(&self, id: MediaId) -> Result<(), CacheError> {
        let conn = self.lock_conn()?;
        conn.execute(
            "DELETE FROM media_items WHERE id = ?1",
            params![handle_to_sql(id)],
        )
        .map_err(|e| CacheError::DatabaseError(format!("Failed to delete media item: {}", e)))?;
        Ok(())
    }

    pub fn clear_cache(&self) -> Result<(), CacheError> {
        let conn = self.lock_conn()?;
        conn.execute("DELETE FROM media_items", [])
            .map_err(|e| CacheError::DatabaseError(format!("Failed to clear cache: {}", e)))?;
        conn.execute(
            "UPDATE last_reload SET timestamp = '1970-01-01T00:00:00Z' WHERE id = 1",
            [],
        )
        .map_err(|e| CacheError::DatabaseError(format!("Failed to reset last_reload: {}", e)))?;
        Ok(())
    }

    pub fn get_last_reload(&self) -> Result<DateTime<Utc>, CacheError> {
        let conn = self.lock_conn()?;
        let ts: String = conn
            .query_row("SELECT timestamp FROM last_reload WHERE id = 1", [], |row| {
                row.get(0)
            })
            .map_err(|e| CacheError::DatabaseError(format!("Failed to query last reload: {}", e)))?;
        DateTime::parse_from_rfc3339(&ts)
            .map_err(|e| CacheError::DeserializationError(e.to_string()))
            .map(|dt| Utc.from_utc_datetime(&dt.naive_utc()))
    }

    pub fn update_last_reload(&self, ts: DateTime<Utc>) -> Result<(), CacheError> {
        let conn = self.lock_conn()?;
        conn.execute(
            "UPDATE last_reload SET timestamp = ?1 WHERE id = 1",
            params![ts.to_rfc3339()],
        )
        .map_err(|e| CacheError::DatabaseError(format!("Failed to update last reload: {}", e)))?;
        Ok(())
    }

    pub fn export_media_items(&self, path: &Path) -> Result<(), CacheError> {
        let items = self.get_all_media_items()?;
        let data = serde_json::to_string_pretty(&items)
            .map_err(|e| CacheError::SerializationError(e.to_string()))?;
        std::fs::write(path, data).map_err(|e| CacheError::IoError(e.to_string()))?;
        tracing::info!(items = items.len(), path = %path.display(), "exported media items");
        Ok(())
    }

    /// Imports a JSON array of items. Returns how many were read.
    pub fn import_media_items(&self, path: &Path) -> Result<usize, CacheError> {
        let data = std::fs::read_to_string(path).map_err(|e| CacheError::IoError(e.to_string()))?;
        let items: Vec<MediaItem> = serde_json::from_str(&data)
            .map_err(|e| CacheError::DeserializationError(e.to_string()))?;
        self.insert_media_items(&items)?;
        Ok(items.len())
    }

    pub async fn insert_media_items_async(&self, items: Vec<MediaItem>) -> Result<(), CacheError> {
        let this = self.clone();
        tokio::task::spawn_blocking(move || this.insert_media_items(&items))
            .await
            .map_err(|e| CacheError::Other(e.to_string()))?
    }

    pub async fn get_all_media_items_async(&self) -> Result<Vec<MediaItem>, CacheError> {
        let this = self.clone();
        tokio::task::spawn_blocking(move || this.get_all_media_items())
            .await
            .map_err(|e| CacheError::Other(e.to_string()))?
    }

    pub async fn get_last_reload_async(&self) -> Result<DateTime<Utc>, CacheError> {
        let this = self.clone();
        tokio::task::spawn_blocking(move || this.get_last_reload())
            .await
            .map_err(|e| CacheError::Other(e.to_string()))?
    }

    pub async fn update_last_reload_async(&self, ts: DateTime<Utc>) -> Result<(), CacheError> {
        let this = self.clone();
        tokio::task::spawn_blocking(move || this.update_last_reload(ts))
            .await
            .map_err(|e| CacheError::Other(e.to_string()))?
    }
}
