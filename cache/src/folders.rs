//! On-disk layout of the thumbnail, preview and scratch folders.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::CacheError;

pub const THUMBNAIL_FOLDER: &str = "thumbnails";
pub const PREVIEW_FOLDER: &str = "previews";
pub const TEMPORAL_FOLDER: &str = "temp";

const PERSISTENT_FOLDERS: [&str; 2] = [THUMBNAIL_FOLDER, PREVIEW_FOLDER];

#[derive(Debug, Clone)]
pub struct CacheFolders {
    root: PathBuf,
}

impl CacheFolders {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        CacheFolders { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns the named folder, creating it when missing.
    pub fn folder(&self, name: &str) -> Result<PathBuf, CacheError> {
        let path = self.root.join(name);
        if !path.is_dir() {
            fs::create_dir_all(&path).map_err(|e| {
                CacheError::IoError(format!("Failed to create {}: {}", path.display(), e))
            })?;
            tracing::debug!(folder = %path.display(), "created cache folder");
        }
        Ok(path)
    }

    pub fn file(&self, folder: &str, file_name: &str) -> Result<PathBuf, CacheError> {
        Ok(self.folder(folder)?.join(file_name))
    }

    pub fn build_thumbnail_file(&self, file_name: &str) -> Result<PathBuf, CacheError> {
        self.file(THUMBNAIL_FOLDER, file_name)
    }

    pub fn build_preview_file(&self, file_name: &str) -> Result<PathBuf, CacheError> {
        self.file(PREVIEW_FOLDER, file_name)
    }

    pub fn build_temp_file(&self, file_name: &str) -> Result<PathBuf, CacheError> {
        self.file(TEMPORAL_FOLDER, file_name)
    }

    /// Creates the thumbnail and preview folders and empties the scratch
    /// folder left over from a previous run.
    pub fn create_all(&self) -> Result<(), CacheError> {
        for name in PERSISTENT_FOLDERS {
            let path = self.folder(name)?;
            tracing::info!(folder = %path.display(), "cache folder ready");
        }
        let temp = self.root.join(TEMPORAL_FOLDER);
        if temp.is_dir() {
            clean_dir(&temp).map_err(|e| CacheError::IoError(e.to_string()))?;
        }
        Ok(())
    }

    /// Total size of everything below the root, in bytes.
    pub fn size_bytes(&self) -> Result<u64, CacheError> {
        if !self.root.exists() {
            return Ok(0);
        }
        dir_size(&self.root).map_err(|e| CacheError::IoError(e.to_string()))
    }

    /// Removes the content of every cache folder, keeping the folders.
    pub fn clear(&self) -> Result<(), CacheError> {
        for name in [THUMBNAIL_FOLDER, PREVIEW_FOLDER, TEMPORAL_FOLDER] {
            let path = self.root.join(name);
            if path.is_dir() {
                clean_dir(&path).map_err(|e| CacheError::IoError(e.to_string()))?;
            }
        }
        tracing::info!(root = %self.root.display(), "cleared cache folders");
        Ok(())
    }

    /// Returns whether the folder was removed.
    pub fn delete_folder_if_empty(&self, name: &str) -> Result<bool, CacheError> {
        let path = self.root.join(name);
        if !path.is_dir() {
            return Ok(false);
        }
        let empty = fs::read_dir(&path)
            .map_err(|e| CacheError::IoError(e.to_string()))?
            .next()
            .is_none();
        if empty {
            fs::remove_dir(&path).map_err(|e| CacheError::IoError(e.to_string()))?;
        }
        Ok(empty)
    }
}

fn dir_size(path: &Path) -> io::Result<u64> {
    let mut total = 0;
    for entry in fs::read_dir(path)? {
        let entry = entry?;
        let meta = entry.metadata()?;
        if meta.is_dir() {
            total += dir_size(&entry.path())?;
        } else {
            total += meta.len();
        }
    }
    Ok(total)
}

fn clean_dir(path: &Path) -> io::Result<()> {
    for entry in fs::read_dir(path)? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            fs::remove_dir_all(entry.path())?;
        } else {
            fs::remove_file(entry.path())?;
        }
    }
    Ok(())
}

pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} {}", bytes, UNITS[0])
    } else {
        format!("{:.2} {}", value, UNITS[unit])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn builds_paths_inside_created_folders() {
        let dir = tempdir().unwrap();
        let folders = CacheFolders::new(dir.path());
        let thumb = folders.build_thumbnail_file("42.jpg").unwrap();
        assert_eq!(thumb, dir.path().join(THUMBNAIL_FOLDER).join("42.jpg"));
        assert!(dir.path().join(THUMBNAIL_FOLDER).is_dir());
        let preview = folders.build_preview_file("42.jpg").unwrap();
        assert!(preview.starts_with(dir.path().join(PREVIEW_FOLDER)));
    }

    #[test]
    fn size_and_clear() {
        let dir = tempdir().unwrap();
        let folders = CacheFolders::new(dir.path());
        folders.create_all().unwrap();
        fs::write(folders.build_thumbnail_file("a").unwrap(), [0u8; 100]).unwrap();
        fs::write(folders.build_temp_file("b").unwrap(), [0u8; 28]).unwrap();
        assert_eq!(folders.size_bytes().unwrap(), 128);

        folders.clear().unwrap();
        assert_eq!(folders.size_bytes().unwrap(), 0);
        assert!(dir.path().join(THUMBNAIL_FOLDER).is_dir());
    }

    #[test]
    fn create_all_empties_scratch() {
        let dir = tempdir().unwrap();
        let folders = CacheFolders::new(dir.path());
        let leftover = folders.build_temp_file("old.jpg").unwrap();
        fs::write(&leftover, b"x").unwrap();
        folders.create_all().unwrap();
        assert!(!leftover.exists());
    }

    #[test]
    fn delete_only_empty_folder() {
        let dir = tempdir().unwrap();
        let folders = CacheFolders::new(dir.path());
        folders.folder(PREVIEW_FOLDER).unwrap();
        fs::write(folders.build_thumbnail_file("a").unwrap(), b"x").unwrap();
        assert!(folders.delete_folder_if_empty(PREVIEW_FOLDER).unwrap());
        assert!(!folders.delete_folder_if_empty(THUMBNAIL_FOLDER).unwrap());
        assert!(!folders.delete_folder_if_empty("missing").unwrap());
    }

    #[test]
    fn formats_sizes() {
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(2048), "2.00 KB");
        assert_eq!(format_size(5 * 1024 * 1024), "5.00 MB");
    }
}
