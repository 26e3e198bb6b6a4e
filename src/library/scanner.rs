//! Directory listing for the local library.
//!
//! Lists the images directly inside a directory (no recursion) and the
//! immediate subdirectories used to build the directory tree.

use std::fs::Metadata;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use anyhow::{Context, Result};
use tokio::task;
use tracing::{debug, trace, warn};
use walkdir::WalkDir;

use crate::models::ImageRecord;

/// Configuration for the directory scanner.
#[derive(Debug, Clone)]
pub struct ScanConfig {
    /// Whether to follow symbolic links.
    pub follow_symlinks: bool,
    /// Whether to list entries whose name starts with a dot.
    pub include_hidden: bool,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            follow_symlinks: true,
            include_hidden: false,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct DirectoryScanner {
    config: ScanConfig,
}

impl DirectoryScanner {
    pub fn new(config: ScanConfig) -> Self {
        Self { config }
    }

    /// Lists the images in `dir` on the blocking pool.
    pub async fn images(&self, dir: &Path) -> Result<Vec<ImageRecord>> {
        let dir = dir.to_path_buf();
        let config = self.config.clone();
        task::spawn_blocking(move || Self::images_sync(&dir, &config))
            .await
            .context("Scan task panicked")?
    }

    /// Lists the subdirectories of `dir` on the blocking pool.
    pub async fn subdirectories(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        let dir = dir.to_path_buf();
        let config = self.config.clone();
        task::spawn_blocking(move || Self::subdirectories_sync(&dir, &config))
            .await
            .context("Scan task panicked")?
    }

    fn images_sync(dir: &Path, config: &ScanConfig) -> Result<Vec<ImageRecord>> {
        let mut records = Vec::new();
        for entry in Self::entries(dir, config)? {
            if entry.file_type().is_dir() {
                continue;
            }
            let path = entry.path();
            if !ImageRecord::is_image_path(path) {
                continue;
            }

            let metadata = match entry.metadata() {
                Ok(m) => m,
                Err(e) => {
                    warn!("Failed to read metadata for {:?}: {}", path, e);
                    continue;
                }
            };
            records.push(ImageRecord::new(path, file_url(path), created_seconds(&metadata)));
        }

        debug!("Listed {} images in {:?}", records.len(), dir);
        Ok(records)
    }

    fn subdirectories_sync(dir: &Path, config: &ScanConfig) -> Result<Vec<PathBuf>> {
        let mut dirs: Vec<PathBuf> = Self::entries(dir, config)?
            .into_iter()
            .filter(|e| e.file_type().is_dir())
            .map(|e| e.into_path())
            .collect();
        dirs.sort();
        trace!("Listed {} subdirectories in {:?}", dirs.len(), dir);
        Ok(dirs)
    }

    /// Direct children of `dir`, excluding `dir` itself.
    fn entries(dir: &Path, config: &ScanConfig) -> Result<Vec<walkdir::DirEntry>> {
        if !dir.is_dir() {
            anyhow::bail!("{:?} is not a directory", dir);
        }
        let walker = WalkDir::new(dir)
            .min_depth(1)
            .max_depth(1)
            .follow_links(config.follow_symlinks);

        let mut entries = Vec::new();
        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Skipping unreadable entry in {:?}: {}", dir, e);
                    continue;
                }
            };
            let hidden = entry.file_name().to_string_lossy().starts_with('.');
            if hidden && !config.include_hidden {
                continue;
            }
            entries.push(entry);
        }
        Ok(entries)
    }
}

/// Served url for a local file.
pub fn file_url(path: &Path) -> String {
    format!("file://{}", path.display())
}

/// Creation time in Unix seconds, falling back to the modification time
/// on filesystems that do not record it.
pub fn created_seconds(metadata: &Metadata) -> i64 {
    metadata
        .created()
        .or_else(|_| metadata.modified())
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}
