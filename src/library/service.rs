//! Filesystem-backed image source and mutation service.
//!
//! Blocking work (SQLite, directory walks, image codecs) runs on tokio's
//! blocking pool; the store sits behind a mutex shared with those tasks.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use parking_lot::Mutex;
use tokio::task;
use tracing::{debug, info};

use crate::models::ImageRecord;
use crate::ports::{FavoriteToggle, ImageSource, MutationService, RotateDirection, RotatedImage};

use super::rotation::{version_tag, ImageRotator};
use super::scanner::{created_seconds, file_url, DirectoryScanner, ScanConfig};
use super::store::LibraryStore;
use super::trash::Trash;

pub struct LocalLibrary {
    store: Arc<Mutex<LibraryStore>>,
    scanner: DirectoryScanner,
    rotator: Arc<ImageRotator>,
    trash: Arc<Trash>,
}

impl LocalLibrary {
    /// Open the library database and rotation directory under `data_dir`.
    /// Deleted images are moved to `trash_dir`.
    pub fn open(data_dir: &Path, trash_dir: &Path, scan: ScanConfig) -> Result<Self> {
        let store = LibraryStore::open_in(data_dir)?;
        Ok(Self::new(store, data_dir, trash_dir, scan))
    }

    pub fn new(store: LibraryStore, data_dir: &Path, trash_dir: &Path, scan: ScanConfig) -> Self {
        Self {
            store: Arc::new(Mutex::new(store)),
            scanner: DirectoryScanner::new(scan),
            rotator: Arc::new(ImageRotator::new(data_dir)),
            trash: Arc::new(Trash::new(trash_dir)),
        }
    }

    async fn with_store<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&LibraryStore) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let store = self.store.clone();
        task::spawn_blocking(move || f(&*store.lock()))
            .await
            .context("Library task panicked")?
    }

    pub async fn add_directory(&self, path: &Path) -> Result<bool> {
        let path = fs::canonicalize(path)
            .with_context(|| format!("Cannot monitor {:?}", path))?;
        if !path.is_dir() {
            anyhow::bail!("{:?} is not a directory", path);
        }
        self.with_store(move |store| store.add_directory(&path)).await
    }

    pub async fn remove_directory(&self, path: &Path) -> Result<bool> {
        let path = fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
        self.with_store(move |store| store.remove_directory(&path))
            .await
    }

    /// Monitored directories, ordered by path.
    pub async fn directories(&self) -> Result<Vec<PathBuf>> {
        self.with_store(|store| store.list_directories()).await
    }
}

impl ImageSource for LocalLibrary {
    async fn fetch_images(&self, directory: &Path) -> Result<Vec<ImageRecord>> {
        self.scanner.images(directory).await
    }

    async fn list_directories(&self, directory: &Path) -> Result<Vec<PathBuf>> {
        self.scanner.subdirectories(directory).await
    }
}

impl MutationService for LocalLibrary {
    async fn delete_image(&self, path: &Path) -> Result<()> {
        let trash = self.trash.clone();
        let target = path.to_path_buf();
        let trashed = task::spawn_blocking(move || trash.move_in(&target))
            .await
            .context("Delete task panicked")??;

        let target = path.to_path_buf();
        self.with_store(move |store| store.remove_favorite(&target))
            .await?;
        info!("Moved {:?} to {:?}", path, trashed);
        Ok(())
    }

    async fn toggle_favorite(&self, path: &Path) -> Result<FavoriteToggle> {
        let target = path.to_path_buf();
        let favorited = self
            .with_store(move |store| store.toggle_favorite(&target))
            .await?;
        debug!(?path, favorited, "Toggled favorite");
        Ok(FavoriteToggle {
            was_favorited: !favorited,
        })
    }

    async fn check_favorited(&self, path: &Path) -> Result<bool> {
        let target = path.to_path_buf();
        self.with_store(move |store| store.is_favorite(&target))
            .await
    }

    async fn rotate(&self, path: &Path, direction: RotateDirection) -> Result<RotatedImage> {
        let rotator = self.rotator.clone();
        let src = path.to_path_buf();
        let temp_path = task::spawn_blocking(move || rotator.rotate(&src, direction))
            .await
            .context("Rotate task panicked")??;
        Ok(RotatedImage {
            url: file_url(&temp_path),
            temp_path,
        })
    }

    async fn save_rotation(&self, temp_path: &Path, original_path: &Path) -> Result<ImageRecord> {
        let rotator = self.rotator.clone();
        let temp = temp_path.to_path_buf();
        let original = original_path.to_path_buf();
        let record = task::spawn_blocking(move || -> Result<ImageRecord> {
            rotator.commit(&temp, &original)?;
            let metadata = fs::metadata(&original)
                .with_context(|| format!("Failed to stat {:?}", original))?;
            let url = format!("{}?v={}", file_url(&original), version_tag(&original)?);
            Ok(ImageRecord::new(&original, url, created_seconds(&metadata)))
        })
        .await
        .context("Save task panicked")??;

        info!("Saved rotation of {:?}", original_path);
        Ok(record)
    }

    fn discard_rotation(&self, temp_path: &Path) {
        self.rotator.discard(temp_path);
    }
}
