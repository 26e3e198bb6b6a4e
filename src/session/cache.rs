//! Listing caches keyed by directory path.
//!
//! - Image lists: the raw records last fetched for a directory
//! - Directory lists: the subdirectories last listed for a directory
//!
//! Both are LRU bounded and invalidated wholesale whenever the set of
//! monitored directories changes; there is no partial invalidation.

use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};

use lru::LruCache;
use tracing::{debug, trace};

use crate::models::ImageRecord;

pub struct ListingCache {
    images: LruCache<PathBuf, Vec<ImageRecord>>,
    directories: LruCache<PathBuf, Vec<PathBuf>>,
}

impl ListingCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        debug!(capacity, "Initialized listing cache");
        Self {
            images: LruCache::new(capacity),
            directories: LruCache::new(capacity),
        }
    }

    pub fn images(&mut self, directory: &Path) -> Option<Vec<ImageRecord>> {
        let hit = self.images.get(directory).cloned();
        trace!(?directory, hit = hit.is_some(), "Image list cache lookup");
        hit
    }

    pub fn put_images(&mut self, directory: &Path, records: Vec<ImageRecord>) {
        self.images.put(directory.to_path_buf(), records);
    }

    pub fn directories(&mut self, directory: &Path) -> Option<Vec<PathBuf>> {
        self.directories.get(directory).cloned()
    }

    pub fn put_directories(&mut self, directory: &Path, children: Vec<PathBuf>) {
        self.directories.put(directory.to_path_buf(), children);
    }

    /// Drop a deleted image from the cached list of `directory`.
    pub fn remove_image(&mut self, directory: &Path, path: &Path) {
        if let Some(records) = self.images.get_mut(directory) {
            records.retain(|r| r.path != path);
        }
    }

    /// Swap a rotated image's record in the cached list of `directory`.
    pub fn replace_image(&mut self, directory: &Path, old_path: &Path, record: &ImageRecord) {
        if let Some(records) = self.images.get_mut(directory) {
            for entry in records.iter_mut().filter(|r| r.path == old_path) {
                *entry = record.clone();
            }
        }
    }

    /// Clear both caches.
    pub fn invalidate_all(&mut self) {
        debug!(
            images = self.images.len(),
            directories = self.directories.len(),
            "Clearing listing caches"
        );
        self.images.clear();
        self.directories.clear();
    }

    pub fn image_entries(&self) -> usize {
        self.images.len()
    }

    pub fn directory_entries(&self) -> usize {
        self.directories.len()
    }
}
