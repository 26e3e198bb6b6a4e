//! Canonical, deduplicated and sorted image collection.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::models::{ImageRecord, SortMethod};

/// A raw record dropped by `ImageStore::load` because its path was already taken.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateRecord {
    pub path: PathBuf,
    /// Position of the kept occurrence in the sorted input.
    pub kept_index: usize,
    /// Position of the discarded occurrence in the sorted input.
    pub discarded_index: usize,
}

/// Summary of a `load` call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub received: usize,
    pub kept: usize,
    pub duplicates: Vec<DuplicateRecord>,
}

/// Outcome of `ImageStore::remove`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Removal {
    pub removed: bool,
    /// Index the record occupied before removal.
    pub index: Option<usize>,
    pub new_length: usize,
}

/// Owns the ordered collection for the loaded directory.
///
/// Invariant: no two records share a `path`.
#[derive(Debug, Clone, Default)]
pub struct ImageStore {
    records: Vec<ImageRecord>,
    sort: SortMethod,
}

impl ImageStore {
    pub fn new(sort: SortMethod) -> Self {
        Self {
            records: Vec::new(),
            sort,
        }
    }

    /// Replace the collection with `raw`, sorted then deduplicated by path.
    ///
    /// The sort is stable, so records that compare equal keep their incoming
    /// order and the first occurrence in sort order wins.
    pub fn load(&mut self, mut raw: Vec<ImageRecord>, sort: SortMethod) -> LoadReport {
        let received = raw.len();
        raw.sort_by(|a, b| sort.compare(a, b));

        let mut first_seen: HashMap<PathBuf, usize> = HashMap::with_capacity(raw.len());
        let mut records = Vec::with_capacity(raw.len());
        let mut duplicates = Vec::new();

        for (index, record) in raw.into_iter().enumerate() {
            if let Some(&kept_index) = first_seen.get(&record.path) {
                debug!(
                    path = ?record.path,
                    kept_index,
                    discarded_index = index,
                    "Discarding duplicate image record"
                );
                duplicates.push(DuplicateRecord {
                    path: record.path,
                    kept_index,
                    discarded_index: index,
                });
                continue;
            }
            first_seen.insert(record.path.clone(), index);
            records.push(record);
        }

        if !duplicates.is_empty() {
            info!(
                received,
                kept = records.len(),
                "Removed {} duplicate image records",
                duplicates.len()
            );
        }

        self.records = records;
        self.sort = sort;

        LoadReport {
            received,
            kept: self.records.len(),
            duplicates,
        }
    }

    /// Re-sort the existing collection.
    pub fn resort(&mut self, sort: SortMethod) {
        self.records.sort_by(|a, b| sort.compare(a, b));
        self.sort = sort;
    }

    /// Remove the record with `path`; a missing path is a no-op.
    pub fn remove(&mut self, path: &Path) -> Removal {
        match self.index_of(path) {
            Some(index) => {
                self.records.remove(index);
                debug!(?path, index, remaining = self.records.len(), "Removed image record");
                Removal {
                    removed: true,
                    index: Some(index),
                    new_length: self.records.len(),
                }
            }
            None => Removal {
                removed: false,
                index: None,
                new_length: self.records.len(),
            },
        }
    }

    pub fn index_of(&self, path: &Path) -> Option<usize> {
        self.records.iter().position(|r| r.path == path)
    }

    /// Swap the record keyed by `old_path` for `record` without moving it.
    ///
    /// Returns false if `old_path` is unknown or the new path already belongs
    /// to a different record.
    pub fn replace(&mut self, old_path: &Path, record: ImageRecord) -> bool {
        let Some(index) = self.index_of(old_path) else {
            warn!(?old_path, "Cannot replace unknown image record");
            return false;
        };
        if record.path != old_path {
            if let Some(other) = self.index_of(&record.path) {
                warn!(
                    ?old_path,
                    new_path = ?record.path,
                    other,
                    "Replacement path already present in collection"
                );
                return false;
            }
        }
        self.records[index] = record;
        true
    }

    pub fn records(&self) -> &[ImageRecord] {
        &self.records
    }

    pub fn sort_method(&self) -> SortMethod {
        self.sort
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }
}
