use std::cmp::Ordering;
use std::fmt;
use std::path::{Path, PathBuf};

use tracing::warn;

/// Image file extensions the gallery lists.
const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp", "gif", "bmp", "tiff", "tif"];

/// A single image as served by the image source.
///
/// `path` is the unique key. Records are immutable apart from server-driven
/// replacement after a rotation, which swaps the whole record in place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRecord {
    pub path: PathBuf,
    pub name: String,
    pub url: String,
    /// Creation timestamp in seconds since the Unix epoch.
    pub created: i64,
}

impl ImageRecord {
    /// Create a record whose name is taken from the final path component.
    pub fn new(path: impl Into<PathBuf>, url: impl Into<String>, created: i64) -> Self {
        let path = path.into();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self {
            path,
            name,
            url: url.into(),
            created,
        }
    }

    /// Check whether a path has an image extension.
    pub fn is_image_path(path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
            .unwrap_or(false)
    }

    /// Copy of this record pointing at a different served url.
    pub fn with_url(&self, url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..self.clone()
        }
    }
}

/// Ordering applied to the collection before pagination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortMethod {
    #[default]
    DateDesc,
    DateAsc,
    NameAsc,
    NameDesc,
}

impl SortMethod {
    pub const ALL: [SortMethod; 4] = [
        SortMethod::DateDesc,
        SortMethod::DateAsc,
        SortMethod::NameAsc,
        SortMethod::NameDesc,
    ];

    /// Parse a sort key, returning `None` for unknown keys.
    pub fn parse(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|m| m.key() == key.trim())
    }

    /// Parse a sort key, falling back to `date-desc` with a warning.
    pub fn from_key(key: &str) -> Self {
        Self::parse(key).unwrap_or_else(|| {
            warn!(key, "Unknown sort method, defaulting to date-desc");
            Self::DateDesc
        })
    }

    pub fn key(self) -> &'static str {
        match self {
            Self::DateDesc => "date-desc",
            Self::DateAsc => "date-asc",
            Self::NameAsc => "name-asc",
            Self::NameDesc => "name-desc",
        }
    }

    /// Total order used by the stable sort of the collection.
    pub fn compare(self, a: &ImageRecord, b: &ImageRecord) -> Ordering {
        match self {
            Self::DateDesc => b.created.cmp(&a.created),
            Self::DateAsc => a.created.cmp(&b.created),
            Self::NameAsc => locale_cmp(&a.name, &b.name),
            Self::NameDesc => locale_cmp(&b.name, &a.name),
        }
    }
}

impl fmt::Display for SortMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Case-insensitive name order; on a tie lowercase sorts before uppercase.
fn locale_cmp(a: &str, b: &str) -> Ordering {
    a.to_lowercase()
        .cmp(&b.to_lowercase())
        .then_with(|| b.cmp(a))
}
