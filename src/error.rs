//! Error taxonomy for the gallery engine.
//!
//! None of these are fatal. A failed mutation leaves the state as it was and
//! a failed load leaves an empty view with the error shown. Index errors
//! abort the offending operation. Duplicate records are not errors at all
//! (see `LoadReport`).

use std::path::PathBuf;

use thiserror::Error;

use crate::config::ConfigError;

/// Broad error category used for user-facing handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Fetching or parsing the image list failed.
    Load,
    /// Delete, favorite or rotate failed.
    Mutation,
    /// An index outside the collection reached the engine.
    Index,
    /// Invalid configuration value.
    Config,
}

/// Mutation kinds reported in `GalleryError::Mutation`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationAction {
    Delete,
    Favorite,
    CheckFavorite,
    Rotate,
    SaveRotation,
}

impl std::fmt::Display for MutationAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Delete => "delete",
            Self::Favorite => "favorite",
            Self::CheckFavorite => "check favorite",
            Self::Rotate => "rotate",
            Self::SaveRotation => "save rotation",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum GalleryError {
    #[error("failed to load images from {directory:?}: {message}")]
    Load { directory: PathBuf, message: String },

    #[error("failed to {action} {path:?}: {message}")]
    Mutation {
        action: MutationAction,
        path: PathBuf,
        message: String,
    },

    #[error("index {index} out of range for {len} images ({context})")]
    Index {
        index: usize,
        len: usize,
        context: &'static str,
    },

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl GalleryError {
    pub fn load(directory: impl Into<PathBuf>, err: &anyhow::Error) -> Self {
        Self::Load {
            directory: directory.into(),
            message: format!("{err:#}"),
        }
    }

    pub fn mutation(action: MutationAction, path: impl Into<PathBuf>, err: &anyhow::Error) -> Self {
        Self::Mutation {
            action,
            path: path.into(),
            message: format!("{err:#}"),
        }
    }

    pub fn index(index: usize, len: usize, context: &'static str) -> Self {
        Self::Index {
            index,
            len,
            context,
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Load { .. } => ErrorCategory::Load,
            Self::Mutation { .. } => ErrorCategory::Mutation,
            Self::Index { .. } => ErrorCategory::Index,
            Self::Config(_) => ErrorCategory::Config,
        }
    }
}

pub type Result<T, E = GalleryError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    #[test]
    fn test_categories() {
        let err = GalleryError::load("/photos", &anyhow!("offline"));
        assert_eq!(err.category(), ErrorCategory::Load);

        let err = GalleryError::mutation(MutationAction::Delete, "/photos/a.jpg", &anyhow!("denied"));
        assert_eq!(err.category(), ErrorCategory::Mutation);

        let err = GalleryError::index(7, 3, "open viewer");
        assert_eq!(err.category(), ErrorCategory::Index);

        let err = GalleryError::from(ConfigError::ZeroValue { key: "FOLIO_PAGE_SIZE" });
        assert_eq!(err.category(), ErrorCategory::Config);
        assert_eq!(err.to_string(), "FOLIO_PAGE_SIZE must be at least 1");
    }

    #[test]
    fn test_messages_keep_context_chain() {
        let source = anyhow!("permission denied").context("Failed to remove file");
        let err = GalleryError::mutation(MutationAction::Delete, "/p/a.jpg", &source);
        let text = err.to_string();
        assert!(text.contains("failed to delete"));
        assert!(text.contains("Failed to remove file: permission denied"));
    }

    #[test]
    fn test_index_message() {
        let err = GalleryError::index(5, 2, "navigate");
        assert_eq!(err.to_string(), "index 5 out of range for 2 images (navigate)");
    }
}
