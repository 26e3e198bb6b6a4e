//! Collaborators the engine is driven by and renders through.
//!
//! Transport is not the engine's concern: an `ImageSource` may be an HTTP
//! client or the local filesystem, and a `RenderSink` may be a widget tree or
//! a terminal. The engine only ever talks to these traits.

// Implementations are used through generics only, never as trait objects.
#![allow(async_fn_in_trait)]

use std::path::{Path, PathBuf};

use anyhow::Result;

use crate::models::ImageRecord;
use crate::session::sync::PaginationStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RotateDirection {
    Clockwise,
    CounterClockwise,
}

impl RotateDirection {
    /// Signed quarter-turn delta in degrees.
    pub fn degrees(self) -> i32 {
        match self {
            Self::Clockwise => 90,
            Self::CounterClockwise => -90,
        }
    }
}

/// Result of `MutationService::toggle_favorite`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FavoriteToggle {
    /// State before the toggle; the item is now the opposite.
    pub was_favorited: bool,
}

/// A rotated copy waiting to be saved over the original.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RotatedImage {
    pub temp_path: PathBuf,
    pub url: String,
}

pub trait ImageSource {
    async fn fetch_images(&self, directory: &Path) -> Result<Vec<ImageRecord>>;

    /// Immediate subdirectories of `directory`, sorted by name.
    async fn list_directories(&self, directory: &Path) -> Result<Vec<PathBuf>>;
}

pub trait MutationService {
    async fn delete_image(&self, path: &Path) -> Result<()>;

    async fn toggle_favorite(&self, path: &Path) -> Result<FavoriteToggle>;

    async fn check_favorited(&self, path: &Path) -> Result<bool>;

    async fn rotate(&self, path: &Path, direction: RotateDirection) -> Result<RotatedImage>;

    /// Commit `temp_path` over `original_path`, returning the refreshed record
    /// that replaces the one keyed by `original_path`.
    async fn save_rotation(&self, temp_path: &Path, original_path: &Path) -> Result<ImageRecord>;

    /// Drop an unsaved rotated copy.
    fn discard_rotation(&self, _temp_path: &Path) {}
}

/// Why the grid has nothing to show.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EmptyReason {
    NoImages,
    NoFavorites,
    LoadFailed(String),
}

/// Completion acknowledgement for a page render.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRendered {
    pub item_count: usize,
}

pub trait RenderSink {
    /// Redraw the grid with `items`; returns once the page is in place.
    fn render_page(&mut self, items: &[ImageRecord], selected: Option<usize>) -> PageRendered;

    /// Move the highlight within the rendered page.
    fn render_selection(&mut self, selected: Option<usize>);

    fn render_viewer(&mut self, record: &ImageRecord, absolute_index: usize, total: usize);

    fn close_viewer(&mut self);

    fn render_pagination_status(&mut self, status: PaginationStatus);

    fn render_empty_state(&mut self, reason: EmptyReason);

    fn render_favorite(&mut self, _path: &Path, _favorited: bool) {}

    /// One-line user-visible status message.
    fn render_message(&mut self, _message: &str) {}

    /// Items per visual row of the rendered grid; 0 if unknown.
    fn grid_columns(&self) -> usize;
}
