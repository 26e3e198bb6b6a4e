//! The gallery session: one object owning the collection, the active view,
//! the grid selection, the viewer and every in-flight request it issued.
//!
//! Each asynchronous flow is split into a `begin_*` step that captures a
//! ticket and a `complete_*` step that applies the result. Completions check
//! their ticket against the load generation and against what is displayed
//! now, so a result that lost its relevance while in flight is dropped
//! instead of corrupting the state. The `async` convenience methods chain
//! both steps around the backend call.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use tracing::{debug, info, trace, warn};

use crate::collection::{ImageStore, LoadReport, PageChangeRejected};
use crate::config::GalleryConfig;
use crate::error::{GalleryError, MutationAction, Result};
use crate::models::{ImageRecord, SortMethod};
use crate::navigation::{
    GridNavigator, NavKey, NavigateOutcome, NavigationResult, PositionClass, ViewerController,
    ViewerDirection, ViewerState,
};
use crate::ports::{
    EmptyReason, ImageSource, MutationService, RenderSink, RotateDirection, RotatedImage,
};

use super::cache::ListingCache;
use super::sync::{PaginationStatus, RefreshKind, SelectionSync};

/// Which records of the collection make up the active view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ViewFilter {
    #[default]
    All,
    FavoritesOnly,
}

/// A rotated copy of the displayed image that has not been saved yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingRotation {
    pub original_path: PathBuf,
    pub temp_path: PathBuf,
    pub url: String,
    /// Accumulated clockwise angle, one of 0, 90, 180, 270.
    pub angle: i32,
}

/// Captured when a directory load starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadTicket {
    generation: u64,
    directory: PathBuf,
}

/// Captured when a mutation on `path` is issued.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationTicket {
    generation: u64,
    path: PathBuf,
}

pub struct Gallery<B, R> {
    backend: B,
    sink: R,
    store: ImageStore,
    filter: ViewFilter,
    /// Favorite paths of the loaded collection, known only while filtering.
    favorites: HashSet<PathBuf>,
    /// Active view: the store filtered by `filter`, in store order.
    view: Vec<ImageRecord>,
    selection: SelectionSync,
    viewer: ViewerController,
    /// Cached grid column count; 0 forces a recompute from the sink.
    columns: usize,
    directory: Option<PathBuf>,
    generation: u64,
    cache: ListingCache,
    rotation: Option<PendingRotation>,
}

impl<B, R> Gallery<B, R>
where
    B: ImageSource + MutationService,
    R: RenderSink,
{
    pub fn new(config: &GalleryConfig, backend: B, sink: R) -> Self {
        Self {
            backend,
            sink,
            store: ImageStore::new(config.sort_method),
            filter: ViewFilter::All,
            favorites: HashSet::new(),
            view: Vec::new(),
            selection: SelectionSync::new(config.page_size),
            viewer: ViewerController::new(config.navigation_cooldown),
            columns: 0,
            directory: None,
            generation: 0,
            cache: ListingCache::new(config.cache_capacity),
            rotation: None,
        }
    }

    pub fn view(&self) -> &[ImageRecord] {
        &self.view
    }

    pub fn store(&self) -> &ImageStore {
        &self.store
    }

    pub fn selection(&self) -> &SelectionSync {
        &self.selection
    }

    pub fn viewer(&self) -> &ViewerController {
        &self.viewer
    }

    pub fn sink(&self) -> &R {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut R {
        &mut self.sink
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn filter(&self) -> ViewFilter {
        self.filter
    }

    pub fn sort_method(&self) -> SortMethod {
        self.store.sort_method()
    }

    pub fn directory(&self) -> Option<&Path> {
        self.directory.as_deref()
    }

    pub fn cache(&self) -> &ListingCache {
        &self.cache
    }

    pub fn pending_rotation(&self) -> Option<&PendingRotation> {
        self.rotation.as_ref()
    }

    pub fn status(&self) -> PaginationStatus {
        PaginationStatus::for_pages(self.selection.pages())
    }

    /// Record shown in the viewer, if it is open.
    pub fn current_record(&self) -> Option<&ImageRecord> {
        self.viewer.current_index().and_then(|i| self.view.get(i))
    }

    /// Record highlighted in the grid.
    pub fn selected_record(&self) -> Option<&ImageRecord> {
        self.selection
            .selected_absolute()
            .and_then(|i| self.view.get(i))
    }

    /// Target of item actions: the viewer's image, else the grid selection.
    pub fn target_record(&self) -> Option<&ImageRecord> {
        if self.viewer.is_open() {
            self.current_record()
        } else {
            self.selected_record()
        }
    }

    // ---- Loading ----

    /// Start loading `directory`. Any result for an earlier load becomes stale.
    pub fn begin_load(&mut self, directory: &Path) -> LoadTicket {
        self.generation += 1;
        self.directory = Some(directory.to_path_buf());
        self.favorites.clear();
        self.close_viewer();
        self.selection.reset();
        debug!(?directory, generation = self.generation, "Loading directory");
        LoadTicket {
            generation: self.generation,
            directory: directory.to_path_buf(),
        }
    }

    /// Apply a fetch result. Returns `Ok(None)` if the ticket is stale.
    pub fn complete_load(
        &mut self,
        ticket: LoadTicket,
        fetched: anyhow::Result<Vec<ImageRecord>>,
    ) -> Result<Option<LoadReport>> {
        if ticket.generation != self.generation {
            debug!(
                directory = ?ticket.directory,
                generation = ticket.generation,
                current = self.generation,
                "Discarding stale directory load"
            );
            return Ok(None);
        }

        match fetched {
            Ok(records) => {
                self.cache.put_images(&ticket.directory, records.clone());
                let report = self.store.load(records, self.store.sort_method());
                self.rebuild_view();
                self.refresh(RefreshKind::Rebuild);
                info!(
                    directory = ?ticket.directory,
                    images = report.kept,
                    visible = self.view.len(),
                    "Directory loaded"
                );
                Ok(Some(report))
            }
            Err(err) => {
                let error = GalleryError::load(&ticket.directory, &err);
                warn!(%error, "Directory load failed");
                self.store.clear();
                self.rebuild_view();
                self.selection.refresh(
                    &self.view,
                    RefreshKind::Rebuild,
                    EmptyReason::LoadFailed(format!("{err:#}")),
                    &mut self.sink,
                );
                Err(error)
            }
        }
    }

    /// Load `directory`, from the listing cache when possible.
    pub async fn load_directory(&mut self, directory: &Path) -> Result<LoadReport> {
        let ticket = self.begin_load(directory);
        let fetched = match self.cache.images(directory) {
            Some(records) => {
                debug!(?directory, "Using cached image list");
                Ok(records)
            }
            None => self.backend.fetch_images(directory).await,
        };

        if let (Ok(records), ViewFilter::FavoritesOnly) = (&fetched, self.filter) {
            match self.query_favorites(records).await {
                Ok(favorites) => self.favorites = favorites,
                Err(error) => {
                    warn!(%error, "Dropping favorites filter");
                    self.filter = ViewFilter::All;
                    self.sink
                        .render_message("Could not read favorites, showing all images");
                }
            }
        }

        Ok(self.complete_load(ticket, fetched)?.unwrap_or_default())
    }

    /// Subdirectories of `directory`, from the listing cache when possible.
    pub async fn subdirectories(&mut self, directory: &Path) -> Result<Vec<PathBuf>> {
        if let Some(children) = self.cache.directories(directory) {
            return Ok(children);
        }
        let children = self
            .backend
            .list_directories(directory)
            .await
            .map_err(|err| GalleryError::load(directory, &err))?;
        self.cache.put_directories(directory, children.clone());
        Ok(children)
    }

    /// A monitored directory was added or removed.
    pub fn on_directories_changed(&mut self) {
        self.cache.invalidate_all();
    }

    // ---- View shaping ----

    pub fn set_sort(&mut self, sort: SortMethod) {
        if sort == self.store.sort_method() {
            return;
        }
        info!(%sort, "Sort method changed");
        self.store.resort(sort);
        self.reshape_view();
    }

    pub fn set_page_size(&mut self, page_size: usize) {
        let page_size = page_size.max(1);
        if page_size == self.selection.pages().page_size() {
            return;
        }
        info!(page_size, "Page size changed");
        self.selection.set_page_size(page_size);
        self.refresh(RefreshKind::Rebuild);
    }

    /// Switch between all images and favorites only.
    ///
    /// Enabling the filter asks the backend about every loaded image; if any
    /// check fails the filter is left unchanged.
    pub async fn set_filter(&mut self, filter: ViewFilter) -> Result<()> {
        if filter == self.filter {
            return Ok(());
        }
        if filter == ViewFilter::FavoritesOnly {
            let records = self.store.records().to_vec();
            match self.query_favorites(&records).await {
                Ok(favorites) => self.favorites = favorites,
                Err(error) => {
                    warn!(%error, "Favorites filter not applied");
                    self.sink.render_message(&format!("Error: {error}"));
                    return Err(error);
                }
            }
        }
        info!(?filter, "View filter changed");
        self.filter = filter;
        self.reshape_view();
        Ok(())
    }

    async fn query_favorites(&self, records: &[ImageRecord]) -> Result<HashSet<PathBuf>> {
        let mut favorites = HashSet::new();
        for record in records {
            let favorited = self
                .backend
                .check_favorited(&record.path)
                .await
                .map_err(|err| {
                    GalleryError::mutation(MutationAction::CheckFavorite, &record.path, &err)
                })?;
            if favorited {
                favorites.insert(record.path.clone());
            }
        }
        trace!(favorites = favorites.len(), "Favorite states fetched");
        Ok(favorites)
    }

    /// Rebuild the view after a sort or filter change, back on page 1.
    /// An open viewer keeps its image and the grid moves to it.
    fn reshape_view(&mut self) {
        let viewed = self.current_record().map(|r| r.path.clone());
        self.rebuild_view();
        self.selection.reset();
        self.refresh(RefreshKind::Rebuild);
        if let Some(path) = viewed {
            self.repoint_viewer(&path);
            self.follow_viewer();
        }
    }

    /// Bring the grid page and selection to the viewer's image.
    fn follow_viewer(&mut self) {
        if let Some(index) = self.viewer.current_index() {
            self.selection.follow(index, &self.view, &mut self.sink);
        }
    }

    fn rebuild_view(&mut self) {
        self.view = match self.filter {
            ViewFilter::All => self.store.records().to_vec(),
            ViewFilter::FavoritesOnly => self
                .store
                .records()
                .iter()
                .filter(|r| self.favorites.contains(&r.path))
                .cloned()
                .collect(),
        };
    }

    fn empty_reason(&self) -> EmptyReason {
        match self.filter {
            ViewFilter::All => EmptyReason::NoImages,
            ViewFilter::FavoritesOnly => EmptyReason::NoFavorites,
        }
    }

    fn refresh(&mut self, kind: RefreshKind) -> PaginationStatus {
        self.columns = 0;
        let reason = self.empty_reason();
        self.selection
            .refresh(&self.view, kind, reason, &mut self.sink)
    }

    // ---- Grid ----

    /// Forget the cached column count, e.g. after a resize.
    pub fn invalidate_layout(&mut self) {
        self.columns = 0;
    }

    fn grid_columns(&mut self) -> usize {
        if self.columns == 0 {
            self.columns = self.sink.grid_columns().max(1);
            trace!(columns = self.columns, "Grid columns recomputed");
        }
        self.columns
    }

    /// Move the grid selection. With nothing selected, selects the first item.
    pub fn handle_grid_key(&mut self, key: NavKey) -> Option<NavigationResult> {
        if self.view.is_empty() {
            return None;
        }
        let Some(index) = self.selection.selected() else {
            self.selection.select(0, &mut self.sink);
            return Some(NavigationResult::Stay { new_index: 0 });
        };

        let navigator = GridNavigator::new(self.grid_columns());
        let result = navigator.move_selection(key, index, self.selection.pages());
        match result {
            NavigationResult::Stay { .. } if result.is_noop(index) => {
                trace!(?key, index, "Grid move blocked at the collection edge");
            }
            NavigationResult::Stay { new_index } => {
                self.selection.select(new_index, &mut self.sink);
            }
            NavigationResult::CrossPage {
                target_page,
                target_index,
            } => {
                self.columns = 0;
                if let Err(reason) = self.selection.show_page(
                    target_page,
                    Some(target_index),
                    &self.view,
                    &mut self.sink,
                ) {
                    debug!(%reason, ?key, "Grid move did not change page");
                }
            }
        }
        Some(result)
    }

    /// Highlight a page-relative index, e.g. from a click.
    pub fn select(&mut self, index: usize) -> bool {
        self.selection.select(index, &mut self.sink)
    }

    pub fn change_page(&mut self, page: usize) -> Result<usize, PageChangeRejected> {
        self.columns = 0;
        self.selection.show_page(page, None, &self.view, &mut self.sink)
    }

    pub fn next_page(&mut self) -> Result<usize, PageChangeRejected> {
        self.change_page(self.selection.pages().current_page() + 1)
    }

    pub fn previous_page(&mut self) -> Result<usize, PageChangeRejected> {
        let current = self.selection.pages().current_page();
        if current <= 1 {
            return Err(PageChangeRejected::BelowFirst);
        }
        self.change_page(current - 1)
    }

    // ---- Viewer ----

    /// Open the viewer on the grid selection. `Ok(None)` if nothing is selected.
    pub fn open_selected(&mut self) -> Result<Option<usize>> {
        match self.selection.selected_absolute() {
            Some(index) => self.open_viewer(index).map(Some),
            None => Ok(None),
        }
    }

    /// Open the viewer on an absolute index of the active view.
    pub fn open_viewer(&mut self, index: usize) -> Result<usize> {
        let index = self.viewer.open(index, self.view.len())?;
        self.discard_rotation();
        self.show_viewer(index);
        self.selection.follow(index, &self.view, &mut self.sink);
        Ok(index)
    }

    pub fn close_viewer(&mut self) {
        if !self.viewer.is_open() {
            return;
        }
        self.viewer.close();
        self.discard_rotation();
        self.sink.close_viewer();
    }

    /// Step or jump through the view; the grid follows the viewer.
    pub fn navigate_viewer(&mut self, direction: ViewerDirection) -> NavigateOutcome {
        let outcome = self.viewer.navigate(direction, self.view.len());
        if let NavigateOutcome::Moved { to, .. } = outcome {
            self.discard_rotation();
            self.show_viewer(to);
            self.selection.follow(to, &self.view, &mut self.sink);
        }
        outcome
    }

    /// Ask the backend whether the viewer's image is a favorite and show it.
    pub async fn sync_viewer_favorite(&mut self) {
        let Some(path) = self.current_record().map(|r| r.path.clone()) else {
            return;
        };
        match self.backend.check_favorited(&path).await {
            Ok(favorited) => {
                self.apply_favorite_state(&path, favorited);
            }
            Err(err) => warn!(?path, "Failed to check favorite state: {err:#}"),
        }
    }

    /// Show a favorite state if `path` is still the viewer's image.
    pub fn apply_favorite_state(&mut self, path: &Path, favorited: bool) -> bool {
        if self.current_record().map(|r| r.path.as_path()) != Some(path) {
            trace!(?path, "Ignoring favorite state for an image no longer shown");
            return false;
        }
        self.sink.render_favorite(path, favorited);
        true
    }

    fn show_viewer(&mut self, index: usize) {
        let Some(record) = self.view.get(index) else {
            return;
        };
        let record = match &self.rotation {
            Some(pending) if pending.original_path == record.path => record.with_url(&pending.url),
            _ => record.clone(),
        };
        self.sink.render_viewer(&record, index, self.view.len());
    }

    /// Keep the viewer on `path` after the view changed, or close it.
    fn repoint_viewer(&mut self, path: &Path) {
        if !self.viewer.is_open() {
            return;
        }
        match self.view.iter().position(|r| r.path == path) {
            Some(index) => {
                self.viewer.repoint(index);
                self.show_viewer(index);
            }
            None => self.close_viewer(),
        }
    }

    fn discard_rotation(&mut self) {
        if let Some(pending) = self.rotation.take() {
            debug!(
                path = ?pending.original_path,
                angle = pending.angle,
                "Discarding unsaved rotation"
            );
            self.backend.discard_rotation(&pending.temp_path);
        }
    }

    /// Rebuild the view after `path` left it and reconcile the viewer.
    ///
    /// Must run while `self.view` still holds the record.
    fn remove_from_view(&mut self, path: &Path) {
        let old_len = self.view.len();
        let viewed = self
            .viewer
            .current_index()
            .and_then(|i| self.view.get(i).map(|r| (i, r.path.clone())));

        self.rebuild_view();

        match viewed {
            Some((index, viewed_path)) if viewed_path == path => {
                self.discard_rotation();
                let class = PositionClass::of(index, old_len);
                match self
                    .viewer
                    .reconcile_removed_current(class, index, self.view.len())
                {
                    ViewerState::Open { index } => self.show_viewer(index),
                    ViewerState::Closed => self.sink.close_viewer(),
                }
            }
            Some((_, viewed_path)) => self.repoint_viewer(&viewed_path),
            None => {}
        }

        self.refresh(RefreshKind::Shrink);
        self.follow_viewer();
    }

    // ---- Mutations ----

    pub fn begin_mutation(&self, path: &Path) -> MutationTicket {
        MutationTicket {
            generation: self.generation,
            path: path.to_path_buf(),
        }
    }

    fn is_live(&self, ticket: &MutationTicket) -> bool {
        if ticket.generation != self.generation {
            debug!(path = ?ticket.path, "Discarding completion from an earlier load");
            return false;
        }
        true
    }

    fn report_failure(
        &mut self,
        action: MutationAction,
        path: &Path,
        err: &anyhow::Error,
    ) -> GalleryError {
        let error = GalleryError::mutation(action, path, err);
        warn!(%error, "Mutation failed");
        self.sink.render_message(&format!("Error: {error}"));
        error
    }

    /// Delete the viewer's image, or the grid selection.
    pub async fn delete_target(&mut self) -> Result<bool> {
        match self.target_record().map(|r| r.path.clone()) {
            Some(path) => self.delete_image(&path).await,
            None => Ok(false),
        }
    }

    pub async fn delete_image(&mut self, path: &Path) -> Result<bool> {
        let ticket = self.begin_mutation(path);
        if let Err(err) = self.backend.delete_image(path).await {
            return Err(self.report_failure(MutationAction::Delete, path, &err));
        }
        Ok(self.complete_delete(&ticket))
    }

    /// Remove a deleted image. Returns false if it was already gone.
    pub fn complete_delete(&mut self, ticket: &MutationTicket) -> bool {
        if !self.is_live(ticket) {
            return false;
        }
        let removal = self.store.remove(&ticket.path);
        if !removal.removed {
            debug!(path = ?ticket.path, "Deleted image already absent");
            return false;
        }
        self.favorites.remove(&ticket.path);
        if let Some(directory) = &self.directory {
            self.cache.remove_image(directory, &ticket.path);
        }
        self.remove_from_view(&ticket.path);

        info!(path = ?ticket.path, remaining = removal.new_length, "Image deleted");
        self.sink
            .render_message(&format!("Deleted: {}", display_name(&ticket.path)));
        true
    }

    /// Toggle the favorite flag of the viewer's image, or the grid selection.
    pub async fn toggle_favorite_target(&mut self) -> Result<Option<bool>> {
        match self.target_record().map(|r| r.path.clone()) {
            Some(path) => self.toggle_favorite(&path).await.map(Some),
            None => Ok(None),
        }
    }

    /// Returns the new favorite state.
    pub async fn toggle_favorite(&mut self, path: &Path) -> Result<bool> {
        let ticket = self.begin_mutation(path);
        let toggle = match self.backend.toggle_favorite(path).await {
            Ok(toggle) => toggle,
            Err(err) => return Err(self.report_failure(MutationAction::Favorite, path, &err)),
        };
        let favorited = !toggle.was_favorited;
        self.complete_favorite(&ticket, favorited);
        Ok(favorited)
    }

    /// Apply a toggled favorite state. An unfavorited image leaves a
    /// favorites-only view exactly like a deleted one.
    pub fn complete_favorite(&mut self, ticket: &MutationTicket, favorited: bool) -> bool {
        if !self.is_live(ticket) || self.store.index_of(&ticket.path).is_none() {
            return false;
        }
        if favorited {
            self.favorites.insert(ticket.path.clone());
        } else {
            self.favorites.remove(&ticket.path);
        }
        self.sink.render_favorite(&ticket.path, favorited);

        let name = display_name(&ticket.path);
        let message = if favorited {
            format!("Favorited: {name}")
        } else {
            format!("Unfavorited: {name}")
        };
        self.sink.render_message(&message);

        let in_view = self.view.iter().any(|r| r.path == ticket.path);
        if self.filter == ViewFilter::FavoritesOnly && !favorited && in_view {
            self.remove_from_view(&ticket.path);
        }
        true
    }

    /// Rotate the viewer's image by a quarter turn. Rotations accumulate on
    /// the pending copy until saved or discarded.
    pub async fn rotate(&mut self, direction: RotateDirection) -> Result<bool> {
        let Some(path) = self.current_record().map(|r| r.path.clone()) else {
            debug!("Rotate ignored with the viewer closed");
            return Ok(false);
        };
        let source = match &self.rotation {
            Some(pending) if pending.original_path == path => pending.temp_path.clone(),
            _ => path.clone(),
        };
        let ticket = self.begin_mutation(&path);
        let rotated = match self.backend.rotate(&source, direction).await {
            Ok(rotated) => rotated,
            Err(err) => return Err(self.report_failure(MutationAction::Rotate, &path, &err)),
        };
        Ok(self.complete_rotate(&ticket, direction, rotated))
    }

    pub fn complete_rotate(
        &mut self,
        ticket: &MutationTicket,
        direction: RotateDirection,
        rotated: RotatedImage,
    ) -> bool {
        if !self.is_live(ticket) {
            return false;
        }
        if self.current_record().map(|r| r.path.as_path()) != Some(ticket.path.as_path()) {
            debug!(path = ?ticket.path, "Dropping rotation for an image no longer shown");
            return false;
        }
        let previous = match self.rotation.take() {
            Some(pending) if pending.original_path == ticket.path => {
                self.backend.discard_rotation(&pending.temp_path);
                pending.angle
            }
            Some(stale) => {
                self.backend.discard_rotation(&stale.temp_path);
                0
            }
            None => 0,
        };
        let angle = (previous + direction.degrees()).rem_euclid(360);
        debug!(path = ?ticket.path, angle, "Image rotated");
        self.rotation = Some(PendingRotation {
            original_path: ticket.path.clone(),
            temp_path: rotated.temp_path,
            url: rotated.url,
            angle,
        });
        if let Some(index) = self.viewer.current_index() {
            self.show_viewer(index);
        }
        true
    }

    /// Commit the pending rotation. `Ok(false)` if there is none.
    pub async fn save_rotation(&mut self) -> Result<bool> {
        let Some(pending) = self.rotation.clone() else {
            return Ok(false);
        };
        let ticket = self.begin_mutation(&pending.original_path);
        let record = match self
            .backend
            .save_rotation(&pending.temp_path, &pending.original_path)
            .await
        {
            Ok(record) => record,
            Err(err) => {
                return Err(self.report_failure(
                    MutationAction::SaveRotation,
                    &pending.original_path,
                    &err,
                ))
            }
        };
        Ok(self.complete_save(&ticket, record))
    }

    /// Swap in the saved record at the same position.
    pub fn complete_save(&mut self, ticket: &MutationTicket, record: ImageRecord) -> bool {
        if !self.is_live(ticket) {
            return false;
        }
        if self
            .rotation
            .as_ref()
            .is_some_and(|p| p.original_path == ticket.path)
        {
            self.rotation = None;
        }
        if !self.store.replace(&ticket.path, record.clone()) {
            return false;
        }
        if self.favorites.remove(&ticket.path) {
            self.favorites.insert(record.path.clone());
        }
        if let Some(directory) = &self.directory {
            self.cache.replace_image(directory, &ticket.path, &record);
        }

        let viewed = self.current_record().map(|r| r.path.clone());
        self.rebuild_view();
        self.refresh(RefreshKind::Rebuild);
        match viewed {
            Some(path) if path == ticket.path => self.repoint_viewer(&record.path),
            Some(path) => self.repoint_viewer(&path),
            None => {}
        }
        self.follow_viewer();

        info!(path = ?record.path, "Rotation saved");
        self.sink
            .render_message(&format!("Saved rotation: {}", record.name));
        true
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCategory;
    use crate::ports::FavoriteToggle;
    use crate::session::sync::tests::RecordingSink;
    use std::cell::{Cell, RefCell};
    use std::collections::HashMap;
    use std::time::Duration;

    const DIR: &str = "/photos";

    #[derive(Default)]
    struct FakeBackend {
        listings: HashMap<PathBuf, Vec<ImageRecord>>,
        favorites: RefCell<HashSet<PathBuf>>,
        fetches: Cell<usize>,
        fail_loads: Cell<bool>,
        fail_mutations: Cell<bool>,
        fail_checks: Cell<bool>,
        rotate_sources: RefCell<Vec<PathBuf>>,
    }

    impl ImageSource for FakeBackend {
        async fn fetch_images(&self, directory: &Path) -> anyhow::Result<Vec<ImageRecord>> {
            self.fetches.set(self.fetches.get() + 1);
            if self.fail_loads.get() {
                anyhow::bail!("connection refused");
            }
            Ok(self.listings.get(directory).cloned().unwrap_or_default())
        }

        async fn list_directories(&self, directory: &Path) -> anyhow::Result<Vec<PathBuf>> {
            self.fetches.set(self.fetches.get() + 1);
            Ok(vec![directory.join("holiday")])
        }
    }

    impl MutationService for FakeBackend {
        async fn delete_image(&self, _path: &Path) -> anyhow::Result<()> {
            if self.fail_mutations.get() {
                anyhow::bail!("permission denied");
            }
            Ok(())
        }

        async fn toggle_favorite(&self, path: &Path) -> anyhow::Result<FavoriteToggle> {
            if self.fail_mutations.get() {
                anyhow::bail!("database is locked");
            }
            let mut favorites = self.favorites.borrow_mut();
            let was_favorited = !favorites.insert(path.to_path_buf());
            if was_favorited {
                favorites.remove(path);
            }
            Ok(FavoriteToggle { was_favorited })
        }

        async fn check_favorited(&self, path: &Path) -> anyhow::Result<bool> {
            if self.fail_checks.get() {
                anyhow::bail!("favorites table unavailable");
            }
            Ok(self.favorites.borrow().contains(path))
        }

        async fn rotate(
            &self,
            path: &Path,
            _direction: RotateDirection,
        ) -> anyhow::Result<RotatedImage> {
            let mut sources = self.rotate_sources.borrow_mut();
            sources.push(path.to_path_buf());
            let n = sources.len();
            Ok(RotatedImage {
                temp_path: PathBuf::from(format!("/tmp/rotated-{n}.jpg")),
                url: format!("/temp/rotated-{n}.jpg"),
            })
        }

        async fn save_rotation(
            &self,
            _temp_path: &Path,
            original_path: &Path,
        ) -> anyhow::Result<ImageRecord> {
            let name = display_name(original_path);
            Ok(ImageRecord::new(
                original_path,
                format!("/image/{name}?v=1"),
                0,
            ))
        }
    }

    /// Records named img00, img01, ... in date-desc order.
    fn records(count: usize) -> Vec<ImageRecord> {
        (0..count)
            .map(|i| {
                ImageRecord::new(
                    format!("{DIR}/img{i:02}.jpg"),
                    format!("/image/img{i:02}.jpg"),
                    (count - i) as i64,
                )
            })
            .collect()
    }

    fn path(i: usize) -> PathBuf {
        PathBuf::from(format!("{DIR}/img{i:02}.jpg"))
    }

    fn backend(count: usize) -> FakeBackend {
        let mut backend = FakeBackend::default();
        backend.listings.insert(PathBuf::from(DIR), records(count));
        backend
    }

    fn config(page_size: usize) -> GalleryConfig {
        GalleryConfig {
            page_size,
            navigation_cooldown: Duration::ZERO,
            ..Default::default()
        }
    }

    async fn loaded(count: usize, page_size: usize) -> Gallery<FakeBackend, RecordingSink> {
        loaded_with(backend(count), config(page_size)).await
    }

    async fn loaded_with(
        backend: FakeBackend,
        config: GalleryConfig,
    ) -> Gallery<FakeBackend, RecordingSink> {
        let mut gallery = Gallery::new(&config, backend, RecordingSink::with_columns(5));
        gallery.load_directory(Path::new(DIR)).await.unwrap();
        gallery
    }

    fn names<B, R>(gallery: &Gallery<B, R>) -> Vec<&str>
    where
        B: ImageSource + MutationService,
        R: RenderSink,
    {
        gallery.view().iter().map(|r| r.name.as_str()).collect()
    }

    #[tokio::test]
    async fn test_load_renders_first_page() {
        let gallery = loaded(23, 10).await;
        assert_eq!(gallery.view().len(), 23);
        assert_eq!(gallery.sink().last_page().len(), 10);
        assert_eq!(gallery.sink().last_page()[0], "img00.jpg");
        assert_eq!(
            gallery.status(),
            PaginationStatus::Range {
                start: 1,
                end: 10,
                total: 23
            }
        );
    }

    #[tokio::test]
    async fn test_load_failure_shows_empty_state() {
        let backend = backend(3);
        backend.fail_loads.set(true);
        let mut gallery = Gallery::new(&config(10), backend, RecordingSink::default());

        let err = gallery.load_directory(Path::new(DIR)).await.unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Load);
        assert!(gallery.view().is_empty());
        match gallery.sink().empty.last() {
            Some(EmptyReason::LoadFailed(message)) => assert!(message.contains("connection refused")),
            other => panic!("unexpected empty state {other:?}"),
        }
        assert_eq!(gallery.sink().last_status(), Some(PaginationStatus::Empty));
    }

    #[tokio::test]
    async fn test_stale_load_is_discarded() {
        let mut gallery = Gallery::new(&config(10), backend(0), RecordingSink::default());
        let first = gallery.begin_load(Path::new("/first"));
        let second = gallery.begin_load(Path::new("/second"));

        assert_eq!(gallery.complete_load(first, Ok(records(3))).unwrap(), None);
        assert!(gallery.view().is_empty());

        let report = gallery.complete_load(second, Ok(records(2))).unwrap();
        assert_eq!(report.map(|r| r.kept), Some(2));
        assert_eq!(gallery.directory(), Some(Path::new("/second")));
    }

    #[tokio::test]
    async fn test_cached_directory_skips_fetch() {
        let mut gallery = loaded(4, 10).await;
        gallery.load_directory(Path::new(DIR)).await.unwrap();
        assert_eq!(gallery.backend().fetches.get(), 1);

        let children = gallery.subdirectories(Path::new(DIR)).await.unwrap();
        gallery.subdirectories(Path::new(DIR)).await.unwrap();
        assert_eq!(children, vec![PathBuf::from("/photos/holiday")]);
        assert_eq!(gallery.backend().fetches.get(), 2);

        gallery.on_directories_changed();
        gallery.load_directory(Path::new(DIR)).await.unwrap();
        assert_eq!(gallery.backend().fetches.get(), 3);
    }

    #[tokio::test]
    async fn test_delete_viewed_image_by_position() {
        // (opened index, expected image, expected index)
        let cases = [(0, "img01.jpg", 0), (2, "img03.jpg", 2), (4, "img03.jpg", 3)];
        for (opened, expected, index) in cases {
            let mut gallery = loaded(5, 10).await;
            gallery.open_viewer(opened).unwrap();

            assert!(gallery.delete_target().await.unwrap());
            assert_eq!(gallery.view().len(), 4);
            assert_eq!(gallery.viewer().current_index(), Some(index));
            assert_eq!(
                gallery.sink().viewer,
                Some((expected.to_string(), index, 4))
            );
        }
    }

    #[tokio::test]
    async fn test_delete_only_image_closes_viewer() {
        let mut gallery = loaded(1, 10).await;
        gallery.open_viewer(0).unwrap();

        assert!(gallery.delete_target().await.unwrap());
        assert!(!gallery.viewer().is_open());
        assert_eq!(gallery.sink().viewer, None);
        assert_eq!(gallery.sink().empty.last(), Some(&EmptyReason::NoImages));
        assert_eq!(gallery.sink().last_status(), Some(PaginationStatus::Empty));
        assert_eq!(gallery.sink().messages.last().unwrap(), "Deleted: img00.jpg");
    }

    #[tokio::test]
    async fn test_delete_from_last_page_clamps_page() {
        let mut gallery = loaded(21, 10).await;
        gallery.change_page(3).unwrap();
        gallery.select(0);

        assert!(gallery.delete_target().await.unwrap());
        assert_eq!(gallery.selection().pages().current_page(), 2);
        assert_eq!(gallery.sink().last_page().len(), 10);
    }

    #[tokio::test]
    async fn test_failed_delete_leaves_state_unchanged() {
        let backend = backend(5);
        backend.fail_mutations.set(true);
        let mut gallery = loaded_with(backend, config(10)).await;
        gallery.open_viewer(2).unwrap();

        let err = gallery.delete_target().await.unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Mutation);
        assert_eq!(gallery.view().len(), 5);
        assert_eq!(gallery.viewer().current_index(), Some(2));
        assert!(gallery
            .sink()
            .messages
            .last()
            .unwrap()
            .contains("permission denied"));
    }

    #[tokio::test]
    async fn test_stale_delete_completion_is_ignored() {
        let mut gallery = loaded(5, 10).await;
        let ticket = gallery.begin_mutation(&path(1));
        gallery.load_directory(Path::new(DIR)).await.unwrap();

        assert!(!gallery.complete_delete(&ticket));
        assert_eq!(gallery.view().len(), 5);
    }

    #[tokio::test]
    async fn test_rapid_viewer_navigation_is_rejected() {
        let config = GalleryConfig {
            navigation_cooldown: Duration::from_secs(5),
            ..config(10)
        };
        let mut gallery = loaded_with(backend(5), config).await;
        gallery.open_viewer(0).unwrap();

        assert_eq!(
            gallery.navigate_viewer(ViewerDirection::Next),
            NavigateOutcome::Moved { from: 0, to: 1 }
        );
        assert_eq!(
            gallery.navigate_viewer(ViewerDirection::Next),
            NavigateOutcome::Busy
        );
        assert_eq!(gallery.viewer().current_index(), Some(1));
    }

    #[tokio::test]
    async fn test_grid_follows_viewer_across_pages() {
        let mut gallery = loaded(23, 10).await;
        gallery.open_viewer(9).unwrap();
        gallery.navigate_viewer(ViewerDirection::Next);

        assert_eq!(gallery.selection().pages().current_page(), 2);
        assert_eq!(gallery.selection().selected(), Some(0));
        assert_eq!(gallery.sink().viewer_name(), Some("img10.jpg"));

        gallery.navigate_viewer(ViewerDirection::Last);
        assert_eq!(gallery.selection().pages().current_page(), 3);
        assert_eq!(gallery.selection().selected_absolute(), Some(22));
    }

    #[tokio::test]
    async fn test_grid_keys_cross_pages() {
        let mut gallery = loaded(23, 10).await;

        assert_eq!(
            gallery.handle_grid_key(NavKey::Right),
            Some(NavigationResult::Stay { new_index: 0 })
        );
        assert_eq!(gallery.selection().selected(), Some(0));

        gallery.select(9);
        assert_eq!(
            gallery.handle_grid_key(NavKey::Right),
            Some(NavigationResult::CrossPage {
                target_page: 2,
                target_index: 0
            })
        );
        assert_eq!(gallery.selection().selected_absolute(), Some(10));

        gallery.handle_grid_key(NavKey::Left);
        assert_eq!(gallery.selection().pages().current_page(), 1);
        assert_eq!(gallery.selection().selected(), Some(9));
    }

    #[tokio::test]
    async fn test_open_out_of_range_is_index_error() {
        let mut gallery = loaded(3, 10).await;
        let err = gallery.open_viewer(3).unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Index);
        assert!(!gallery.viewer().is_open());
        assert_eq!(gallery.open_selected().unwrap(), None);
    }

    #[tokio::test]
    async fn test_page_size_and_sort_reset_to_first_page() {
        let mut gallery = loaded(23, 10).await;
        gallery.change_page(3).unwrap();

        gallery.set_page_size(5);
        assert_eq!(gallery.selection().pages().current_page(), 1);
        assert_eq!(gallery.selection().pages().total_pages(), 5);

        gallery.change_page(2).unwrap();
        gallery.set_sort(SortMethod::NameDesc);
        assert_eq!(gallery.selection().pages().current_page(), 1);
        assert_eq!(names(&gallery)[0], "img22.jpg");
    }

    #[tokio::test]
    async fn test_favorites_filter_and_unfavorite() {
        let backend = backend(5);
        backend.favorites.borrow_mut().extend([path(1), path(3)]);
        let mut gallery = loaded_with(backend, config(10)).await;

        gallery.set_filter(ViewFilter::FavoritesOnly).await.unwrap();
        assert_eq!(names(&gallery), ["img01.jpg", "img03.jpg"]);

        gallery.open_viewer(0).unwrap();
        assert_eq!(gallery.toggle_favorite_target().await.unwrap(), Some(false));
        assert_eq!(names(&gallery), ["img03.jpg"]);
        assert_eq!(gallery.sink().viewer_name(), Some("img03.jpg"));

        gallery.toggle_favorite_target().await.unwrap();
        assert!(gallery.view().is_empty());
        assert!(!gallery.viewer().is_open());
        assert_eq!(gallery.sink().empty.last(), Some(&EmptyReason::NoFavorites));

        gallery.set_filter(ViewFilter::All).await.unwrap();
        assert_eq!(gallery.view().len(), 5);
    }

    #[tokio::test]
    async fn test_delete_in_favorites_view_uses_filtered_positions() {
        let backend = backend(5);
        backend.favorites.borrow_mut().extend([path(1), path(3), path(4)]);
        let mut gallery = loaded_with(backend, config(10)).await;
        gallery.set_filter(ViewFilter::FavoritesOnly).await.unwrap();

        // img03 sits in the middle of the filtered view
        gallery.open_viewer(1).unwrap();
        assert!(gallery.delete_target().await.unwrap());
        assert_eq!(names(&gallery), ["img01.jpg", "img04.jpg"]);
        assert_eq!(gallery.viewer().current_index(), Some(1));
        assert_eq!(gallery.sink().viewer_name(), Some("img04.jpg"));
        assert_eq!(gallery.selection().selected_absolute(), Some(1));
        assert_eq!(gallery.store().records().len(), 4);

        // img04 is now last
        assert!(gallery.delete_target().await.unwrap());
        assert_eq!(names(&gallery), ["img01.jpg"]);
        assert_eq!(gallery.viewer().current_index(), Some(0));
        assert_eq!(gallery.sink().viewer_name(), Some("img01.jpg"));
        assert_eq!(gallery.store().records().len(), 3);
    }

    #[tokio::test]
    async fn test_reload_keeps_favorites_filter() {
        let backend = backend(5);
        backend.favorites.borrow_mut().insert(path(2));
        let mut gallery = loaded_with(backend, config(10)).await;
        gallery.set_filter(ViewFilter::FavoritesOnly).await.unwrap();

        gallery.load_directory(Path::new(DIR)).await.unwrap();
        assert_eq!(gallery.filter(), ViewFilter::FavoritesOnly);
        assert_eq!(names(&gallery), ["img02.jpg"]);
    }

    #[tokio::test]
    async fn test_reload_drops_filter_when_favorites_unreadable() {
        let backend = backend(5);
        backend.favorites.borrow_mut().insert(path(2));
        let mut gallery = loaded_with(backend, config(10)).await;
        gallery.set_filter(ViewFilter::FavoritesOnly).await.unwrap();

        gallery.backend().fail_checks.set(true);
        gallery.load_directory(Path::new(DIR)).await.unwrap();
        assert_eq!(gallery.filter(), ViewFilter::All);
        assert_eq!(gallery.view().len(), 5);
        assert!(gallery
            .sink()
            .messages
            .iter()
            .any(|m| m == "Could not read favorites, showing all images"));

        let err = gallery.set_filter(ViewFilter::FavoritesOnly).await.unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Mutation);
        assert_eq!(gallery.filter(), ViewFilter::All);
        assert_eq!(gallery.view().len(), 5);
    }

    #[tokio::test]
    async fn test_grid_follows_viewer_after_sort_change() {
        let mut gallery = loaded(23, 10).await;
        gallery.open_viewer(22).unwrap();

        gallery.set_sort(SortMethod::DateAsc);
        assert_eq!(gallery.viewer().current_index(), Some(0));
        assert_eq!(gallery.sink().viewer_name(), Some("img22.jpg"));
        assert_eq!(gallery.selection().pages().current_page(), 1);
        assert_eq!(gallery.selection().selected_absolute(), Some(0));

        gallery.navigate_viewer(ViewerDirection::Last);
        gallery.set_sort(SortMethod::DateDesc);
        assert_eq!(gallery.current_record().unwrap().name, "img00.jpg");
        assert_eq!(gallery.selection().pages().current_page(), 1);
        assert_eq!(gallery.selection().selected_absolute(), Some(0));

        gallery.set_sort(SortMethod::DateAsc);
        assert_eq!(gallery.viewer().current_index(), Some(22));
        assert_eq!(gallery.selection().pages().current_page(), 3);
        assert_eq!(gallery.selection().selected(), Some(2));
    }

    #[tokio::test]
    async fn test_grid_follows_viewer_after_filter_change() {
        let backend = backend(5);
        backend.favorites.borrow_mut().extend([path(1), path(3)]);
        let mut gallery = loaded_with(backend, config(10)).await;
        gallery.open_viewer(3).unwrap();

        gallery.set_filter(ViewFilter::FavoritesOnly).await.unwrap();
        assert_eq!(gallery.viewer().current_index(), Some(1));
        assert_eq!(gallery.selection().selected_absolute(), Some(1));
    }

    #[tokio::test]
    async fn test_favorite_state_ignored_after_navigation() {
        let mut gallery = loaded(3, 10).await;
        gallery.open_viewer(0).unwrap();
        gallery.sync_viewer_favorite().await;
        assert_eq!(
            gallery.sink().favorites,
            vec![(path(0).to_string_lossy().into_owned(), false)]
        );

        gallery.navigate_viewer(ViewerDirection::Next);
        assert!(!gallery.apply_favorite_state(&path(0), true));
        assert_eq!(gallery.sink().favorites.len(), 1);
    }

    #[tokio::test]
    async fn test_rotations_accumulate_then_save_in_place() {
        let mut gallery = loaded(5, 10).await;
        gallery.open_viewer(2).unwrap();

        assert!(gallery.rotate(RotateDirection::Clockwise).await.unwrap());
        assert!(gallery.rotate(RotateDirection::Clockwise).await.unwrap());
        let pending = gallery.pending_rotation().unwrap();
        assert_eq!(pending.angle, 180);
        assert_eq!(
            *gallery.backend().rotate_sources.borrow(),
            vec![path(2), PathBuf::from("/tmp/rotated-1.jpg")]
        );

        gallery.rotate(RotateDirection::CounterClockwise).await.unwrap();
        assert_eq!(gallery.pending_rotation().unwrap().angle, 90);

        assert!(gallery.save_rotation().await.unwrap());
        assert!(gallery.pending_rotation().is_none());
        assert_eq!(gallery.view().len(), 5);
        assert_eq!(gallery.view()[2].url, "/image/img02.jpg?v=1");
        assert_eq!(gallery.viewer().current_index(), Some(2));
        assert!(!gallery.save_rotation().await.unwrap());
    }

    #[tokio::test]
    async fn test_navigation_discards_pending_rotation() {
        let mut gallery = loaded(5, 10).await;
        gallery.open_viewer(1).unwrap();
        gallery.rotate(RotateDirection::Clockwise).await.unwrap();

        gallery.navigate_viewer(ViewerDirection::Next);
        assert!(gallery.pending_rotation().is_none());

        gallery.rotate(RotateDirection::Clockwise).await.unwrap();
        gallery.close_viewer();
        assert!(gallery.pending_rotation().is_none());
        assert!(!gallery.rotate(RotateDirection::Clockwise).await.unwrap());
    }
}
