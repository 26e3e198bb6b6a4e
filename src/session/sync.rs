//! Keeps the grid page, the grid selection and the pagination status in step
//! with the active view after every page change or mutation.

use std::fmt;

use tracing::{debug, trace};

use crate::collection::paginator::{to_absolute, to_relative};
use crate::collection::{PageChangeRejected, PageState};
use crate::models::ImageRecord;
use crate::ports::{EmptyReason, RenderSink};

/// Pagination status line parameters, 1-based and inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaginationStatus {
    Empty,
    Range {
        start: usize,
        end: usize,
        total: usize,
    },
}

impl PaginationStatus {
    pub fn for_pages(pages: &PageState) -> Self {
        let total = pages.length();
        if total == 0 {
            return Self::Empty;
        }
        let start = (pages.current_page() - 1) * pages.page_size() + 1;
        let end = (start + pages.page_size() - 1).min(total);
        Self::Range { start, end, total }
    }
}

impl fmt::Display for PaginationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => f.write_str("No images"),
            Self::Range { start, end, total } => {
                write!(f, "Showing {start}-{end} of {total} images")
            }
        }
    }
}

/// How the page state reacts to a changed view length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshKind {
    /// The view was rebuilt; a vanished page resets to page 1.
    Rebuild,
    /// Records were removed; a vanished page clamps to the last page.
    Shrink,
}

#[derive(Debug, Clone)]
pub struct SelectionSync {
    pages: PageState,
    selected: Option<usize>,
    rendered: usize,
}

impl SelectionSync {
    pub fn new(page_size: usize) -> Self {
        Self {
            pages: PageState::new(page_size),
            selected: None,
            rendered: 0,
        }
    }

    pub fn pages(&self) -> &PageState {
        &self.pages
    }

    /// Highlighted index within the rendered page.
    pub fn selected(&self) -> Option<usize> {
        self.selected
    }

    /// Highlighted index within the active view.
    pub fn selected_absolute(&self) -> Option<usize> {
        self.selected
            .map(|rel| to_absolute(self.pages.current_page(), rel, self.pages.page_size()))
    }

    pub fn set_page_size(&mut self, page_size: usize) {
        self.pages.set_page_size(page_size);
        self.selected = None;
    }

    /// Back to page 1 with no selection, ahead of a rebuild.
    pub fn reset(&mut self) {
        self.pages.reset();
        self.selected = None;
    }

    /// Recompute pages for `view`, redraw the current page and the status.
    pub fn refresh<R: RenderSink>(
        &mut self,
        view: &[ImageRecord],
        kind: RefreshKind,
        empty_reason: EmptyReason,
        sink: &mut R,
    ) -> PaginationStatus {
        match kind {
            RefreshKind::Rebuild => self.pages.rebuild(view.len()),
            RefreshKind::Shrink => self.pages.shrink(view.len()),
        }

        if view.is_empty() {
            self.selected = None;
            self.rendered = 0;
            sink.render_empty_state(empty_reason);
        } else {
            self.render_current(view, self.selected, sink);
        }

        let status = PaginationStatus::for_pages(&self.pages);
        sink.render_pagination_status(status);
        trace!(%status, page = self.pages.current_page(), "Grid refreshed");
        status
    }

    /// Switch to `page` and select `target` there (clamped to what rendered).
    pub fn show_page<R: RenderSink>(
        &mut self,
        page: usize,
        target: Option<usize>,
        view: &[ImageRecord],
        sink: &mut R,
    ) -> Result<usize, PageChangeRejected> {
        let page = self.pages.change_page(page).inspect_err(|reason| {
            debug!(%reason, "Page change rejected");
        })?;
        self.render_current(view, target, sink);
        sink.render_pagination_status(PaginationStatus::for_pages(&self.pages));
        Ok(page)
    }

    /// Highlight `index` on the rendered page. Out-of-range indices are ignored.
    pub fn select<R: RenderSink>(&mut self, index: usize, sink: &mut R) -> bool {
        if index >= self.rendered {
            return false;
        }
        if self.selected != Some(index) {
            self.selected = Some(index);
            sink.render_selection(self.selected);
        }
        true
    }

    /// Bring the grid to the page holding `absolute` and highlight it.
    pub fn follow<R: RenderSink>(&mut self, absolute: usize, view: &[ImageRecord], sink: &mut R) {
        if absolute >= view.len() {
            return;
        }
        let (page, relative) = to_relative(absolute, self.pages.page_size());
        if page != self.pages.current_page() {
            let _ = self.show_page(page, Some(relative), view, sink);
        } else {
            self.select(relative, sink);
        }
    }

    fn render_current<R: RenderSink>(
        &mut self,
        view: &[ImageRecord],
        target: Option<usize>,
        sink: &mut R,
    ) {
        let (start, end) = self.pages.bounds();
        let items = &view[start..end];
        let wanted = target.map(|t| t.min(items.len().saturating_sub(1)));
        let ack = sink.render_page(items, wanted);

        self.rendered = ack.item_count;
        self.selected = match wanted {
            Some(index) if ack.item_count > 0 => Some(index.min(ack.item_count - 1)),
            _ => None,
        };
        if self.selected != wanted {
            sink.render_selection(self.selected);
        }
    }
}
