//! Page arithmetic over the active view.
//!
//! Pages are 1-based, indices are 0-based. A page-relative index addresses
//! the currently rendered page; an absolute index addresses the view.

use thiserror::Error;
use tracing::debug;

/// Why `change_page` refused a request. Rejection is a no-op for callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PageChangeRejected {
    #[error("page must be at least 1")]
    BelowFirst,
    #[error("page {requested} is beyond the last page {total}")]
    BeyondLast { requested: usize, total: usize },
    #[error("already on page {0}")]
    AlreadyCurrent(usize),
}

/// `ceil(length / page_size)`, never less than 1.
pub fn total_pages(length: usize, page_size: usize) -> usize {
    let page_size = page_size.max(1);
    length.div_ceil(page_size).max(1)
}

/// Clamp `requested` into `[1, total_pages]`.
pub fn clamp_page(requested: usize, total_pages: usize) -> usize {
    requested.clamp(1, total_pages.max(1))
}

/// Half-open index range `[start, end)` covered by `page`.
pub fn page_bounds(page: usize, page_size: usize, length: usize) -> (usize, usize) {
    let page_size = page_size.max(1);
    let start = page.saturating_sub(1).saturating_mul(page_size).min(length);
    let end = start.saturating_add(page_size).min(length);
    (start, end)
}

pub fn to_absolute(page: usize, relative_index: usize, page_size: usize) -> usize {
    page.saturating_sub(1) * page_size.max(1) + relative_index
}

/// Split an absolute index into `(page, relative_index)`.
pub fn to_relative(absolute_index: usize, page_size: usize) -> (usize, usize) {
    let page_size = page_size.max(1);
    (absolute_index / page_size + 1, absolute_index % page_size)
}

/// Validate a page change. Rejects out-of-range pages and the current page.
pub fn change_page(
    requested: usize,
    current: usize,
    total_pages: usize,
) -> Result<usize, PageChangeRejected> {
    if requested < 1 {
        return Err(PageChangeRejected::BelowFirst);
    }
    if requested > total_pages {
        return Err(PageChangeRejected::BeyondLast {
            requested,
            total: total_pages,
        });
    }
    if requested == current {
        return Err(PageChangeRejected::AlreadyCurrent(current));
    }
    Ok(requested)
}

/// Pagination state for the active view.
///
/// Invariant: `1 <= current_page <= total_pages`, with `total_pages >= 1`
/// even for an empty view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageState {
    page_size: usize,
    current_page: usize,
    total_pages: usize,
    length: usize,
}

impl PageState {
    pub fn new(page_size: usize) -> Self {
        Self {
            page_size: page_size.max(1),
            current_page: 1,
            total_pages: 1,
            length: 0,
        }
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn current_page(&self) -> usize {
        self.current_page
    }

    pub fn total_pages(&self) -> usize {
        self.total_pages
    }

    pub fn length(&self) -> usize {
        self.length
    }

    pub fn has_previous(&self) -> bool {
        self.current_page > 1
    }

    pub fn has_next(&self) -> bool {
        self.current_page < self.total_pages
    }

    /// Recompute after the view was rebuilt (load, sort, filter, page size).
    /// A page that no longer exists resets to the first page.
    pub fn rebuild(&mut self, length: usize) {
        self.length = length;
        self.total_pages = total_pages(length, self.page_size);
        if self.current_page > self.total_pages {
            debug!(
                stale = self.current_page,
                total = self.total_pages,
                "Current page out of range after rebuild, resetting to first page"
            );
            self.current_page = 1;
        }
    }

    /// Recompute after records were removed from the view.
    /// A page that no longer exists clamps to the new last page.
    pub fn shrink(&mut self, length: usize) {
        self.length = length;
        self.total_pages = total_pages(length, self.page_size);
        self.current_page = clamp_page(self.current_page, self.total_pages);
    }

    /// Change the page size and go back to the first page.
    pub fn set_page_size(&mut self, page_size: usize) {
        self.page_size = page_size.max(1);
        self.current_page = 1;
        self.rebuild(self.length);
    }

    pub fn reset(&mut self) {
        self.current_page = 1;
    }

    /// Apply `change_page`; on success the current page moves.
    pub fn change_page(&mut self, requested: usize) -> Result<usize, PageChangeRejected> {
        let page = change_page(requested, self.current_page, self.total_pages)?;
        self.current_page = page;
        Ok(page)
    }

    /// Index range of the current page.
    pub fn bounds(&self) -> (usize, usize) {
        page_bounds(self.current_page, self.page_size, self.length)
    }

    /// Number of items on `page`.
    pub fn items_on(&self, page: usize) -> usize {
        let (start, end) = page_bounds(page, self.page_size, self.length);
        end - start
    }

    pub fn items_on_current(&self) -> usize {
        self.items_on(self.current_page)
    }
}
