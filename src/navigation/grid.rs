// Grid navigation for the paginated image view
// Computes the next selection for arrow/page/home/end keys on a row-major
// grid, crossing page boundaries when the move leaves the rendered page.

use tracing::trace;

use crate::collection::PageState;

/// Navigation key for grid movement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavKey {
    Left,
    Right,
    Up,
    Down,
    PageUp,
    PageDown,
    Home,
    End,
}

/// Where a grid move lands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigationResult {
    /// Same page; `new_index` equals the old index when the move was blocked
    Stay { new_index: usize },
    /// Different page, already clamped to that page's item count
    CrossPage {
        target_page: usize,
        target_index: usize,
    },
}

impl NavigationResult {
    pub fn is_noop(&self, index: usize) -> bool {
        matches!(self, Self::Stay { new_index } if *new_index == index)
    }
}

/// Row-major grid navigator for one rendered page
#[derive(Debug, Clone, Copy)]
pub struct GridNavigator {
    columns: usize,
}

impl GridNavigator {
    /// `columns` of 0 means the layout is unknown; callers recompute before
    /// navigating, so it is treated as a single column here.
    pub fn new(columns: usize) -> Self {
        Self {
            columns: columns.max(1),
        }
    }

    /// Compute the move for `key` from page-relative `index`
    pub fn move_selection(&self, key: NavKey, index: usize, pages: &PageState) -> NavigationResult {
        let items = pages.items_on_current();
        if items == 0 {
            return NavigationResult::Stay { new_index: 0 };
        }
        let index = index.min(items - 1);
        let cols = self.columns;
        let page = pages.current_page();
        let page_size = pages.page_size();
        let stay = NavigationResult::Stay { new_index: index };

        let result = match key {
            NavKey::Left => {
                if index % cols > 0 {
                    NavigationResult::Stay {
                        new_index: index - 1,
                    }
                } else if index == 0 && pages.has_previous() {
                    self.cross(pages, page - 1, page_size - 1)
                } else if index > 0 {
                    // Start of a later row: end of the previous row
                    let prev_row_end = (index / cols - 1) * cols + (cols - 1);
                    NavigationResult::Stay {
                        new_index: prev_row_end.min(items - 1),
                    }
                } else {
                    stay
                }
            }
            NavKey::Right => {
                if index % cols < cols - 1 && index < items - 1 {
                    NavigationResult::Stay {
                        new_index: index + 1,
                    }
                } else if index == items - 1 && pages.has_next() {
                    self.cross(pages, page + 1, 0)
                } else if index % cols == cols - 1 {
                    let next_row_start = (index / cols + 1) * cols;
                    if next_row_start < items {
                        NavigationResult::Stay {
                            new_index: next_row_start,
                        }
                    } else {
                        stay
                    }
                } else {
                    stay
                }
            }
            NavKey::Up => {
                if index >= cols {
                    NavigationResult::Stay {
                        new_index: index - cols,
                    }
                } else if pages.has_previous() {
                    // Bottom row of the previous page, same column
                    let target = (page_size.saturating_sub(cols) + index % cols).min(page_size - 1);
                    self.cross(pages, page - 1, target)
                } else {
                    stay
                }
            }
            NavKey::Down => {
                let last_row_start = ((items - 1) / cols) * cols;
                if index + cols < items {
                    NavigationResult::Stay {
                        new_index: index + cols,
                    }
                } else if pages.has_next() && index >= last_row_start {
                    self.cross(pages, page + 1, index % cols)
                } else {
                    stay
                }
            }
            NavKey::PageUp => {
                if pages.has_previous() {
                    self.cross(pages, page - 1, index.min(page_size - 1))
                } else {
                    stay
                }
            }
            NavKey::PageDown => {
                if pages.has_next() {
                    self.cross(pages, page + 1, index.min(page_size - 1))
                } else {
                    stay
                }
            }
            NavKey::Home => {
                if page > 1 {
                    self.cross(pages, 1, 0)
                } else {
                    NavigationResult::Stay { new_index: 0 }
                }
            }
            NavKey::End => {
                if pages.has_next() {
                    let last = pages.total_pages();
                    let on_last = match pages.length() % page_size {
                        0 => page_size,
                        rem => rem,
                    };
                    self.cross(pages, last, on_last - 1)
                } else {
                    NavigationResult::Stay {
                        new_index: items - 1,
                    }
                }
            }
        };

        trace!(?key, index, page, cols, ?result, "Grid move");
        result
    }

    fn cross(&self, pages: &PageState, target_page: usize, target_index: usize) -> NavigationResult {
        let available = pages.items_on(target_page);
        NavigationResult::CrossPage {
            target_page,
            target_index: target_index.min(available.saturating_sub(1)),
        }
    }
}
