//! Full-screen viewer session state.
//!
//! The viewer addresses the active view by absolute index, independent of
//! which grid page is rendered. Navigation is serialized by a short cooldown
//! guard, and deletions are reconciled by position class rather than by the
//! stale index.

use std::time::{Duration, Instant};

use tracing::{debug, trace, warn};

use crate::error::{GalleryError, Result};

/// Viewer navigation request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewerDirection {
    Prev,
    Next,
    First,
    Last,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewerState {
    Closed,
    Open { index: usize },
}

/// Coarse position of an item, captured before a mutation shifts indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PositionClass {
    First,
    Middle,
    Last,
}

impl PositionClass {
    pub fn of(index: usize, len: usize) -> Self {
        if index == 0 {
            Self::First
        } else if index + 1 >= len {
            Self::Last
        } else {
            Self::Middle
        }
    }

    /// Index to show after the item at `original_index` was removed,
    /// or `None` when nothing is left.
    pub fn successor(self, original_index: usize, new_len: usize) -> Option<usize> {
        if new_len == 0 {
            return None;
        }
        Some(match self {
            Self::First => 0,
            Self::Last => new_len - 1,
            Self::Middle => original_index.min(new_len - 1),
        })
    }
}

/// Result of a navigation request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigateOutcome {
    Moved { from: usize, to: usize },
    /// Accepted, but already at the requested boundary.
    Unchanged(usize),
    /// A previous navigation is still inside its cooldown.
    Busy,
    NotOpen,
}

/// Mutual-exclusion flag that releases itself after a fixed cooldown.
///
/// Engaging records a timestamp instead of scheduling a reset, so the flag
/// can never stay set if whatever followed the engage failed.
#[derive(Debug, Clone, Copy)]
pub struct NavigationGuard {
    cooldown: Duration,
    engaged_at: Option<Instant>,
}

impl NavigationGuard {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            cooldown,
            engaged_at: None,
        }
    }

    pub fn is_engaged_at(&self, now: Instant) -> bool {
        self.engaged_at
            .map(|at| now.saturating_duration_since(at) < self.cooldown)
            .unwrap_or(false)
    }

    /// Engage unless still cooling down. Returns whether the caller may proceed.
    pub fn try_engage_at(&mut self, now: Instant) -> bool {
        if self.is_engaged_at(now) {
            return false;
        }
        self.engaged_at = Some(now);
        true
    }

    pub fn release(&mut self) {
        self.engaged_at = None;
    }
}

#[derive(Debug, Clone)]
pub struct ViewerController {
    state: ViewerState,
    guard: NavigationGuard,
}

impl ViewerController {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            state: ViewerState::Closed,
            guard: NavigationGuard::new(cooldown),
        }
    }

    pub fn current_index(&self) -> Option<usize> {
        match self.state {
            ViewerState::Open { index } => Some(index),
            ViewerState::Closed => None,
        }
    }

    pub fn is_open(&self) -> bool {
        matches!(self.state, ViewerState::Open { .. })
    }

    /// Open (or re-point) the viewer at `index`.
    pub fn open(&mut self, index: usize, len: usize) -> Result<usize> {
        if index >= len {
            warn!(index, len, "Refusing to open viewer outside the collection");
            return Err(GalleryError::index(index, len, "open viewer"));
        }
        debug!(index, len, "Viewer open");
        self.state = ViewerState::Open { index };
        Ok(index)
    }

    pub fn close(&mut self) {
        if self.is_open() {
            debug!("Viewer closed");
        }
        self.state = ViewerState::Closed;
        self.guard.release();
    }

    pub fn navigate(&mut self, direction: ViewerDirection, len: usize) -> NavigateOutcome {
        self.navigate_at(direction, len, Instant::now())
    }

    /// Move by one (`Prev`/`Next`) or jump to an end. Never wraps.
    pub fn navigate_at(
        &mut self,
        direction: ViewerDirection,
        len: usize,
        now: Instant,
    ) -> NavigateOutcome {
        let ViewerState::Open { index } = self.state else {
            return NavigateOutcome::NotOpen;
        };
        if len == 0 {
            return NavigateOutcome::NotOpen;
        }
        if !self.guard.try_engage_at(now) {
            trace!(?direction, index, "Viewer navigation ignored during cooldown");
            return NavigateOutcome::Busy;
        }

        let current = index.min(len - 1);
        let target = match direction {
            ViewerDirection::Prev => current.saturating_sub(1),
            ViewerDirection::Next => (current + 1).min(len - 1),
            ViewerDirection::First => 0,
            ViewerDirection::Last => len - 1,
        };
        self.state = ViewerState::Open { index: target };

        if target == index {
            NavigateOutcome::Unchanged(target)
        } else {
            debug!(?direction, from = index, to = target, "Viewer navigated");
            NavigateOutcome::Moved {
                from: index,
                to: target,
            }
        }
    }

    /// Reconcile after the displayed item was removed.
    ///
    /// `class` and `original_index` must be captured before the removal.
    pub fn reconcile_removed_current(
        &mut self,
        class: PositionClass,
        original_index: usize,
        new_len: usize,
    ) -> ViewerState {
        self.state = match class.successor(original_index, new_len) {
            Some(index) => ViewerState::Open { index },
            None => {
                self.guard.release();
                ViewerState::Closed
            }
        };
        debug!(?class, original_index, new_len, state = ?self.state, "Viewer reconciled after removal");
        self.state
    }

    /// Keep showing the same item after it moved to `index`.
    pub fn repoint(&mut self, index: usize) {
        if self.is_open() {
            self.state = ViewerState::Open { index };
        }
    }
}
