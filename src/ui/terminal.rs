//! Line-oriented renderer for terminals and logs.

use std::fmt;
use std::io::{self, Write};
use std::path::Path;

use tracing::warn;

use crate::models::ImageRecord;
use crate::ports::{EmptyReason, PageRendered, RenderSink};
use crate::session::PaginationStatus;

/// Prints the grid as rows of `columns` names, the selected one bracketed.
pub struct TerminalRenderer<W: Write> {
    out: W,
    columns: usize,
}

impl TerminalRenderer<io::Stdout> {
    pub fn stdout(columns: usize) -> Self {
        Self::new(io::stdout(), columns)
    }
}

impl<W: Write> TerminalRenderer<W> {
    pub fn new(out: W, columns: usize) -> Self {
        Self {
            out,
            columns: columns.max(1),
        }
    }

    pub fn set_columns(&mut self, columns: usize) {
        self.columns = columns.max(1);
    }

    fn line(&mut self, args: fmt::Arguments<'_>) {
        let result = self
            .out
            .write_fmt(args)
            .and_then(|_| self.out.write_all(b"\n"))
            .and_then(|_| self.out.flush());
        if let Err(e) = result {
            warn!("Failed to write to terminal: {}", e);
        }
    }
}

#[cfg(test)]
impl TerminalRenderer<Vec<u8>> {
    /// Everything written so far.
    pub fn output(&self) -> &[u8] {
        &self.out
    }
}

impl<W: Write> RenderSink for TerminalRenderer<W> {
    fn render_page(&mut self, items: &[ImageRecord], selected: Option<usize>) -> PageRendered {
        for (row, chunk) in items.chunks(self.columns).enumerate() {
            let cells: Vec<String> = chunk
                .iter()
                .enumerate()
                .map(|(col, record)| {
                    if selected == Some(row * self.columns + col) {
                        format!("[{}]", record.name)
                    } else {
                        format!(" {} ", record.name)
                    }
                })
                .collect();
            self.line(format_args!("{}", cells.join(" ")));
        }
        PageRendered {
            item_count: items.len(),
        }
    }

    fn render_selection(&mut self, selected: Option<usize>) {
        match selected {
            Some(index) => self.line(format_args!("selected #{}", index + 1)),
            None => self.line(format_args!("selection cleared")),
        }
    }

    fn render_viewer(&mut self, record: &ImageRecord, absolute_index: usize, total: usize) {
        self.line(format_args!(
            "viewing {} ({}/{}) {}",
            record.name,
            absolute_index + 1,
            total,
            record.url
        ));
    }

    fn close_viewer(&mut self) {
        self.line(format_args!("viewer closed"));
    }

    fn render_pagination_status(&mut self, status: PaginationStatus) {
        self.line(format_args!("{status}"));
    }

    fn render_empty_state(&mut self, reason: EmptyReason) {
        match reason {
            EmptyReason::NoImages => self.line(format_args!("No images in this folder")),
            EmptyReason::NoFavorites => self.line(format_args!("No favorite images")),
            EmptyReason::LoadFailed(message) => {
                self.line(format_args!("Error loading images: {message}"))
            }
        }
    }

    fn render_favorite(&mut self, path: &Path, favorited: bool) {
        let mark = if favorited { "*" } else { "-" };
        self.line(format_args!("{mark} {}", path.display()));
    }

    fn render_message(&mut self, message: &str) {
        self.line(format_args!("> {message}"));
    }

    fn grid_columns(&self) -> usize {
        self.columns
    }
}
