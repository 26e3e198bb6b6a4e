mod collection;
mod config;
mod error;
mod library;
mod models;
mod navigation;
mod ports;
mod session;
mod ui;

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info, warn};

use config::GalleryConfig;
use error::GalleryError;
use library::LocalLibrary;
use models::SortMethod;
use ports::RenderSink;
use session::{Gallery, ViewFilter};
use ui::TerminalRenderer;

/// Grid width of the terminal renderer until changed with `cols`.
const DEFAULT_COLUMNS: usize = 5;

type App<W = std::io::Stdout> = Gallery<LocalLibrary, TerminalRenderer<W>>;

fn main() -> Result<()> {
    // Logs go to stderr; stdout carries the rendered gallery.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("folio=info".parse()?),
        )
        .init();

    let config = GalleryConfig::from_env().map_err(|e| {
        let error = GalleryError::from(e);
        tracing::error!(category = ?error.category(), "Invalid configuration: {error}");
        error
    })?;
    let data_dir = config.resolve_data_dir()?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;
    runtime.block_on(run(config, data_dir))
}

async fn run(config: GalleryConfig, data_dir: PathBuf) -> Result<()> {
    let trash_dir = config.resolve_trash_dir(&data_dir);
    info!(?data_dir, ?trash_dir, page_size = config.page_size, sort = %config.sort_method, "Starting folio");
    let library = LocalLibrary::open(&data_dir, &trash_dir, config.scan_config())?;
    let mut gallery: App = Gallery::new(&config, library, TerminalRenderer::stdout(DEFAULT_COLUMNS));

    let start = match std::env::args_os().nth(1) {
        Some(arg) => Some(PathBuf::from(arg)),
        None => gallery.backend().directories().await?.into_iter().next(),
    };
    match start {
        Some(dir) => open_directory(&mut gallery, &dir).await,
        None => gallery
            .sink_mut()
            .render_message("Usage: folio <directory>, or `add <dir>` to monitor one"),
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if matches!(line, "q" | "quit") {
            break;
        }
        if let Err(e) = run_command(&mut gallery, line).await {
            warn!("Command {:?} failed: {:#}", line, e);
        }
    }

    info!("Exiting");
    Ok(())
}

async fn open_directory<W: Write>(gallery: &mut App<W>, dir: &Path) {
    match gallery.load_directory(dir).await {
        Ok(report) if !report.duplicates.is_empty() => {
            info!("Ignored {} duplicate records", report.duplicates.len());
        }
        Ok(_) => {}
        Err(e) => warn!(category = ?e.category(), "{e}"),
    }
}

async fn run_command<W: Write>(gallery: &mut App<W>, line: &str) -> Result<()> {
    let (command, arg) = match line.split_once(char::is_whitespace) {
        Some((command, arg)) => (command, arg.trim()),
        None => (line, ""),
    };

    match command {
        "cd" => open_directory(gallery, Path::new(arg)).await,
        "sort" => gallery.set_sort(SortMethod::from_key(arg)),
        "size" => {
            let size: usize = arg.parse().with_context(|| format!("Invalid page size {arg:?}"))?;
            gallery.set_page_size(size);
        }
        "page" => {
            let page: usize = arg.parse().with_context(|| format!("Invalid page {arg:?}"))?;
            if let Err(reason) = gallery.change_page(page) {
                debug!(%reason, "Ignoring page command");
            }
        }
        "next" => {
            if let Err(reason) = gallery.next_page() {
                debug!(%reason, "Already on the last page");
            }
        }
        "prev" => {
            if let Err(reason) = gallery.previous_page() {
                debug!(%reason, "Already on the first page");
            }
        }
        "cols" if arg.is_empty() => {
            let columns = gallery.sink().grid_columns();
            gallery
                .sink_mut()
                .render_message(&format!("{columns} columns"));
        }
        "cols" => {
            let columns: usize = arg.parse().with_context(|| format!("Invalid column count {arg:?}"))?;
            gallery.sink_mut().set_columns(columns);
            gallery.invalidate_layout();
        }
        "favs" => {
            let filter = match gallery.filter() {
                ViewFilter::All => ViewFilter::FavoritesOnly,
                ViewFilter::FavoritesOnly => ViewFilter::All,
            };
            gallery.set_filter(filter).await?;
        }
        "add" => {
            if gallery.backend().add_directory(Path::new(arg)).await? {
                gallery.on_directories_changed();
            }
        }
        "rm" => {
            if gallery.backend().remove_directory(Path::new(arg)).await? {
                gallery.on_directories_changed();
            }
        }
        "ls" => list_directories(gallery).await?,
        "info" => describe(gallery),
        key => {
            if !ui::handle_key(gallery, key).await? {
                gallery
                    .sink_mut()
                    .render_message(&format!("Unknown command or key: {key}"));
            }
        }
    }
    Ok(())
}

fn describe<W: Write>(gallery: &mut App<W>) {
    let pages = gallery.selection().pages();
    let cache = gallery.cache();
    let mut lines = vec![
        format!(
            "{} | page {}/{} | sort {} | {:?}",
            gallery.status(),
            pages.current_page(),
            pages.total_pages(),
            gallery.sort_method(),
            gallery.filter()
        ),
        format!(
            "{} of {} images shown | cached: {} listings, {} folders",
            gallery.view().len(),
            gallery.store().records().len(),
            cache.image_entries(),
            cache.directory_entries()
        ),
    ];
    if let Some(record) = gallery.selected_record() {
        lines.push(format!("selected: {}", record.name));
    }
    if let Some(pending) = gallery.pending_rotation() {
        lines.push(format!(
            "unsaved rotation: {} by {} degrees",
            pending.original_path.display(),
            pending.angle
        ));
    }

    let sink = gallery.sink_mut();
    for line in lines {
        sink.render_message(&line);
    }
}

async fn list_directories<W: Write>(gallery: &mut App<W>) -> Result<()> {
    let monitored = gallery.backend().directories().await?;
    let children = match gallery.directory().map(Path::to_path_buf) {
        Some(current) => gallery.subdirectories(&current).await?,
        None => Vec::new(),
    };

    let sink = gallery.sink_mut();
    for dir in monitored {
        sink.render_message(&format!("library: {}", dir.display()));
    }
    for dir in children {
        sink.render_message(&format!("folder:  {}", dir.display()));
    }
    Ok(())
}
