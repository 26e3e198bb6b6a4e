// Keybindings for the folio gallery
// Maps key names to gallery actions for the current view mode.
//
// Grid:
// - Arrow keys / hjkl: Move selection (crossing pages at the edges)
// - PageUp / PageDown: Previous / next page
// - Home / End: First / last item of the page
// - Enter: Open viewer for selected item
// - f: Toggle favorite
// - Delete / Backspace: Delete selected image
//
// Viewer:
// - Escape: Close viewer, return to grid
// - Left / Right (h / l): Previous / next image
// - Home / End: First / last image
// - r / e: Rotate clockwise / counter-clockwise
// - s: Save rotation
// - f: Toggle favorite
// - Delete / Backspace: Delete current image

use tracing::trace;

use crate::error::Result;
use crate::navigation::{NavKey, NavigateOutcome, ViewerDirection};
use crate::ports::{ImageSource, MutationService, RenderSink, RotateDirection};
use crate::session::Gallery;

/// Current view mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewMode {
    Grid,
    Viewer,
}

impl ViewMode {
    pub fn of<B, R>(gallery: &Gallery<B, R>) -> Self
    where
        B: ImageSource + MutationService,
        R: RenderSink,
    {
        if gallery.viewer().is_open() {
            Self::Viewer
        } else {
            Self::Grid
        }
    }
}

/// What a key press asks the gallery to do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Grid(NavKey),
    OpenViewer,
    CloseViewer,
    Viewer(ViewerDirection),
    Rotate(RotateDirection),
    SaveRotation,
    ToggleFavorite,
    Delete,
}

/// Look up the action bound to `key` in `mode`
pub fn action_for_key(key: &str, mode: ViewMode) -> Option<Action> {
    let action = match (mode, key) {
        (_, "f" | "F") => Action::ToggleFavorite,
        (_, "Delete" | "Backspace") => Action::Delete,

        (ViewMode::Grid, "ArrowLeft" | "h") => Action::Grid(NavKey::Left),
        (ViewMode::Grid, "ArrowRight" | "l") => Action::Grid(NavKey::Right),
        (ViewMode::Grid, "ArrowUp" | "k") => Action::Grid(NavKey::Up),
        (ViewMode::Grid, "ArrowDown" | "j") => Action::Grid(NavKey::Down),
        (ViewMode::Grid, "PageUp") => Action::Grid(NavKey::PageUp),
        (ViewMode::Grid, "PageDown") => Action::Grid(NavKey::PageDown),
        (ViewMode::Grid, "Home") => Action::Grid(NavKey::Home),
        (ViewMode::Grid, "End") => Action::Grid(NavKey::End),
        (ViewMode::Grid, "Enter") => Action::OpenViewer,

        (ViewMode::Viewer, "Escape") => Action::CloseViewer,
        (ViewMode::Viewer, "ArrowLeft" | "h") => Action::Viewer(ViewerDirection::Prev),
        (ViewMode::Viewer, "ArrowRight" | "l") => Action::Viewer(ViewerDirection::Next),
        (ViewMode::Viewer, "Home") => Action::Viewer(ViewerDirection::First),
        (ViewMode::Viewer, "End") => Action::Viewer(ViewerDirection::Last),
        (ViewMode::Viewer, "r" | "R") => Action::Rotate(RotateDirection::Clockwise),
        (ViewMode::Viewer, "e" | "E") => Action::Rotate(RotateDirection::CounterClockwise),
        (ViewMode::Viewer, "s" | "S") => Action::SaveRotation,

        _ => return None,
    };
    Some(action)
}

/// Run `action` against the gallery
pub async fn apply<B, R>(gallery: &mut Gallery<B, R>, action: Action) -> Result<()>
where
    B: ImageSource + MutationService,
    R: RenderSink,
{
    trace!(?action, "Applying action");
    match action {
        Action::Grid(key) => {
            gallery.handle_grid_key(key);
        }
        Action::OpenViewer => {
            if gallery.open_selected()?.is_some() {
                gallery.sync_viewer_favorite().await;
            }
        }
        Action::CloseViewer => gallery.close_viewer(),
        Action::Viewer(direction) => {
            if let NavigateOutcome::Moved { .. } = gallery.navigate_viewer(direction) {
                gallery.sync_viewer_favorite().await;
            }
        }
        Action::Rotate(direction) => {
            gallery.rotate(direction).await?;
        }
        Action::SaveRotation => {
            gallery.save_rotation().await?;
        }
        Action::ToggleFavorite => {
            gallery.toggle_favorite_target().await?;
        }
        Action::Delete => {
            gallery.delete_target().await?;
        }
    }
    Ok(())
}

/// Handle a key press. Returns false if the key is unbound in the current mode.
pub async fn handle_key<B, R>(gallery: &mut Gallery<B, R>, key: &str) -> Result<bool>
where
    B: ImageSource + MutationService,
    R: RenderSink,
{
    match action_for_key(key, ViewMode::of(gallery)) {
        Some(action) => {
            apply(gallery, action).await?;
            Ok(true)
        }
        None => Ok(false),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GalleryConfig;
    use crate::library::LocalLibrary;
    use crate::ui::terminal::TerminalRenderer;
    use image::RgbImage;
    use std::time::Duration;
    use tempfile::tempdir;

    #[test]
    fn test_grid_bindings() {
        let grid = ViewMode::Grid;
        assert_eq!(action_for_key("ArrowLeft", grid), Some(Action::Grid(NavKey::Left)));
        assert_eq!(action_for_key("j", grid), Some(Action::Grid(NavKey::Down)));
        assert_eq!(action_for_key("PageDown", grid), Some(Action::Grid(NavKey::PageDown)));
        assert_eq!(action_for_key("Enter", grid), Some(Action::OpenViewer));
        assert_eq!(action_for_key("Escape", grid), None);
        assert_eq!(action_for_key("r", grid), None);
    }

    #[test]
    fn test_viewer_bindings() {
        let viewer = ViewMode::Viewer;
        assert_eq!(
            action_for_key("ArrowRight", viewer),
            Some(Action::Viewer(ViewerDirection::Next))
        );
        assert_eq!(
            action_for_key("Home", viewer),
            Some(Action::Viewer(ViewerDirection::First))
        );
        assert_eq!(
            action_for_key("e", viewer),
            Some(Action::Rotate(RotateDirection::CounterClockwise))
        );
        assert_eq!(action_for_key("Escape", viewer), Some(Action::CloseViewer));
        assert_eq!(action_for_key("ArrowUp", viewer), None);
    }

    #[test]
    fn test_shared_bindings() {
        for mode in [ViewMode::Grid, ViewMode::Viewer] {
            assert_eq!(action_for_key("f", mode), Some(Action::ToggleFavorite));
            assert_eq!(action_for_key("Backspace", mode), Some(Action::Delete));
        }
    }

    #[tokio::test]
    async fn test_keys_drive_local_library() {
        let photos = tempdir().unwrap();
        let data = tempdir().unwrap();
        for name in ["a.png", "b.png", "c.png"] {
            RgbImage::new(2, 1).save(photos.path().join(name)).unwrap();
        }

        let config = GalleryConfig {
            navigation_cooldown: Duration::ZERO,
            ..Default::default()
        };
        let library = LocalLibrary::open(data.path(), &data.path().join("trash"), Default::default())
            .unwrap();
        let sink = TerminalRenderer::new(Vec::new(), 3);
        let mut gallery = Gallery::new(&config, library, sink);
        gallery.set_sort(crate::models::SortMethod::NameAsc);
        gallery.load_directory(photos.path()).await.unwrap();

        assert!(handle_key(&mut gallery, "l").await.unwrap());
        assert!(handle_key(&mut gallery, "Enter").await.unwrap());
        assert_eq!(ViewMode::of(&gallery), ViewMode::Viewer);

        assert!(handle_key(&mut gallery, "ArrowRight").await.unwrap());
        assert_eq!(gallery.current_record().unwrap().name, "b.png");

        assert!(handle_key(&mut gallery, "Delete").await.unwrap());
        assert!(!photos.path().join("b.png").exists());
        assert!(data.path().join("trash").join("b.png").exists());
        assert_eq!(gallery.current_record().unwrap().name, "c.png");

        assert!(handle_key(&mut gallery, "Escape").await.unwrap());
        assert!(!handle_key(&mut gallery, "Escape").await.unwrap());

        let output = String::from_utf8(gallery.sink().output().to_vec()).unwrap();
        assert!(output.contains("> Deleted: b.png"));
    }
}
