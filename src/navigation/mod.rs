pub mod grid;
pub mod viewer;

pub use grid::{GridNavigator, NavKey, NavigationResult};
pub use viewer::{
    NavigateOutcome, PositionClass, ViewerController, ViewerDirection, ViewerState,
};
