//! The ordered image collection and the pagination over it.

pub mod image_store;
pub mod paginator;

pub use image_store::{ImageStore, LoadReport};
pub use paginator::{PageChangeRejected, PageState};
