pub mod cache;
pub mod gallery;
pub mod sync;

pub use gallery::{Gallery, ViewFilter};
pub use sync::PaginationStatus;
