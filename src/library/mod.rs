//! Local filesystem library: the concrete collaborators behind the engine.

pub mod rotation;
pub mod scanner;
pub mod service;
pub mod store;
pub mod trash;

pub use service::LocalLibrary;
