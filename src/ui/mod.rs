pub mod keymap;
pub mod terminal;

pub use keymap::handle_key;
pub use terminal::TerminalRenderer;
