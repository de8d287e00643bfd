pub mod api;
pub mod config;
pub mod helper;
pub mod loader;
pub mod models;
pub mod token_store;

pub use helper::normalizer_helpers::map_raw_blocks_to_edit_blocks;
pub use loader::{LessonLoader, LoadRequest};
