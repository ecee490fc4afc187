pub mod extractor;
pub mod loader;
pub mod types;
pub mod utils;

