//! File system helpers for downloaded media

pub mod paths;

pub use paths::{destination_for, extension_from_url, sanitize_path_component};
