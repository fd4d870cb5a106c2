//! Filename handling for downloaded media.
//!
//! Captions become filenames, so everything a chat message may contain
//! (markup, emoji, path separators) has to be reduced to something a
//! filesystem accepts while keeping the visible text recognizable.

mod files;
mod sanitize;

pub use files::{ensure_extension, mime_to_extension, resolve_extension, unique_path};
pub use sanitize::sanitize_name;

/// Fallback base name when nothing usable survives sanitization.
pub const FALLBACK_BASE_NAME: &str = "file";
