//! Filesystem module.
//!
//! Provides:
//! - Output and intermediate path layout
//! - Filename sanitization and extension choice

pub mod naming;
pub mod paths;

pub use naming::{audio_extension, output_stem, sanitize_filename};
pub use paths::{ensure_dir, move_file, remove_if_exists, EntryPaths};
