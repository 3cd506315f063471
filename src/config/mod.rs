//! Configuration module for bili-downloader.
//!
//! This module handles:
//! - Loading configuration from TOML files
//! - CLI argument parsing and merging
//! - Configuration validation and input parsing

pub mod loader;
pub mod modes;
pub mod validation;

pub use loader::{
    AccountConfig, ApiConfig, Config, DownloadConfig, MuxConfig, SelectionConfig,
    CONFIG_FILE_NAME,
};
pub use modes::{ApiMode, DownloadStrategy};
pub use validation::{parse_media_id, parse_page_selection, validate_config, MediaId};
