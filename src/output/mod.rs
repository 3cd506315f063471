//! Output module for console output and progress.
//!
//! Provides:
//! - Colored console output and the terminal choice prompt
//! - Progress bars
//! - Statistics reporting

pub mod console;
pub mod progress;
pub mod stats;

pub use console::{
    print_banner, print_config_summary, print_error, print_info, print_success, print_tracks,
    print_warning, TermPrompt,
};
pub use progress::{create_download_bar, create_spinner};
pub use stats::{print_run_stats, RunStats};
