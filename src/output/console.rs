//! Console output utilities.

use console::{style, Term};

use crate::error::{Error, Result};
use crate::media::{candidates, ChoicePrompt, FrameKind, Track};

/// Print an info message.
pub fn print_info(message: &str) {
    println!("{} {}", style("INFO").cyan().bold(), message);
}

/// Print a success message.
pub fn print_success(message: &str) {
    println!("{} {}", style("OK").green().bold(), message);
}

/// Print a warning message.
pub fn print_warning(message: &str) {
    println!("{} {}", style("WARN").yellow().bold(), message);
}

/// Print an error message.
pub fn print_error(message: &str) {
    eprintln!("{} {}", style("ERROR").red().bold(), message);
}

/// Print the application banner.
pub fn print_banner() {
    let banner = r#"
╔═══════════════════════════════════════════════════════╗
║     bili-downloader                                   ║
║     Stream resolver and segmented downloader          ║
╚═══════════════════════════════════════════════════════╝
"#;
    println!("{}", style(banner).cyan());
}

/// Print configuration summary.
pub fn print_config_summary(input: &str, api_mode: &str, strategy: &str, work_dir: &str) {
    println!();
    println!("{}", style("Configuration:").bold());
    println!("  Input: {}", input);
    println!("  API mode: {}", api_mode);
    println!("  Strategy: {}", strategy);
    println!("  Directory: {}", work_dir);
    println!();
}

/// Print the available streams, numbered per kind from 1.
pub fn print_tracks(tracks: &[Track]) {
    for (kind, heading) in [
        (FrameKind::Video, "Video streams:"),
        (FrameKind::Audio, "Audio streams:"),
    ] {
        let list = candidates(tracks, kind);
        if list.is_empty() {
            continue;
        }

        println!("{}", style(heading).bold());
        print_numbered(&list);
    }
}

fn print_numbered(list: &[&Track]) {
    for (i, track) in list.iter().enumerate() {
        println!("  {} {}", style(format!("{:>2}.", i + 1)).dim(), track.summary());
    }
}

/// Reads interactive track choices from the terminal.
pub struct TermPrompt {
    term: Term,
}

impl TermPrompt {
    pub fn new() -> Self {
        Self {
            term: Term::stdout(),
        }
    }
}

impl Default for TermPrompt {
    fn default() -> Self {
        Self::new()
    }
}

impl ChoicePrompt for TermPrompt {
    fn choose(&mut self, kind: FrameKind, candidates: &[&Track]) -> Result<usize> {
        println!("{}", style(format!("Choose a {} stream:", kind)).bold());
        print_numbered(candidates);

        self.term
            .write_str(&format!("Number [1-{}]: ", candidates.len()))?;
        let line = self.term.read_line()?;

        line.trim().parse().map_err(|_| Error::InvalidChoice {
            choice: 0,
            max: candidates.len(),
        })
    }
}
