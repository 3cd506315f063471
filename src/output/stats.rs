//! Statistics reporting.

use console::style;

use crate::media::format_size;

/// Counters for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunStats {
    pub entries_processed: u64,
    pub entries_failed: u64,
    /// Entries whose output already existed.
    pub entries_skipped: u64,
    pub tracks_downloaded: u64,
    pub bytes_downloaded: u64,
}

impl RunStats {
    pub fn total_entries(&self) -> u64 {
        self.entries_processed + self.entries_failed + self.entries_skipped
    }

    pub fn has_failures(&self) -> bool {
        self.entries_failed > 0
    }
}

/// Print end-of-run statistics.
pub fn print_run_stats(stats: &RunStats) {
    println!();
    println!("{}", style("═".repeat(50)).dim());
    println!("{}", style("Statistics:").bold());
    println!("  Entries processed: {}", stats.entries_processed);
    if stats.entries_failed > 0 {
        println!("  Entries failed:    {}", style(stats.entries_failed).red());
    }
    println!("  Entries skipped:   {}", stats.entries_skipped);
    println!("  Tracks:            {}", stats.tracks_downloaded);
    println!("  Transferred:       {}", format_size(stats.bytes_downloaded));
    println!("{}", style("═".repeat(50)).dim());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_totals() {
        let stats = RunStats {
            entries_processed: 3,
            entries_failed: 1,
            entries_skipped: 2,
            ..RunStats::default()
        };
        assert_eq!(stats.total_entries(), 6);
        assert!(stats.has_failures());
        assert!(!RunStats::default().has_failures());
    }
}
