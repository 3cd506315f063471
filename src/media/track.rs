//! Unified track representation.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Kind of stream a track carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FrameKind {
    Video,
    Audio,
}

impl fmt::Display for FrameKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameKind::Video => write!(f, "video"),
            FrameKind::Audio => write!(f, "audio"),
        }
    }
}

/// Codec name used when an upstream codec id is not in the table.
pub const UNKNOWN_CODEC: &str = "UNKNOWN";

/// A single addressable media stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    /// Quality ordinal (platform-defined, not comparable across codecs).
    pub id: u32,

    /// Human-readable quality label.
    pub description: String,

    pub kind: FrameKind,

    /// Normalized codec name.
    pub codec: String,

    /// Primary fetch URL.
    pub url: String,

    /// Fallback URLs with equivalent content, in preference order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub backup_urls: Vec<String>,

    /// Bandwidth in kbit/s.
    pub bandwidth: u64,

    /// Size in bytes, 0 when unknown.
    pub size: u64,

    pub width: u32,
    pub height: u32,
    pub fps: u32,

    /// Duration in seconds, 0 when unknown.
    pub duration: u64,

    /// Audio and video share this stream and cannot be split by kind.
    pub combined: bool,

    /// Consecutive pieces the stream is served as, in playback order.
    ///
    /// Empty when `url` alone carries the whole stream.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parts: Vec<TrackPart>,
}

/// One file of a stream that upstream splits into several.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackPart {
    pub url: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub backup_urls: Vec<String>,

    /// Size in bytes, 0 when unknown.
    pub size: u64,
}

impl TrackPart {
    /// Fetch URLs of this part, primary first.
    pub fn urls(&self) -> Vec<&str> {
        fetch_urls(&self.url, &self.backup_urls)
    }
}

impl Track {
    /// Create an empty track of the given kind.
    pub fn new(kind: FrameKind) -> Self {
        Self {
            id: 0,
            description: String::new(),
            kind,
            codec: String::from(UNKNOWN_CODEC),
            url: String::new(),
            backup_urls: Vec::new(),
            bandwidth: 0,
            size: 0,
            width: 0,
            height: 0,
            fps: 0,
            duration: 0,
            combined: false,
            parts: Vec::new(),
        }
    }

    pub fn is_video(&self) -> bool {
        self.kind == FrameKind::Video
    }

    pub fn is_audio(&self) -> bool {
        self.kind == FrameKind::Audio
    }

    /// All fetch URLs: the primary first, then backups, without empties or repeats.
    pub fn urls(&self) -> Vec<&str> {
        fetch_urls(&self.url, &self.backup_urls)
    }

    /// Whether the stream must be fetched as several files and joined.
    pub fn is_multi_part(&self) -> bool {
        self.parts.len() > 1
    }

    /// One-line summary used in stream listings.
    pub fn summary(&self) -> String {
        match self.kind {
            FrameKind::Video => format!(
                "[{}] [{}x{}] [{}] [{}] [{} kbps] [~{}]",
                self.description,
                self.width,
                self.height,
                self.codec,
                self.fps,
                self.bandwidth,
                format_size(self.size)
            ),
            FrameKind::Audio => format!(
                "[{}] [{}] [{} kbps] [~{}]",
                self.codec,
                self.description,
                self.bandwidth,
                format_size(self.size)
            ),
        }
    }
}

fn fetch_urls<'a>(primary: &'a str, backups: &'a [String]) -> Vec<&'a str> {
    let mut urls: Vec<&str> = Vec::with_capacity(1 + backups.len());
    for url in std::iter::once(primary).chain(backups.iter().map(String::as_str)) {
        if !url.is_empty() && !urls.contains(&url) {
            urls.push(url);
        }
    }
    urls
}

/// Format a byte count for display.
pub fn format_size(size: u64) -> String {
    const KB: f64 = 1024.0;
    const MB: f64 = KB * 1024.0;
    const GB: f64 = MB * 1024.0;

    let size_f = size as f64;
    if size_f < KB {
        format!("{}B", size)
    } else if size_f < MB {
        format!("{:.2}KB", size_f / KB)
    } else if size_f < GB {
        format!("{:.2}MB", size_f / MB)
    } else {
        format!("{:.2}GB", size_f / GB)
    }
}
