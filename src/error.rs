//! Error types for the bili-downloader application.

use std::path::PathBuf;

use thiserror::Error;

use crate::media::FrameKind;

/// Main error type for the application.
#[derive(Error, Debug)]
pub enum Error {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration value for '{field}': {message}")]
    ConfigValidation { field: String, message: String },

    #[error("Missing required configuration: {0}")]
    MissingConfig(String),

    #[error("Unrecognized media identifier: {0}")]
    InvalidMediaId(String),

    // API errors
    #[error("API error: {0}")]
    Api(String),

    #[error("API returned code {code}: {message}")]
    ApiCode { code: i64, message: String },

    // Resolution errors
    #[error("Could not locate a recognizable track container in the play payload")]
    NoTrackContainer,

    #[error("No {0} track available")]
    NoCandidate(FrameKind),

    // Selection errors
    #[error("Invalid choice {choice}, expected a number between 1 and {max}")]
    InvalidChoice { choice: usize, max: usize },

    // Transport errors
    #[error("Track has no download URL")]
    EmptyTrackUrl,

    #[error("HTTP {status} from {url}")]
    HttpStatus { url: String, status: u16 },

    #[error("Body from {url} ended at byte {received} of {expected}")]
    Truncated {
        url: String,
        received: u64,
        expected: u64,
    },

    #[error("{} of {total} segment(s) failed: {failed:?}", failed.len())]
    SegmentsFailed { failed: Vec<usize>, total: usize },

    #[error("Transfer cancelled")]
    Cancelled,

    // Assembly errors
    #[error("Failed to assemble {}: {source}", path.display())]
    Assembly {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // File system errors
    #[error("Invalid filename: {0}")]
    InvalidFilename(String),

    // External tool errors
    #[error("{0} not found. Please install it and ensure it's in your PATH.")]
    ToolNotFound(String),

    #[error("Mux error: {0}")]
    Mux(String),

    #[error("aria2c error: {0}")]
    Aria2c(String),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // HTTP errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    // URL parsing errors
    #[error("Invalid URL: {0}")]
    UrlParse(#[from] url::ParseError),
}

impl Error {
    /// Wrap an IO error raised while creating, renaming or merging output files.
    pub fn assembly(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Assembly {
            path: path.into(),
            source,
        }
    }

    /// Whether the error came from the network side of a transfer.
    ///
    /// The supervisor only tries the next strategy or mirror for these.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Error::Http(_)
                | Error::HttpStatus { .. }
                | Error::Truncated { .. }
                | Error::SegmentsFailed { .. }
        )
    }
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Process exit codes.
pub mod exit_codes {
    pub const SUCCESS: i32 = 0;
    pub const ABORT: i32 = 1;
    pub const API_ERROR: i32 = 2;
    pub const CONFIG_ERROR: i32 = 3;
    pub const DOWNLOAD_ERROR: i32 = 4;
    pub const UNEXPECTED_ERROR: i32 = 5;
    pub const SOME_ENTRIES_FAILED: i32 = 6;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_classification() {
        let status = Error::HttpStatus {
            url: "https://example.com/a.m4s".into(),
            status: 403,
        };
        assert!(status.is_transport());

        let segments = Error::SegmentsFailed {
            failed: vec![1, 3],
            total: 4,
        };
        assert!(segments.is_transport());
        assert_eq!(segments.to_string(), "2 of 4 segment(s) failed: [1, 3]");

        let truncated = Error::Truncated {
            url: "https://example.com/v.flv".into(),
            received: 10,
            expected: 20,
        };
        assert!(truncated.is_transport());
        assert_eq!(
            truncated.to_string(),
            "Body from https://example.com/v.flv ended at byte 10 of 20"
        );

        let assembly = Error::assembly("out.mp4", std::io::Error::other("disk full"));
        assert!(!assembly.is_transport());
        assert!(!Error::NoTrackContainer.is_transport());
    }
}
