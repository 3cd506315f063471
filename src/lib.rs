//! bili-downloader - Bilibili stream resolver and downloader
//!
//! This library resolves a media identifier into its audio and video tracks,
//! picks tracks under a configurable policy and downloads them with
//! concurrent, resumable range transfers.
//!
//! # Features
//!
//! - Track normalization across international, DASH and legacy payloads
//! - Quality and encoding priority selection, or interactive choice
//! - Segmented downloads with reusable segment files and ordered merge
//! - Single-stream transfers with byte-offset resume
//! - Mirror fallback, aria2c delegation and ffmpeg/MP4Box muxing
//!
//! # Example
//!
//! ```no_run
//! use bili_downloader::media::{parse_play_payload, select_audio, select_video, SelectionPolicy};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let body = std::fs::read_to_string("playurl.json")?;
//!     let tracks = parse_play_payload(&body, None)?;
//!
//!     let policy = SelectionPolicy {
//!         quality_priority: vec!["1080P".into()],
//!         encoding_priority: vec!["hevc".into(), "avc".into()],
//!     };
//!     let video = select_video(&tracks, &policy)?;
//!     let audio = select_audio(&tracks)?;
//!     println!("{}\n{}", video.summary(), audio.summary());
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod cli;
pub mod config;
pub mod download;
pub mod error;
pub mod fs;
pub mod media;
pub mod output;

// Re-exports for convenience
pub use api::BiliApi;
pub use config::{ApiMode, Config, DownloadStrategy, MediaId};
pub use download::{Pipeline, Playlist, PlaylistEntry, SegmentedDownloader, TransferSupervisor};
pub use error::{Error, Result};
pub use media::{FrameKind, Track};
