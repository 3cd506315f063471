//! Download module.
//!
//! This module provides:
//! - Byte sources and shared HTTP settings
//! - Clip planning, segmented and single-stream transfers, merge
//! - Transfer supervision (strategy, mirror fallback, aria2c)
//! - Muxing with external tools
//! - Playlist resolution and the per-entry pipeline

pub mod aria2c;
pub mod clip;
pub mod merge;
pub mod mux;
pub mod pipeline;
pub mod playlist;
pub mod segmented;
pub mod single;
pub mod source;
pub mod state;
pub mod supervisor;

pub use aria2c::Aria2cOptions;
pub use clip::{get_all_clips, ByteRange, Clip, DEFAULT_SEGMENT_SIZE};
pub use mux::{mux_tracks, MuxTools};
pub use pipeline::{choose_tracks, EntryOutcome, Pipeline, PipelineOptions};
pub use playlist::{resolve_playlist, Playlist, PlaylistEntry};
pub use segmented::{EngineOptions, SegmentedDownloader};
pub use source::{ByteSource, HttpConfig, HttpSource};
pub use state::{Outcome, ProgressReporter, TransferState};
pub use supervisor::TransferSupervisor;
