//! Media module for track representation, normalization and selection.

pub mod parser;
pub mod quality;
pub mod selector;
pub mod track;

pub use parser::{detect_shape, normalize, parse_play_payload, PayloadShape};
pub use selector::{
    candidates, pick_interactive, select_audio, select_video, select_with_prompt, ChoicePrompt,
    SelectionPolicy,
};
pub use track::{format_size, FrameKind, Track, TrackPart};
