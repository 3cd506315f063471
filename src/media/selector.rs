//! Track selection policy.
//!
//! Every stage returns `Option`: "no match" hands over to the next stage and is
//! never an error. Only an empty candidate list fails.

use crate::error::{Error, Result};
use crate::media::track::{FrameKind, Track};

/// Ordered preferences used for automatic video selection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionPolicy {
    /// Quality labels in priority order, matched as substrings of the description.
    pub quality_priority: Vec<String>,

    /// Codec names in priority order, matched case-insensitively.
    pub encoding_priority: Vec<String>,
}

/// Source of a 1-based choice for interactive selection.
pub trait ChoicePrompt {
    fn choose(&mut self, kind: FrameKind, candidates: &[&Track]) -> Result<usize>;
}

/// Tracks of one kind, in discovery order.
pub fn candidates(tracks: &[Track], kind: FrameKind) -> Vec<&Track> {
    tracks.iter().filter(|t| t.kind == kind).collect()
}

/// Pick a candidate by its 1-based position.
pub fn pick_interactive<'a>(candidates: &[&'a Track], choice: usize) -> Result<&'a Track> {
    if choice == 0 || choice > candidates.len() {
        return Err(Error::InvalidChoice {
            choice,
            max: candidates.len(),
        });
    }
    Ok(candidates[choice - 1])
}

/// First track whose description contains the highest-priority label that matches anything.
///
/// Labels are substrings, so a broad label listed early (`"1080P"`) also
/// matches more specific tiers (`"1080P 高码率"`) in discovery order.
pub fn match_quality<'a>(candidates: &[&'a Track], priority: &[String]) -> Option<&'a Track> {
    priority.iter().filter(|p| !p.is_empty()).find_map(|label| {
        candidates
            .iter()
            .copied()
            .find(|t| t.description.contains(label.as_str()))
    })
}

/// First track whose codec equals the highest-priority encoding present.
pub fn match_encoding<'a>(candidates: &[&'a Track], priority: &[String]) -> Option<&'a Track> {
    priority.iter().find_map(|codec| {
        candidates
            .iter()
            .copied()
            .find(|t| t.codec.eq_ignore_ascii_case(codec))
    })
}

/// Track with the largest `(width, height)`, first seen on ties.
pub fn best_by_resolution<'a>(candidates: &[&'a Track]) -> Option<&'a Track> {
    candidates.iter().copied().fold(None, |best, t| match best {
        Some(b) if (t.width, t.height) <= (b.width, b.height) => Some(b),
        _ => Some(t),
    })
}

/// Track with the highest bandwidth, first seen on ties.
pub fn best_by_bandwidth<'a>(candidates: &[&'a Track]) -> Option<&'a Track> {
    candidates.iter().copied().fold(None, |best, t| match best {
        Some(b) if t.bandwidth <= b.bandwidth => Some(b),
        _ => Some(t),
    })
}

/// Choose a video track automatically.
pub fn select_video<'a>(tracks: &'a [Track], policy: &SelectionPolicy) -> Result<&'a Track> {
    let videos = candidates(tracks, FrameKind::Video);
    if videos.is_empty() {
        return Err(Error::NoCandidate(FrameKind::Video));
    }

    if let Some(track) = match_quality(&videos, &policy.quality_priority) {
        tracing::debug!("Video matched by quality label: {}", track.description);
        return Ok(track);
    }

    if let Some(track) = match_encoding(&videos, &policy.encoding_priority) {
        tracing::debug!("Video matched by encoding: {}", track.codec);
        return Ok(track);
    }

    best_by_resolution(&videos).ok_or(Error::NoCandidate(FrameKind::Video))
}

/// Choose an audio track automatically.
pub fn select_audio(tracks: &[Track]) -> Result<&Track> {
    let audio = candidates(tracks, FrameKind::Audio);
    best_by_bandwidth(&audio).ok_or(Error::NoCandidate(FrameKind::Audio))
}

/// Choose a track of `kind` through a prompt.
pub fn select_with_prompt<'a, P: ChoicePrompt + ?Sized>(
    tracks: &'a [Track],
    kind: FrameKind,
    prompt: &mut P,
) -> Result<&'a Track> {
    let list = candidates(tracks, kind);
    if list.is_empty() {
        return Err(Error::NoCandidate(kind));
    }
    let choice = prompt.choose(kind, &list)?;
    pick_interactive(&list, choice)
}
